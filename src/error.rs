use std::fmt;
use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// A `--header` value that yields no header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid --header value: {input:?}")]
pub struct HeaderParseError {
    pub input: String,
}

impl HeaderParseError {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Everything wrong with the given options, reported together.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct OptionsError {
    pub errors: Vec<String>,
}

impl fmt::Display for OptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, error) in self.errors.iter().enumerate() {
            if idx > 0 {
                f.write_str("\n")?;
            }
            f.write_str(error)?;
        }
        Ok(())
    }
}

/// Failure to start or keep the listener running.
#[derive(Debug, Error)]
pub enum ListenError {
    #[error("host not found: {host:?}")]
    HostNotFound { host: String },

    #[error("{}", ports_in_use_message(.ports))]
    PortsInUse { ports: Vec<u16> },

    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("error accepting connections: {0}")]
    Accept(#[source] io::Error),
}

fn ports_in_use_message(ports: &[u16]) -> String {
    match ports {
        [port] => format!("port already in use: {port}"),
        _ => {
            let list = ports
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("ports already in use: {list}")
        }
    }
}
