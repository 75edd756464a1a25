//! Static file server for local development.
//!
//! [`ServeDir`] is a [`tower_service::Service`] that answers `GET`, `HEAD`,
//! `OPTIONS` and `POST` requests with files from a root directory. URLs
//! without an exact match are resolved with extra extensions and index
//! files, directories without an index can be listed, and text files can
//! be gzipped on the fly.
//!
//! The `servitsy` binary wires it up with a command line, a logger and the
//! [`listener`].
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use servitsy::{listener, ServeDir, ServerOptions};
//!
//! # async {
//! let options = ServerOptions::with_root(std::env::current_dir().unwrap());
//! let tcp = listener::bind_first_free(&options.host, &options.ports)
//!     .await
//!     .expect("no free port");
//! let service = ServeDir::new(Arc::new(options));
//!
//! listener::serve(tcp, service, listener::shutdown_signal())
//!     .await
//!     .expect("server error");
//! # };
//! ```

use std::io;

use bytes::Bytes;
use http_body::combinators::UnsyncBoxBody;

pub use content_type::{TypeGroup, TypeResult};
pub use error::{HeaderParseError, ListenError, OptionsError};
pub use headers::HeaderRule;
pub use matcher::PathMatcher;
pub use options::{RawOptions, ServerOptions};
pub use resolver::{FileResolver, ResolveResult};
pub use serve_dir::ServeDir;

pub mod access_log;
mod assets;
mod async_body;
pub mod cli;
pub mod content_encoding;
pub mod content_type;
pub mod error;
pub mod fs;
pub mod headers;
pub mod listener;
pub mod matcher;
mod open_file;
pub mod options;
pub mod pages;
pub mod resolver;
mod serve_dir;

pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;
