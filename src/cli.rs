//! Command line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::options::RawOptions;

/// Small local HTTP server for static files
#[derive(Parser, Debug, Default)]
#[command(name = "servitsy", version, about, disable_help_flag = true)]
pub struct Cli {
    /// Directory to serve, defaults to the current directory
    pub dir: Option<PathBuf>,

    /// Bind to a specific host
    #[arg(short = 'h', long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port or port range to use: N, N+ or N-M
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<String>,

    /// Add custom HTTP headers, optionally for some file patterns only
    #[arg(long, value_name = "HEADER")]
    pub header: Vec<String>,

    /// Send CORS headers for cross-origin requests
    #[arg(long, overrides_with = "no_cors")]
    pub cors: bool,
    #[arg(long, overrides_with = "cors", hide = true)]
    pub no_cors: bool,

    /// Gzip compression for text files
    #[arg(long, overrides_with = "no_gzip")]
    pub gzip: bool,
    #[arg(long, overrides_with = "gzip", hide = true)]
    pub no_gzip: bool,

    /// Extensions used to resolve URLs without one
    #[arg(long, value_name = "EXT", overrides_with = "no_ext")]
    pub ext: Vec<String>,
    #[arg(long, overrides_with = "ext", hide = true)]
    pub no_ext: bool,

    /// Directory index file names
    #[arg(long, value_name = "NAME", overrides_with = "no_dir_file")]
    pub dir_file: Vec<String>,
    #[arg(long, overrides_with = "dir_file", hide = true)]
    pub no_dir_file: bool,

    /// List directory contents
    #[arg(long, overrides_with = "no_dir_list")]
    pub dir_list: bool,
    #[arg(long, overrides_with = "dir_list", hide = true)]
    pub no_dir_list: bool,

    /// Block access to files and folders matching these patterns
    #[arg(long, value_name = "PATTERN", overrides_with = "no_exclude")]
    pub exclude: Vec<String>,
    #[arg(long, overrides_with = "exclude", hide = true)]
    pub no_exclude: bool,

    /// Log debug information
    #[arg(short, long)]
    pub verbose: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

fn flag(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn list(values: Vec<String>, off: bool) -> Option<Vec<String>> {
    if !values.is_empty() {
        Some(values)
    } else if off {
        Some(Vec::new())
    } else {
        None
    }
}

impl Cli {
    pub fn into_raw_options(self) -> RawOptions {
        RawOptions {
            root: self.dir,
            host: self.host,
            port: self.port,
            headers: self.header,
            cors: flag(self.cors, self.no_cors),
            gzip: flag(self.gzip, self.no_gzip),
            dir_list: flag(self.dir_list, self.no_dir_list),
            dir_file: list(self.dir_file, self.no_dir_file),
            ext: list(self.ext, self.no_ext),
            exclude: list(self.exclude, self.no_exclude),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> RawOptions {
        let args = std::iter::once("servitsy").chain(args.iter().copied());
        Cli::try_parse_from(args).unwrap().into_raw_options()
    }

    #[test]
    fn nothing_given() {
        let raw = parse(&[]);
        assert_eq!(raw.root, None);
        assert_eq!(raw.host, None);
        assert_eq!(raw.cors, None);
        assert_eq!(raw.ext, None);
        assert!(raw.headers.is_empty());
    }

    #[test]
    fn values() {
        let raw = parse(&[
            "public",
            "-h",
            "localhost",
            "-p",
            "3000+",
            "--header",
            "X-A: 1",
            "--header",
            "*.js X-B: 2",
            "--ext",
            ".html,.htm",
            "--dir-file",
            "index.html",
        ]);
        assert_eq!(raw.root, Some(PathBuf::from("public")));
        assert_eq!(raw.host.as_deref(), Some("localhost"));
        assert_eq!(raw.port.as_deref(), Some("3000+"));
        assert_eq!(raw.headers, ["X-A: 1", "*.js X-B: 2"]);
        assert_eq!(raw.ext, Some(vec![".html,.htm".to_owned()]));
        assert_eq!(raw.dir_file, Some(vec!["index.html".to_owned()]));
    }

    #[test]
    fn negated_flags() {
        let raw = parse(&["--no-gzip", "--no-ext", "--no-exclude", "--no-dir-list"]);
        assert_eq!(raw.gzip, Some(false));
        assert_eq!(raw.ext, Some(vec![]));
        assert_eq!(raw.exclude, Some(vec![]));
        assert_eq!(raw.dir_list, Some(false));
        assert_eq!(raw.dir_file, None);
    }

    #[test]
    fn last_flag_wins() {
        assert_eq!(parse(&["--cors", "--no-cors"]).cors, Some(false));
        assert_eq!(parse(&["--no-cors", "--cors"]).cors, Some(true));
    }

    #[test]
    fn help_is_long_only() {
        let err = Cli::try_parse_from(["servitsy", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        // -h is the host
        assert!(Cli::try_parse_from(["servitsy", "-h"]).is_err());
    }
}
