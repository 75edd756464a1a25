use std::io::IsTerminal;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use servitsy::cli::Cli;
use servitsy::{listener, ServeDir};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(err) => {
            eprintln!("cannot read the current directory: {err}");
            return ExitCode::FAILURE;
        }
    };

    let options = match cli.into_raw_options().validate(&cwd).await {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    debug!("options: {:?}", options);

    let tcp = match listener::bind_first_free(&options.host, &options.ports).await {
        Ok(tcp) => tcp,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    if let Ok(addr) = tcp.local_addr() {
        announce(&options.root.display().to_string(), addr);
    }

    let service = ServeDir::new(Arc::new(options));
    match listener::serve(tcp, service, listener::shutdown_signal()).await {
        Ok(()) => {
            info!("stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "servitsy=debug" } else { "servitsy=info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_ansi(use_color())
        .with_target(false)
        .init();
}

fn use_color() -> bool {
    let set = |name: &str| std::env::var(name).map(|v| !v.is_empty()).unwrap_or(false);

    if set("NO_COLOR") {
        return false;
    }
    if let Ok(force) = std::env::var("FORCE_COLOR") {
        if !force.is_empty() {
            return force != "0" && force != "false";
        }
    }
    if std::env::var("TERM").as_deref() == Ok("dumb") && !set("COLORTERM") {
        return false;
    }
    std::io::stdout().is_terminal()
}

fn announce(root: &str, addr: SocketAddr) {
    info!("serving {}", root);
    let host = match addr {
        SocketAddr::V6(v6) => format!("[{}]", v6.ip()),
        SocketAddr::V4(v4) => v4.ip().to_string(),
    };
    info!("listening on http://{}:{}", host, addr.port());
    if addr.ip().is_unspecified() {
        info!("local link: http://localhost:{}", addr.port());
    }
}
