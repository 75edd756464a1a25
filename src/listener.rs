//! The HTTP listener.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use hyper::server::conn::Http;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::ListenError;
use crate::serve_dir::ServeDir;

/// Binds to the first free port of `ports` on `host`.
///
/// Ports already in use are skipped; any other failure ends the search.
pub async fn bind_first_free(host: &str, ports: &[u16]) -> Result<TcpListener, ListenError> {
    let mut tried = Vec::with_capacity(ports.len());
    for &port in ports {
        let addr = resolve_host(host, port).await?;
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(err) if err.kind() == io::ErrorKind::AddrInUse => {
                debug!("port {} is in use, trying the next one", port);
                tried.push(port);
            }
            Err(source) => return Err(ListenError::Bind { addr, source }),
        }
    }
    Err(ListenError::PortsInUse { ports: tried })
}

async fn resolve_host(host: &str, port: u16) -> Result<SocketAddr, ListenError> {
    let not_found = || ListenError::HostNotFound {
        host: host.to_owned(),
    };
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|_| not_found())?;
    addrs.next().ok_or_else(not_found)
}

/// Serves connections from `listener` until `shutdown` resolves.
///
/// Every connection runs in its own task. On shutdown the accept loop ends
/// and all open connections are dropped, whatever they are doing.
pub async fn serve<F>(listener: TcpListener, service: ServeDir, shutdown: F) -> Result<(), ListenError>
where
    F: Future<Output = ()>,
{
    let mut http = Http::new();
    http.http1_only(true).http1_title_case_headers(true);

    let mut connections = JoinSet::new();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            _ = &mut shutdown => break Ok(()),
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) if is_transient(&err) => {
                        warn!("error accepting connection: {}", err);
                        continue;
                    }
                    Err(err) => break Err(ListenError::Accept(err)),
                };
                let connection = http.serve_connection(stream, service.clone());
                connections.spawn(async move {
                    if let Err(err) = connection.await {
                        if err.is_incomplete_message() || err.is_closed() || err.is_canceled() {
                            debug!("connection from {} closed: {}", peer, err);
                        } else {
                            warn!("connection from {} failed: {}", peer, err);
                        }
                    }
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    };

    debug!("closing {} open connections", connections.len());
    connections.shutdown().await;
    result
}

// Errors that concern a single incoming connection rather than the
// listening socket.
fn is_transient(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    ) {
        return true;
    }
    #[cfg(unix)]
    {
        use nix::errno::Errno;

        matches!(
            err.raw_os_error(),
            Some(code) if code == Errno::EMFILE as i32 || code == Errno::ENFILE as i32
        )
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Resolves once the process is asked to stop.
///
/// Only the first signal counts; later ones are not waited for.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("cannot listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(windows)]
    let terminate = async {
        match tokio::signal::windows::ctrl_break() {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("cannot listen for Ctrl-Break: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(any(unix, windows)))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    use super::*;
    use crate::headers::HeaderRule;
    use crate::options::ServerOptions;

    #[tokio::test]
    async fn skips_ports_in_use() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let listener = bind_first_free("127.0.0.1", &[port, 0]).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn reports_exhausted_ports() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        match bind_first_free("127.0.0.1", &[port]).await {
            Err(ListenError::PortsInUse { ports }) => assert_eq!(ports, [port]),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn reports_unknown_hosts() {
        match bind_first_free("host.invalid", &[8080]).await {
            Err(ListenError::HostNotFound { host }) => assert_eq!(host, "host.invalid"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    struct Running {
        addr: SocketAddr,
        stop: oneshot::Sender<()>,
        server: tokio::task::JoinHandle<Result<(), ListenError>>,
        _dir: tempfile::TempDir,
    }

    impl Running {
        async fn start(configure: impl FnOnce(&mut ServerOptions)) -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("index.html"), "hi").unwrap();
            let root = std::fs::canonicalize(dir.path()).unwrap();
            let mut options = ServerOptions::with_root(root);
            configure(&mut options);
            let service = ServeDir::new(Arc::new(options));

            let listener = bind_first_free("127.0.0.1", &[0]).await.unwrap();
            let addr = listener.local_addr().unwrap();
            let (stop, stopped) = oneshot::channel::<()>();
            let server = tokio::spawn(serve(listener, service, async {
                let _ = stopped.await;
            }));
            Running {
                addr,
                stop,
                server,
                _dir: dir,
            }
        }

        async fn request(&self, request_line: &str) -> String {
            let mut stream = TcpStream::connect(self.addr).await.unwrap();
            let raw = format!("{request_line}\r\nHost: localhost\r\nConnection: close\r\n\r\n");
            stream.write_all(raw.as_bytes()).await.unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).await.unwrap();
            response
        }

        async fn stop(self) {
            self.stop.send(()).unwrap();
            self.server.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn serves_until_shutdown() {
        let running = Running::start(|_| {}).await;

        let response = running.request("GET / HTTP/1.1").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
        assert!(response.contains("Content-Type: text/html; charset=UTF-8\r\n"));
        assert!(response.contains("Content-Length: 2\r\n"));
        assert!(response.ends_with("\r\n\r\nhi"));

        running.stop().await;
    }

    // hyper drops `Content-Length` from every 204 it writes.
    #[tokio::test]
    async fn options_on_the_wire() {
        let running = Running::start(|_| {}).await;

        for target in ["*", "/index.html"] {
            let response = running.request(&format!("OPTIONS {target} HTTP/1.1")).await;
            assert!(response.starts_with("HTTP/1.1 204 No Content\r\n"), "{response}");
            assert!(response.contains("Allow: GET, HEAD, OPTIONS, POST\r\n"), "{response}");
            assert!(!response.contains("Content-Length"), "{response}");
            assert!(response.ends_with("\r\n\r\n"), "{response}");
        }

        let response = running.request("OPTIONS /missing HTTP/1.1").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"), "{response}");
        assert!(response.contains("Allow: GET, HEAD, OPTIONS, POST\r\n"), "{response}");
        assert!(response.contains("Content-Length: 0\r\n"), "{response}");
        assert!(response.ends_with("\r\n\r\n"), "{response}");

        running.stop().await;
    }

    #[tokio::test]
    async fn header_names_are_title_cased() {
        let running = Running::start(|options| {
            options.headers = vec![HeaderRule::parse("x-lower-case: v").unwrap()];
        })
        .await;

        let response = running.request("GET / HTTP/1.1").await;
        assert!(response.contains("X-Lower-Case: v\r\n"), "{response}");
        assert!(!response.contains("x-lower-case"), "{response}");

        running.stop().await;
    }

    #[test]
    fn transient_accept_errors() {
        assert!(is_transient(&io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(is_transient(&io::Error::from(io::ErrorKind::Interrupted)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::PermissionDenied)));

        #[cfg(unix)]
        {
            use nix::errno::Errno;

            assert!(is_transient(&io::Error::from_raw_os_error(Errno::EMFILE as i32)));
            assert!(is_transient(&io::Error::from_raw_os_error(Errno::ENFILE as i32)));
            assert!(!is_transient(&io::Error::from_raw_os_error(Errno::EBADF as i32)));
        }
    }
}
