//! Listeners: plain TCP, TLS over TCP, and a unix socket, all serving the
//! same router and stopped by the same cancellation token.
//!
//! On cancel a listener stops accepting at once. In-flight requests get
//! `drain` to finish before their connections are dropped; a zero drain
//! closes them immediately.

use std::future::{Future, IntoFuture};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use socket2::{Domain, Protocol, Socket, TcpKeepalive, Type};
use tokio_util::sync::CancellationToken;

/// TCP keep-alive period on accepted connections.
pub const KEEPALIVE_PERIOD: Duration = Duration::from_secs(30);

const LISTEN_BACKLOG: i32 = 1024;

/// Certificate and key for the TLS listener.
#[derive(Debug, Clone)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Bind a TCP listener with keep-alive set; accepted sockets inherit it.
pub fn bind_tcp(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_keepalive(true)?;
    socket.set_tcp_keepalive(&TcpKeepalive::new().with_time(KEEPALIVE_PERIOD))?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}

pub async fn serve_tcp(
    listener: std::net::TcpListener,
    app: Router,
    cancel: CancellationToken,
    drain: Duration,
) -> io::Result<()> {
    let listener = tokio::net::TcpListener::from_std(listener)?;
    tracing::info!(addr = %listener.local_addr()?, "HTTP listener started");

    let shutdown = cancel.clone();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .into_future();

    run_with_drain(server, cancel, drain).await?;
    tracing::debug!("HTTP listener stopped");
    Ok(())
}

pub async fn serve_tls(
    listener: std::net::TcpListener,
    tls: &TlsFiles,
    app: Router,
    cancel: CancellationToken,
    drain: Duration,
) -> io::Result<()> {
    let config = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
    tracing::info!(addr = %listener.local_addr()?, "HTTPS listener started");

    let handle = axum_server::Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        cancel.cancelled().await;
        shutdown.graceful_shutdown(Some(drain));
    });

    axum_server::from_tcp_rustls(listener, config)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;
    tracing::debug!("HTTPS listener stopped");
    Ok(())
}

/// Serve on a unix socket at `path`, replacing any file already there.
///
/// `mode` sets the socket's permission bits; failing to apply them is an
/// error rather than leaving the socket open to everyone.
#[cfg(unix)]
pub async fn serve_unix(
    path: &Path,
    mode: Option<u32>,
    app: Router,
    cancel: CancellationToken,
    drain: Duration,
) -> io::Result<()> {
    let listener = bind_unix(path, mode)?;
    tracing::info!(path = %path.display(), "HTTP unix listener started");

    let shutdown = cancel.clone();
    let server = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .into_future();

    let result = run_with_drain(server, cancel, drain).await;
    let _ = std::fs::remove_file(path);
    result
}

#[cfg(unix)]
fn bind_unix(path: &Path, mode: Option<u32>) -> io::Result<tokio::net::UnixListener> {
    use std::os::unix::fs::PermissionsExt;

    if std::fs::symlink_metadata(path).is_ok() {
        tracing::warn!(path = %path.display(), "Replacing socket");
    }
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(io::Error::new(
                e.kind(),
                format!("error removing socket file: {e}"),
            ))
        }
    }

    let listener = tokio::net::UnixListener::bind(path)?;
    if let Some(mode) = mode {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
            io::Error::new(e.kind(), format!("Failed setting up HTTP socket: {e}"))
        })?;
    }
    Ok(listener)
}

/// Drive `server` until it returns on its own, or until `drain` has passed
/// since cancellation.
async fn run_with_drain<F>(server: F, cancel: CancellationToken, drain: Duration) -> io::Result<()>
where
    F: Future<Output = io::Result<()>>,
{
    let deadline = async {
        cancel.cancelled().await;
        tokio::time::sleep(drain).await;
    };
    tokio::select! {
        result = server => result,
        _ = deadline => {
            tracing::debug!(?drain, "Drain period over, closing open connections");
            Ok(())
        }
    }
}
