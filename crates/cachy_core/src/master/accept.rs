use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use cachy_proxy::CachingProxy;
use hyper::Request;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{Instrument, debug, error, info, info_span, instrument};

pub(crate) async fn bind_listener(listen_addr: &str) -> anyhow::Result<TcpListener> {
    info!(target: "cachy::master", listen = %listen_addr, "Binding listener");

    match TcpListener::bind(listen_addr).await {
        Ok(listener) => {
            info!(target: "cachy::master", listen = %listen_addr, "Bind() successful");
            Ok(listener)
        }
        Err(e) => {
            error!(
                target: "cachy::master",
                listen = %listen_addr,
                error = ?e,
                "Failed to bind listener"
            );
            Err(anyhow::Error::new(e).context(format!("failed to bind {listen_addr}")))
        }
    }
}

struct AcceptedConn {
    stream: TcpStream,
    addr: SocketAddr,
    permit: OwnedSemaphorePermit,
}

async fn accept_with_permit(
    listener: &TcpListener,
    semaphore: &Arc<Semaphore>,
) -> anyhow::Result<AcceptedConn> {
    let (stream, addr) = listener.accept().await?;
    let permit = semaphore.clone().acquire_owned().await?;

    debug!(
        target: "cachy::master",
        client_addr = %addr,
        available_permits = semaphore.available_permits(),
        "Connection accepted"
    );

    Ok(AcceptedConn { stream, addr, permit })
}

/// Accepts connections until `shutdown` resolves.
///
/// Each connection runs on its own task, holds one semaphore permit for its
/// lifetime and is registered with `graceful` so it can be drained later.
#[instrument(skip_all, fields(available_permits = semaphore.available_permits()))]
pub(crate) async fn accept_loop<F>(
    listener: &TcpListener,
    semaphore: Arc<Semaphore>,
    proxy: Arc<CachingProxy>,
    graceful: &GracefulShutdown,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let accepted = tokio::select! {
            _ = &mut shutdown => {
                info!(target: "cachy::master", "Shutdown requested; no longer accepting");
                return;
            }
            accepted = accept_with_permit(listener, &semaphore) => accepted,
        };

        let AcceptedConn { stream, addr, permit } = match accepted {
            Ok(conn) => conn,
            Err(e) => {
                error!(target: "cachy::master", error = ?e, "Failed to accept connection");
                continue;
            }
        };

        let proxy = proxy.clone();
        let service = service_fn(move |req: Request<Incoming>| {
            let proxy = proxy.clone();
            async move { Ok::<_, Infallible>(proxy.handle(req).await) }
        });

        let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
        let conn = graceful.watch(conn);

        tokio::spawn(
            async move {
                let _permit = permit;
                if let Err(e) = conn.await {
                    debug!(target: "cachy::worker", error = ?e, "Connection closed with error");
                }
                debug!(target: "cachy::worker", "Permit released after connection closed");
            }
            .instrument(info_span!("connection", client_addr = %addr)),
        );
    }
}
