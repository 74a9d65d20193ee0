//! Worker Server: one OS process, one `tokio` current-thread runtime,
//! one `SessionRegistry`, one Receipt Bus publisher, and a set of
//! subscriber loops to every worker's publisher (including its own).

use std::path::Path;
use std::sync::Arc;

use tokio::net::{TcpListener, UnixListener};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::bus::{self, BusPublisher};
use crate::provider::Provider;
use crate::smpp::connection::handle_connection;
use crate::smpp::dispatcher::Dispatcher;
use crate::smpp::session::SessionRegistry;

pub struct Worker {
    registry: Arc<SessionRegistry>,
    dispatcher: Arc<Dispatcher>,
    provider: Arc<dyn Provider>,
    bus: Arc<BusPublisher>,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            dispatcher: Arc::new(Dispatcher::new(provider.clone())),
            provider,
            bus: Arc::new(BusPublisher::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Requests a clean shutdown: stops the accept loop, cancels every
    /// outstanding handler task, and closes the bus publisher and
    /// subscriber loops. `run` returns once the handler tasks have
    /// drained.
    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Starts the bus publisher and every subscriber loop, then accepts
    /// client connections on `listener` until `request_shutdown` is
    /// called. Used both by the production Unix-domain listener and by
    /// tests that talk TCP directly to a single worker.
    pub async fn run<L: ClientListener>(
        self: Arc<Self>,
        listener: L,
        bus_listener: TcpListener,
        subscriber_addrs: Vec<String>,
    ) -> std::io::Result<()> {
        let bus = self.bus.clone();
        tokio::spawn(bus.serve(bus_listener, self.shutdown.clone()));

        for addr in subscriber_addrs {
            let registry = self.registry.clone();
            tokio::spawn(bus::run_subscriber(addr, registry, self.shutdown.clone()));
        }

        let mut handlers = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    info!(%peer, "connection accepted");
                    let registry = self.registry.clone();
                    let dispatcher = self.dispatcher.clone();
                    let provider = self.provider.clone();
                    let bus = self.bus.clone();
                    let shutdown = self.shutdown.clone();
                    handlers.spawn(async move {
                        handle_connection(stream, peer, registry, dispatcher, provider, bus, shutdown).await;
                    });
                }
            }
        }

        info!("worker shutting down, draining handler tasks");
        while handlers.join_next().await.is_some() {}
        Ok(())
    }
}

/// Abstracts over the two transports a Worker accepts client connections
/// on: a Unix-domain socket in production, or a bare TCP listener in
/// single-worker test setups that bypass the Master entirely.
#[async_trait::async_trait]
pub trait ClientListener: Send + 'static {
    type Stream: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static;
    async fn accept(&self) -> std::io::Result<(Self::Stream, String)>;
}

#[async_trait::async_trait]
impl ClientListener for UnixListener {
    type Stream = tokio::net::UnixStream;
    async fn accept(&self) -> std::io::Result<(Self::Stream, String)> {
        let (stream, addr) = UnixListener::accept(self).await?;
        Ok((stream, format!("{addr:?}")))
    }
}

#[async_trait::async_trait]
impl ClientListener for TcpListener {
    type Stream = tokio::net::TcpStream;
    async fn accept(&self) -> std::io::Result<(Self::Stream, String)> {
        let (stream, addr) = TcpListener::accept(self).await?;
        Ok((stream, addr.to_string()))
    }
}

/// Binds the worker's Unix-domain client socket, removing a stale file
/// left behind by a prior run first.
pub fn bind_unix_socket(path: &Path) -> std::io::Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    UnixListener::bind(path).inspect_err(|e| {
        error!(path = %path.display(), error = %e, "failed to bind worker socket");
    })
}
