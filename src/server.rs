//! HTTP stub server.
//!
//! Binds a TCP listener, serves HTTP/1.1 with hyper and hands every request
//! to a shared [`StubRegistry`]. Stub files are enabled and disabled at
//! runtime through the [`StubServer`] interface.

use crate::config::StubServerConfig;
use crate::error::{ServerError, StubError};
use crate::loader;
use crate::matcher::IncomingRequest;
use crate::registry::StubRegistry;
use crate::response::{ResponseBody, StubResponse};
use crate::stub::StubDefinition;
use async_trait::async_trait;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// A server that answers HTTP requests from stub files.
#[async_trait]
pub trait StubServer: Send + Sync {
    /// Load the stub file at `path` and make it active. A file that fails to
    /// load leaves the active stubs unchanged.
    async fn enable_stub(&self, path: &Path) -> Result<(), ServerError>;

    /// Load the stub file at `path` and deactivate the stub registered under
    /// the same method and path pattern. Disabling an inactive stub is a
    /// no-op.
    async fn disable_stub(&self, path: &Path) -> Result<(), ServerError>;

    /// Start listening on `addr`. Returns the bound address.
    async fn start(&self, addr: SocketAddr) -> Result<SocketAddr, ServerError>;

    /// Stop accepting connections. In-flight requests are left to finish.
    async fn stop(&self);
}

struct Running {
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

/// hyper-based [`StubServer`].
pub struct HttpStubServer {
    registry: Arc<StubRegistry>,
    running: Mutex<Option<Running>>,
}

impl HttpStubServer {
    pub fn new(registry: Arc<StubRegistry>) -> Self {
        Self {
            registry,
            running: Mutex::new(None),
        }
    }

    /// Build a server from configuration and enable its stub files in order.
    pub async fn from_config(config: &StubServerConfig) -> Result<Self, ServerError> {
        let server = Self::new(Arc::new(StubRegistry::from_settings(&config.settings)));
        for path in &config.stubs {
            server.enable_stub(path).await?;
        }
        Ok(server)
    }

    pub fn registry(&self) -> &Arc<StubRegistry> {
        &self.registry
    }

    /// Address of the running listener, if started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().as_ref().map(|running| running.addr)
    }

    async fn read_stub(path: &Path) -> Result<StubDefinition, StubError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| StubError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        loader::parse_stub(&path.display().to_string(), &text)
    }
}

#[async_trait]
impl StubServer for HttpStubServer {
    async fn enable_stub(&self, path: &Path) -> Result<(), ServerError> {
        let stub = Self::read_stub(path).await?;
        info!(path = %path.display(), stub = %stub.key(), "Enabled stub");
        self.registry.register(stub);
        Ok(())
    }

    async fn disable_stub(&self, path: &Path) -> Result<(), ServerError> {
        let stub = Self::read_stub(path).await?;
        if self.registry.remove(&stub) {
            info!(path = %path.display(), stub = %stub.key(), "Disabled stub");
        }
        Ok(())
    }

    async fn start(&self, addr: SocketAddr) -> Result<SocketAddr, ServerError> {
        if let Some(addr) = self.local_addr() {
            return Err(ServerError::AlreadyRunning(addr));
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.registry),
            shutdown_rx,
        ));

        info!(addr = %local_addr, stubs = self.registry.len(), "Stub server listening");

        *self.running.lock() = Some(Running {
            addr: local_addr,
            shutdown_tx,
            handle,
        });
        Ok(local_addr)
    }

    async fn stop(&self) {
        let running = self.running.lock().take();
        let Some(running) = running else {
            return;
        };

        let _ = running.shutdown_tx.send(());
        if let Err(e) = running.handle.await {
            error!(addr = %running.addr, "Stub server task failed: {}", e);
        }
        info!(addr = %running.addr, "Stub server stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<StubRegistry>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let registry = Arc::clone(&registry);
                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);
                            let service = service_fn(move |req| {
                                let registry = Arc::clone(&registry);
                                async move { handle_request(req, registry) }
                            });
                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                // Includes clients that hang up while a delayed body is pending.
                                debug!(peer = %peer, "Connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                break;
            }
        }
    }
}

fn handle_request(
    req: Request<Incoming>,
    registry: Arc<StubRegistry>,
) -> Result<Response<ResponseBody>, Infallible> {
    let request =
        IncomingRequest::from_parts(req.method().as_str(), req.uri().path(), req.uri().query());

    let response = std::panic::catch_unwind(AssertUnwindSafe(|| registry.dispatch(&request)))
        .unwrap_or_else(|_| {
            error!(
                method = %request.method,
                path = %request.path,
                "Dispatch panicked"
            );
            StubResponse::internal_error()
        });

    Ok(response.into_http())
}
