//! HTTP/1.1 accept loop serving a [`Handler`]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{body, error::ServerError, router::Handler};

/// Configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_address: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
        }
    }
}

/// Serves one handler (typically a [`Router`](crate::Router)) over TCP
///
/// Every request gets a fresh [`CancellationToken`] in its extensions which is cancelled
/// when hyper drops the request future, e.g. because the client disconnected.
pub struct Server {
    config: ServerConfig,
    handler: Arc<dyn Handler>,
}

impl Server {
    pub fn new<H>(config: ServerConfig, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        Self {
            config,
            handler: Arc::new(handler),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address and serve forever
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|source| ServerError::Bind {
                address: self.config.bind_address,
                source,
            })?;
        self.serve(listener, CancellationToken::new()).await
    }

    /// Serve connections from `listener` until `shutdown` is cancelled
    ///
    /// Connections already accepted keep running to completion.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), ServerError> {
        info!("HTTP server listening on {}", listener.local_addr()?);

        loop {
            let (stream, peer_addr) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = shutdown.cancelled() => {
                    info!("HTTP server shutting down");
                    return Ok(());
                }
            };
            debug!("New connection from {}", peer_addr);

            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |request: Request<Incoming>| {
                    let handler = Arc::clone(&handler);
                    async move {
                        let token = CancellationToken::new();
                        let _cancel_on_drop = token.clone().drop_guard();

                        let (mut parts, incoming) = request.into_parts();
                        parts.extensions.insert(token);
                        let request = Request::from_parts(parts, body::boxed(incoming));

                        Ok::<_, Infallible>(handler.handle(request).await)
                    }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    if err.is_incomplete_message() || err.is_canceled() {
                        debug!("Client disconnected (normal): {}", err);
                    } else {
                        error!("Error serving connection: {}", err);
                    }
                }
            });
        }
    }
}
