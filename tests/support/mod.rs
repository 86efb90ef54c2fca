//! Live server harness shared by the integration tests

use std::net::SocketAddr;

use sluice_http::{Router, Server, ServerConfig};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A router served on an ephemeral localhost port
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<Result<(), sluice_http::ServerError>>,
}

impl TestServer {
    pub async fn start(router: Router) -> anyhow::Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();

        let server = Server::new(ServerConfig { bind_address: addr }, router);
        let token = shutdown.clone();
        let task = tokio::spawn(async move { server.serve(listener, token).await });

        Ok(Self {
            addr,
            shutdown,
            task,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Stop accepting and wait for the accept loop to return
    pub async fn stop(self) -> anyhow::Result<()> {
        self.shutdown.cancel();
        self.task.await??;
        Ok(())
    }
}
