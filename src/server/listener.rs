use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::http::connection::Connection;
use crate::server::pipeline::Pipeline;

/// A bound listener plus the pipeline every accepted connection shares.
pub struct Server {
    listener: TcpListener,
    pipeline: Arc<Pipeline>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> anyhow::Result<Self> {
        let addr = config.listen_addr();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        info!("Starting server on port {}", listener.local_addr()?.port());

        Ok(Self {
            listener,
            pipeline: Arc::new(Pipeline::new(Arc::new(config))),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever, one task each.
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves, then close the listener.
    ///
    /// Connections already accepted keep running until they finish on their own.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        tokio::pin!(shutdown);
        loop {
            let (socket, peer) = tokio::select! {
                accepted = self.listener.accept() => accepted?,
                _ = &mut shutdown => {
                    info!("Server stopped");
                    return Ok(());
                }
            };
            tracing::debug!("Accepted connection from {}", peer);

            let pipeline = self.pipeline.clone();
            tokio::spawn(async move {
                let mut conn = Connection::new(socket, peer, pipeline);
                if let Err(e) = conn.run().await {
                    tracing::error!("Connection error from {}: {}", peer, e);
                }
            });
        }
    }
}
