use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::{Result, ServerError};

/// Bound listener plus the application it serves.
pub struct Server {
    listener: TcpListener,
    app: Router,
}

impl Server {
    /// Bind `addr`. Port `0` picks a free port; see [`Server::local_addr`].
    pub async fn bind(addr: SocketAddr, app: Router) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        Ok(Self { listener, app })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` resolves, then let in-flight requests finish.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        info!(%addr, "listening");
        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!(%addr, "server stopped");
        Ok(())
    }
}
