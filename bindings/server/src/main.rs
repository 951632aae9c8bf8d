use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use facemosaic_server::settings::{DESCRIPTION, TITLE, VERSION};
use facemosaic_server::{router, AppState, Server, Settings};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::parse();
    info!(
        title = TITLE,
        version = VERSION,
        description = DESCRIPTION,
        "starting"
    );

    let detector = settings.load_detector().with_context(|| match &settings.model {
        Some(path) => format!("loading face model {}", path.display()),
        None => "loading bundled face model".to_string(),
    })?;
    let app = router(&settings, AppState::new(&settings, Arc::new(detector)));

    let server = Server::bind(settings.bind_addr(), app).await?;
    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
