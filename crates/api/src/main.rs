use std::sync::Arc;

use pollbridge_api::app::{self, AppConfig};
use pollbridge_api::catalog::Catalog;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pollbridge_observability::init();

    let config = AppConfig::from_env()?;
    let services = Arc::new(app::services::build_services(&config, Catalog::demo())?);
    let router = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        wait_ms_default = config.poll.wait_ms_default,
        max_wait_ms = config.poll.max_wait_ms,
        "listening"
    );

    axum::serve(listener, router).await?;
    Ok(())
}
