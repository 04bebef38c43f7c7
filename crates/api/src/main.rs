use anyhow::Context;

use learnhub_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    learnhub_observability::init(config.environment);
    for warning in config.warnings() {
        tracing::warn!("{warning}");
    }

    let bind_addr = config.bind_addr;
    let app = learnhub_api::app::build_app(config).await?;

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
