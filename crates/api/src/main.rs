use anyhow::Context;

use workhub_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    workhub_observability::init();

    let config = ApiConfig::from_env()?;
    let bind_addr = config.bind_addr;
    let app = workhub_api::app::build_app(config).await?;

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("serve http")?;
    Ok(())
}
