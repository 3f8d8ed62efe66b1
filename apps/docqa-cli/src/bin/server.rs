use std::sync::Arc;

use docqa_cli::server::{router, AppState};
use docqa_cli::setup::{build_pipeline, init_tracing, load_settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("docqa=info,tower_http=debug");
    let (_config, settings) = load_settings()?;

    let pipeline = build_pipeline(&settings).await?;
    match pipeline.index().count().await {
        Ok(0) => tracing::warn!(table = %settings.index.table, "index is empty or missing; run docqa-indexer first"),
        Ok(rows) => tracing::info!(rows, "index opened"),
        Err(e) => tracing::warn!(error = %e, "could not count index rows"),
    }
    let app = router(Arc::new(AppState::new(pipeline)));

    let addr = settings.server.bind_addr();
    tracing::info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
