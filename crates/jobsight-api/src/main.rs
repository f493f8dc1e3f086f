use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use jobsight_api::config::{CrawlSourceKind, SyncStateBackend};
use jobsight_api::{logging, router, AppConfig, AppState};
use jobsight_core::{CrawlSource, KeyValueStore};
use jobsight_db::{Database, FileKvStore, PoolConfig};
use jobsight_inference::OpenAIClassifier;
use jobsight_jobs::{
    CrawlPipeline, HttpCrawlSource, PipelineConfig, SimulatedCrawlSource, SyncConfig,
    Synchronizer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init_logging();

    let config = AppConfig::from_env()?;
    let database_url = config
        .database_url
        .clone()
        .context("DATABASE_URL must be set")?;

    let sync_config = SyncConfig::from_env()?;
    let mut pool_config = PoolConfig::from_env();
    if sync_config.enabled {
        pool_config =
            pool_config.with_listener_connections(sync_config.collections.len() as u32);
    }
    let db = Database::connect_with_config(&database_url, pool_config).await?;
    db.migrate().await?;
    info!(subsystem = "api", "Database ready");

    // No fallback classifier: a missing key stops startup.
    let classifier = Arc::new(OpenAIClassifier::from_env()?);

    let source: Arc<dyn CrawlSource> = match config.crawl_source {
        CrawlSourceKind::Simulated => Arc::new(SimulatedCrawlSource::new()),
        CrawlSourceKind::Http => Arc::new(HttpCrawlSource::from_env()?),
    };

    let pipeline = CrawlPipeline::new(
        source,
        classifier,
        Arc::new(db.sink.clone()),
        PipelineConfig::from_env(),
    )
    .with_document_store(Arc::new(db.documents.clone()));
    let mut state = AppState::new(Arc::new(pipeline));

    let sync_handle = if sync_config.enabled {
        let kv: Arc<dyn KeyValueStore> = match &config.sync_state {
            SyncStateBackend::File(path) => Arc::new(FileKvStore::open(path).await?),
            SyncStateBackend::Postgres => Arc::new(db.sync_state.clone()),
        };
        let synchronizer = Synchronizer::new(
            Arc::new(db.documents.clone()),
            Arc::new(db.sink.clone()),
            kv,
            sync_config.clone(),
        );
        let handle = Arc::new(synchronizer.start(&sync_config.collections));
        state = state.with_sync(handle.clone());
        Some(handle)
    } else {
        warn!(subsystem = "api", "Synchronizer disabled (SYNC_ENABLED=false)");
        None
    };

    let app = router(state, &config);

    let addr: SocketAddr = config.bind_address().parse()?;
    info!(subsystem = "api", %addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sync_handle {
        handle.shutdown().await;
    }
    info!(subsystem = "api", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(subsystem = "api", error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(subsystem = "api", error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!(subsystem = "api", "Shutdown signal received");
}
