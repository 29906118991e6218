//! tunedrop - 聊天机器人音乐下载流水线
//!
//! - Domain: track/, retention/, pipeline/
//! - Application: commands, queries, ports
//! - Infrastructure: http, memory, worker, persistence, adapters

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tunedrop::application::{purge_scratch, ExtractorPort, LyricsPort, RequesterRepositoryPort};
use tunedrop::config::{load_config, print_config, AppConfig, ExtractorKind};
use tunedrop::infrastructure::adapters::{
    FakeExtractor, FileContentStore, HttpLyricsClient, SymphoniaPreviewSynthesizer,
    YtDlpExtractor,
};
use tunedrop::infrastructure::http::{AppState, HttpServer, ServerConfig};
use tunedrop::infrastructure::memory::InMemoryLifecycleManager;
use tunedrop::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, SqliteRequesterRepository,
};
use tunedrop::infrastructure::worker::SweepWorker;

fn init_tracing(config: &AppConfig) {
    let log_filter = format!(
        "{},tunedrop={},tower_http=debug",
        config.log.level, config.log.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn build_extractor(config: &AppConfig) -> Arc<dyn ExtractorPort> {
    match config.extractor.kind {
        ExtractorKind::Ytdlp => {
            let extractor = YtDlpExtractor::new(config.extractor.ytdlp());
            if !extractor.health_check().await {
                tracing::warn!(binary = %config.extractor.binary, "yt-dlp health check failed");
            }
            Arc::new(extractor)
        }
        ExtractorKind::Fake => {
            tracing::warn!("Using fake extractor, no network access");
            Arc::new(FakeExtractor::new().with_format(config.extractor.audio_format))
        }
    }
}

async fn build_requesters(
    config: &AppConfig,
) -> anyhow::Result<Option<Arc<dyn RequesterRepositoryPort>>> {
    if !config.database.enabled {
        return Ok(None);
    }
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let pool = create_pool(&config.database.sqlite()).await?;
    run_migrations(&pool).await?;
    let repo: Arc<dyn RequesterRepositoryPort> = Arc::new(SqliteRequesterRepository::new(pool));
    Ok(Some(repo))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);

    tracing::info!("tunedrop {}", env!("CARGO_PKG_VERSION"));
    print_config(&config);

    // 确保数据目录存在
    tokio::fs::create_dir_all(&config.storage.root_dir).await?;
    tokio::fs::create_dir_all(&config.storage.scratch_dir).await?;
    purge_scratch(&config.storage.scratch_dir).await?;

    // 内容存储与生命周期
    let store = FileContentStore::open(&config.storage.root_dir).await?.arc();
    let lifecycle = Arc::new(InMemoryLifecycleManager::new(
        store.clone(),
        config.retention.lifecycle(),
    ));

    let extractor = build_extractor(&config).await;
    let preview = Arc::new(SymphoniaPreviewSynthesizer::new());

    let lyrics: Option<Arc<dyn LyricsPort>> = if config.lyrics.enabled {
        let client: Arc<dyn LyricsPort> = Arc::new(HttpLyricsClient::new(config.lyrics.client())?);
        Some(client)
    } else {
        None
    };

    let requesters = build_requesters(&config).await?;

    // 启动清扫 Worker
    let shutdown = CancellationToken::new();
    let sweeper = SweepWorker::new(
        config.retention.sweep_worker(),
        lifecycle.clone(),
        shutdown.clone(),
    )
    .spawn();

    let state = AppState::new(
        extractor,
        store,
        preview,
        lifecycle,
        lyrics,
        requesters,
        config.pipeline_settings(),
    );
    let server = HttpServer::new(
        ServerConfig::new(&config.server.host, config.server.port),
        state,
    );

    // 启动服务器（带优雅关闭）
    let served = server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal");
        })
        .await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "Sweep worker did not stop cleanly");
    }

    served?;
    tracing::info!("Server shutdown complete");

    Ok(())
}
