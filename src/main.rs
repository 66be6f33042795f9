use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use nukida_backend::app;
use nukida_backend::config::AppConfig;
use nukida_backend::external::dchart::DChartProvider;
use nukida_backend::external::generation_provider::PerplexityProvider;
use nukida_backend::external::history_provider::{ClientProfile, HistoryProvider, HttpContext};
use nukida_backend::external::quote_page::CafefQuoteSource;
use nukida_backend::external::ssi::SsiProvider;
use nukida_backend::external::vndirect_index::VnDirectIndexProvider;
use nukida_backend::external::yahoofinance::YahooFinanceProvider;
use nukida_backend::logging::{init_logging, LoggingConfig};
use nukida_backend::services::analysis_service::AnalysisService;
use nukida_backend::services::generation_service::GenerationService;
use nukida_backend::services::snapshot_service::SnapshotService;
use nukida_backend::services::waterfall::SourceWaterfall;
use nukida_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env()).context("failed to initialize logging")?;

    let config = AppConfig::from_env();

    let http = HttpContext::new(&ClientProfile::default()).context("failed to build HTTP client")?;

    // Order matters: the first source with usable bars wins
    let sources: Vec<Box<dyn HistoryProvider>> = vec![
        Box::new(DChartProvider::new(config.primary_timeout)),
        Box::new(VnDirectIndexProvider::new(config.index_timeout)),
        Box::new(YahooFinanceProvider::new(config.secondary_timeout)),
        Box::new(SsiProvider::new(config.tertiary_timeout)),
    ];
    let waterfall = SourceWaterfall::new(sources);
    info!("📊 History sources: {}", waterfall.source_names().join(" → "));

    let snapshots = Arc::new(SnapshotService::new(
        http,
        waterfall,
        Box::new(CafefQuoteSource::new(config.quote_timeout)),
        config.history_lookback_days,
    ));

    let provider = PerplexityProvider::new(
        config.generation.model.clone(),
        config.generation.temperature,
        config.generation.timeout,
    )
    .context("failed to build generation client")?;
    let generation = Arc::new(GenerationService::new(config.generation.clone(), Arc::new(provider)));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState {
        analysis: Arc::new(AnalysisService::new(snapshots.clone(), generation)),
        snapshots,
    };
    let app = app::create_app(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("🚀 Nukida backend running at http://{}/", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
