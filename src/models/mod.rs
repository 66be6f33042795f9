mod bar;
mod highlights;
mod indicator;
mod payload;
mod report;
mod snapshot;

pub use bar::{Bar, Series};
pub use highlights::{IndexSummary, MarketHighlights};
pub use indicator::{IndicatorSet, Signal, Technicals, Trend, INSUFFICIENT_DATA_STATUS};
pub use payload::Payload;
pub use report::{
    AnalysisLayer, AnalysisReport, BeginnerReport, CandleBehavior, DeepAnalysis, MetaCritic,
    NewsAnalysis, Strategy, TechnicalLayers,
};
pub use snapshot::{
    default_financials, normalize_ticker, Financials, MarketSnapshot, Snapshot, SnapshotStatus,
    NOT_AVAILABLE,
};
