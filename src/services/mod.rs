pub mod analysis_service;
pub mod generation_service;
pub mod highlights_service;
pub mod indicators;
pub mod output_repair;
pub mod reconciler;
pub mod snapshot_service;
pub mod waterfall;
