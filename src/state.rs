use std::sync::Arc;

use crate::services::analysis_service::AnalysisService;
use crate::services::snapshot_service::SnapshotService;

#[derive(Clone)]
pub struct AppState {
    pub snapshots: Arc<SnapshotService>,
    pub analysis: Arc<AnalysisService>,
}
