use std::sync::Arc;

use crate::detect::engine::AnalysisEngine;
use crate::storage::history::AnalysisStore;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AnalysisEngine>,
    pub store: AnalysisStore,
}
