use crate::controller::Controller;
use crate::outputs::report::ReportFormatter;
use crate::search::NewsSearcher;
use crate::search::newsapi::NewsBackend;
use std::sync::Arc;

/// Shared by every handler.
pub struct AppState {
    pub controller: Arc<Controller>,
    /// Raw news backend for the diagnostic endpoint.
    pub news: Arc<dyn NewsBackend>,
    pub searcher: NewsSearcher,
    pub formatter: ReportFormatter,
}
