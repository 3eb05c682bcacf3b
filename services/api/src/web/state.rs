//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::feed::ResponseFeed;
use std::sync::Arc;
use talenthub_core::ports::{CurriculumSearch, EmbeddingService, ReportGenerator, SessionStore};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub curriculum: Arc<dyn CurriculumSearch>,
    pub embedder: Arc<dyn EmbeddingService>,
    pub report_generator: Arc<dyn ReportGenerator>,
    pub config: Arc<Config>,
    pub feed: ResponseFeed,
}
