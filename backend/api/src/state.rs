use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;

use crate::background::BackgroundTasks;
use crate::config::Environment;
use crate::store::MovieStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub movies: Arc<dyn MovieStore>,
    pub environment: Environment,
    pub started_at: Instant,
    pub registry: Registry,
    pub background: BackgroundTasks,
}

impl AppState {
    pub fn new(movies: Arc<dyn MovieStore>, environment: Environment, registry: Registry) -> Self {
        Self {
            movies,
            environment,
            started_at: Instant::now(),
            registry,
            background: BackgroundTasks::new(),
        }
    }
}
