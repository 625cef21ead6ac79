use crate::services::Monitor;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Monitor shared by the HTTP handlers and the reconciliation loop.
pub type AppState<R> = Arc<Mutex<Monitor<R>>>;

pub fn new_state<R>(monitor: Monitor<R>) -> AppState<R> {
    Arc::new(Mutex::new(monitor))
}
