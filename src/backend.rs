use crate::events::LoadEvent;
use crate::loader::LoaderConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Set to `true` when the request holding it has been superseded.
pub type CancelFlag = Arc<AtomicBool>;

pub fn new_cancel_flag() -> CancelFlag {
    Arc::new(AtomicBool::new(false))
}

pub fn is_cancelled(flag: Option<&CancelFlag>) -> bool {
    flag.is_some_and(|f| f.load(Ordering::Relaxed))
}

/// One "load this file" request.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub generation: u64,
    pub path: PathBuf,
    pub config: LoaderConfig,
    pub cancel_flag: CancelFlag,
}

/// Abstract backend interface for file loading.
/// Implementations run loads on a background thread/task
/// and queue LoadEvents for the model to poll each frame.
pub trait Backend: Send {
    /// Take all pending events (called by model each frame).
    /// Returns events and clears the internal queue.
    fn take_events(&self) -> Vec<LoadEvent>;

    /// Queue a load. Events for it carry `request.generation`.
    fn load(&self, request: LoadRequest);

    /// Drop requests that have not started yet.
    fn cancel_all(&self);
}
