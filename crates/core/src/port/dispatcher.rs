// Async Dispatch Port - hands the participant-driving step to a worker

use crate::error::{AppError, Result};
use futures::future::BoxFuture;

/// A scheduled unit of work. No result value flows back to the submitter;
/// success or failure of the dispatched drive is observable only through
/// repository state.
pub type DispatchTask = BoxFuture<'static, ()>;

/// Dispatch capability: accepted, or a scheduling failure surfaced
/// synchronously to the submitter
pub trait TaskDispatcher: Send + Sync {
    fn submit(&self, task: DispatchTask) -> Result<()>;
}

/// Spawns tasks on the current Tokio runtime (production)
pub struct TokioDispatcher;

impl TaskDispatcher for TokioDispatcher {
    fn submit(&self, task: DispatchTask) -> Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| AppError::DispatchFailed(e.to_string()))?;
        handle.spawn(task);
        Ok(())
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Collects submitted tasks so tests drain them deterministically
    pub struct ManualDispatcher {
        queued: Mutex<Vec<DispatchTask>>,
    }

    impl ManualDispatcher {
        pub fn new() -> Self {
            Self {
                queued: Mutex::new(Vec::new()),
            }
        }

        /// Take all queued tasks; the test awaits them itself
        pub fn drain(&self) -> Vec<DispatchTask> {
            std::mem::take(&mut self.queued.lock().unwrap())
        }

        pub fn queued_len(&self) -> usize {
            self.queued.lock().unwrap().len()
        }
    }

    impl Default for ManualDispatcher {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TaskDispatcher for ManualDispatcher {
        fn submit(&self, task: DispatchTask) -> Result<()> {
            self.queued.lock().unwrap().push(task);
            Ok(())
        }
    }

    /// Always fails to schedule
    pub struct RejectingDispatcher;

    impl TaskDispatcher for RejectingDispatcher {
        fn submit(&self, _task: DispatchTask) -> Result<()> {
            Err(AppError::DispatchFailed("dispatcher rejected task".into()))
        }
    }
}
