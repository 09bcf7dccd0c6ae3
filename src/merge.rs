use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use tracing::{debug, warn};

use crate::error::MergeError;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Runs `work` to completion regardless of `cancel`.
///
/// The work runs on its own thread and is always joined. If `cancel` was
/// raised in the meantime the result is dropped and
/// [`MergeError::Cancelled`] is returned so the caller's lifecycle still
/// sees the cancellation.
pub fn run_shielded<T, F>(cancel: &CancelToken, work: F) -> Result<T, MergeError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let handle = thread::spawn(work);
    let outcome = handle
        .join()
        .map_err(|_| MergeError::Failed("merge worker panicked".to_string()))?;
    if cancel.is_cancelled() {
        debug!("merge finished after cancellation");
        return Err(MergeError::Cancelled);
    }
    outcome.map_err(|err| {
        warn!(error = %format!("{err:#}"), "merge failed");
        MergeError::Failed(format!("{err:#}"))
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn completes_and_returns_value() {
        let cancel = CancelToken::new();
        let result = run_shielded(&cancel, || Ok(7));
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn cancellation_mid_flight_still_runs_to_completion() {
        let cancel = CancelToken::new();
        let finished = Arc::new(AtomicUsize::new(0));
        let worker_cancel = cancel.clone();
        let worker_finished = finished.clone();

        let result = run_shielded(&cancel, move || {
            worker_cancel.cancel();
            std::thread::sleep(std::time::Duration::from_millis(20));
            worker_finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(result, Err(MergeError::Cancelled));
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_is_reported_as_failed() {
        let cancel = CancelToken::new();
        let result: Result<(), MergeError> =
            run_shielded(&cancel, || Err(anyhow::anyhow!("source offline")));
        assert_eq!(result, Err(MergeError::Failed("source offline".into())));
    }
}
