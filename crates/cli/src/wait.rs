// Polling until a worker finishes
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use pidwatch_core::application::ProcessHandle;
use pidwatch_core::domain::ProcessState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Terminal state reached (`Finished` or `Corrupt`)
    Finished(ProcessState),
    /// Deadline passed while the worker was still live
    TimedOut { last: ProcessState },
}

/// Poll `handle` every `interval` until it reaches a terminal state
///
/// Polling goes through `ProcessHandle::state`, so a dead worker's PID file
/// is cleaned up as a side effect. Without `timeout` this waits forever.
pub async fn wait_for_exit(
    handle: &ProcessHandle,
    interval: Duration,
    timeout: Option<Duration>,
) -> WaitOutcome {
    let deadline = timeout.map(|t| Instant::now() + t);

    loop {
        let state = handle.state();
        if state.is_terminal() {
            return WaitOutcome::Finished(state);
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            return WaitOutcome::TimedOut { last: state };
        }

        debug!(worker_id = %handle.id(), state = %state, "Worker still live");
        sleep(interval).await;
    }
}
