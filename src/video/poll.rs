//! Fixed-interval polling with a hard deadline.

use crate::error::{Result, VideogenError};
use std::future::Future;
use std::time::{Duration, Instant};

/// Observed job state from a single status fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PollState<T> {
    /// The job has not reached a terminal state yet.
    Pending,
    /// The job finished and produced an artifact.
    Succeeded(T),
    /// The provider reported the job as failed.
    Failed(String),
}

/// Drives `fetch` at a fixed interval until the job reaches a terminal state.
///
/// The deadline is checked before every fetch; expiry maps to
/// [`VideogenError::Timeout`], a reported failure to
/// [`VideogenError::VideoGeneration`]. Fetch errors propagate unchanged, so a
/// transient network blip surfaces as a polling failure rather than being
/// retried.
pub(crate) async fn poll_until_terminal<T, F, Fut>(
    mut fetch: F,
    interval: Duration,
    timeout: Duration,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollState<T>>>,
{
    let start = Instant::now();

    loop {
        if start.elapsed() > timeout {
            return Err(VideogenError::Timeout(timeout));
        }

        match fetch().await? {
            PollState::Pending => {
                tracing::debug!(
                    elapsed_secs = start.elapsed().as_secs(),
                    "job still pending"
                );
                tokio::time::sleep(interval).await;
            }
            PollState::Succeeded(value) => return Ok(value),
            PollState::Failed(message) => return Err(VideogenError::VideoGeneration(message)),
        }
    }
}
