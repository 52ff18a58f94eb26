//! Submit-then-poll completion loop.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::cancel::CancelToken;

/// Why [`poll_until`] stopped without a value.
#[derive(Debug)]
pub enum PollError<E> {
    /// Still pending when the budget ran out
    BudgetExceeded { elapsed: Duration, polls: u32 },
    /// The check itself failed
    Failed(E),
    Cancelled,
}

/// Call `check` every `interval` until it yields a value.
///
/// The first check happens after one interval. `Ok(None)` means still
/// pending. The loop sleeps between checks and never outlives `budget`.
pub async fn poll_until<F, Fut, T, E>(
    interval: Duration,
    budget: Duration,
    cancel: &CancelToken,
    mut check: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    let deadline = started + budget;
    let mut polls = 0u32;

    loop {
        let wake = (Instant::now() + interval).min(deadline);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = tokio::time::sleep_until(wake) => {}
        }

        polls += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            result = check() => result,
        };
        match result {
            Ok(Some(value)) => return Ok(value),
            Ok(None) if Instant::now() >= deadline => {
                return Err(PollError::BudgetExceeded {
                    elapsed: started.elapsed(),
                    polls,
                })
            }
            Ok(None) => {}
            Err(e) => return Err(PollError::Failed(e)),
        }
    }
}
