//! Cooperative job cancellation.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

const ACTIVE: u8 = 0;
const CANCELLED: u8 = 1;
const SEALED: u8 = 2;

/// Cancellation signal shared by every task of one job.
///
/// Clones observe the same signal. Cancelling is permanent. Once a job is
/// sealed (its result is committed) cancellation is refused; whichever of
/// `cancel` and `seal` comes first wins.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
    state: Arc<AtomicU8>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
            state: Arc::new(AtomicU8::new(ACTIVE)),
        }
    }

    /// Signal cancellation. Returns `false` if the job was already sealed.
    pub fn cancel(&self) -> bool {
        match self
            .state
            .compare_exchange(ACTIVE, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) | Err(CANCELLED) => {
                self.tx.send_replace(true);
                true
            }
            Err(_) => false,
        }
    }

    /// Commit the job's result. Returns `false` if a cancel got there first.
    pub fn seal(&self) -> bool {
        matches!(
            self.state
                .compare_exchange(ACTIVE, SEALED, Ordering::AcqRel, Ordering::Acquire),
            Ok(_) | Err(SEALED)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Raw receiver for FFmpeg runners.
    pub fn receiver(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}
