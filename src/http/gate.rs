use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::time::Instant;

use crate::error::StepError;

/// Bounded connection pool ceiling. Acquiring a slot is a suspend point; time
/// spent waiting is reported as backpressure.
#[derive(Debug, Clone)]
pub struct ConnectionGate {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    /// Set when no slot was free at the time of the request.
    pub waited: Option<Duration>,
}

impl ConnectionGate {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    #[must_use]
    pub fn in_use(&self) -> usize {
        self.limit
            .saturating_sub(self.semaphore.available_permits())
    }

    /// Waits for a free slot.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Cancelled`] once the gate has been closed.
    pub async fn acquire(&self) -> Result<GatePermit, StepError> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(GatePermit {
                _permit: permit,
                waited: None,
            }),
            Err(TryAcquireError::NoPermits) => {
                let started = Instant::now();
                let permit = Arc::clone(&self.semaphore)
                    .acquire_owned()
                    .await
                    .ok()
                    .ok_or(StepError::Cancelled)?;
                Ok(GatePermit {
                    _permit: permit,
                    waited: Some(started.elapsed()),
                })
            }
            Err(TryAcquireError::Closed) => Err(StepError::Cancelled),
        }
    }

    /// Wakes every waiter with [`StepError::Cancelled`].
    pub fn close(&self) {
        self.semaphore.close();
    }
}
