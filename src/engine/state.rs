use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

/// `Idle → Running → Draining → Stopped`, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EngineState {
    Idle,
    Running,
    /// No new users start; in-flight users finish or hit the grace deadline.
    Draining,
    Stopped,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Cloneable control surface for a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    state: Arc<watch::Sender<EngineState>>,
    stop: Arc<watch::Sender<bool>>,
    users_started: Arc<AtomicU64>,
}

impl EngineHandle {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(EngineState::Idle);
        let (stop, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
            stop: Arc::new(stop),
            users_started: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Requests an early stop. A running engine moves to `Draining` before this
    /// returns, so no user starts afterwards.
    pub fn stop(&self) {
        self.stop.send_replace(true);
        self.state.send_if_modified(|state| {
            if *state == EngineState::Running {
                *state = EngineState::Draining;
                true
            } else {
                false
            }
        });
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn users_started(&self) -> u64 {
        self.users_started.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    pub(super) fn stop_receiver(&self) -> watch::Receiver<bool> {
        self.stop.subscribe()
    }

    /// Moves forward to `next`; earlier or equal states are ignored.
    pub(super) fn advance(&self, next: EngineState) {
        self.state.send_if_modified(|state| {
            if next > *state {
                *state = next;
                true
            } else {
                false
            }
        });
    }

    /// Counts one more user if the engine is still running. Shares the state lock
    /// with [`EngineHandle::stop`], so a start never lands after a stop.
    pub(super) fn admit_user(&self) -> Option<u64> {
        let mut admitted = None;
        self.state.send_if_modified(|state| {
            if *state == EngineState::Running {
                let previous = self.users_started.fetch_add(1, Ordering::AcqRel);
                admitted = Some(previous.saturating_add(1));
            }
            false
        });
        admitted
    }
}

/// Resolves once the flag is set. Never resolves if the sender is gone.
pub(super) async fn flag_raised(flag: &mut watch::Receiver<bool>) {
    let closed = flag.wait_for(|raised| *raised).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}
