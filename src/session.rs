use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Caller-side bookkeeping for overlapping searches.
///
/// Each [`SearchSession::begin`] bumps the generation counter and cancels the
/// previous search, so a superseded stream goes quiet instead of delivering
/// stale results.
#[derive(Debug, Clone, Default)]
pub struct SearchSession {
    latest: Arc<AtomicU64>,
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, cancelling whatever was in flight.
    pub fn begin(&self) -> SearchTicket {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();

        let previous = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(token.clone());
        if let Some(prev) = previous {
            prev.cancel();
        }

        tracing::debug!(generation, "search generation started");
        SearchTicket {
            generation,
            token,
            latest: Arc::clone(&self.latest),
        }
    }

    /// Cancel the in-flight search, if any.
    pub fn cancel_current(&self) {
        let current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(token) = current {
            token.cancel();
        }
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

/// Identifies one search: its generation and its cancellation signal.
#[derive(Debug, Clone)]
pub struct SearchTicket {
    generation: u64,
    token: CancellationToken,
    latest: Arc<AtomicU64>,
}

impl SearchTicket {
    /// A ticket for a one-off search outside any session.
    pub fn detached() -> Self {
        Self {
            generation: 1,
            token: CancellationToken::new(),
            latest: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Still the newest search and not cancelled.
    pub fn is_current(&self) -> bool {
        !self.token.is_cancelled() && self.latest.load(Ordering::SeqCst) == self.generation
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}
