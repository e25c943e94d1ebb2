//! Cancellation and deadline context
//!
//! Every blob store call and every manifest operation takes a [`Context`].
//! Cancelling the token or passing the deadline makes in-flight work
//! resolve to [`Canceled`].

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Marker error for work abandoned because its context finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation canceled")]
pub struct Canceled;

/// Cancellation token plus optional deadline
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Context that is never canceled and has no deadline
    #[inline]
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Context driven by an existing token
    #[inline]
    #[must_use]
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Add a deadline; an earlier existing deadline wins
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Add a deadline `timeout` from now
    #[inline]
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Context canceled together with `self`, but cancellable on its own
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and all of its children
    #[inline]
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[inline]
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    #[inline]
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once canceled or past the deadline
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the context is canceled or the deadline passes
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.token.cancelled() => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Drive `fut` unless the context finishes first
    ///
    /// # Errors
    /// Returns [`Canceled`] if the context is already done or finishes
    /// before `fut` completes; `fut` is dropped in that case
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Canceled> {
        if self.is_done() {
            return Err(Canceled);
        }
        tokio::select! {
            biased;
            () = self.done() => Err(Canceled),
            out = fut => Ok(out),
        }
    }

    /// `Err(Canceled)` if the context is done
    ///
    /// # Errors
    /// Returns [`Canceled`] once canceled or past the deadline
    #[inline]
    pub fn check(&self) -> Result<(), Canceled> {
        if self.is_done() {
            Err(Canceled)
        } else {
            Ok(())
        }
    }
}
