//! Cooperative cancellation.
//!
//! A [`CancelHandle`] flips a [`CancelSignal`]. Signals are cheap to clone and
//! can be linked, so a per-call signal and a client-wide signal can be
//! observed together.

use std::future::{Future, pending};

use futures_util::future::select_all;
use tokio::sync::watch;

use crate::{Error, Result};

/// Owner side of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Returns `true` once [`CancelHandle::cancel`] was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// A new signal observing this handle.
    #[must_use]
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            sources: vec![self.sender.subscribe()],
        }
    }
}

/// Observer side of one or more cancellation sources.
///
/// The default signal has no source and is never cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    sources: Vec<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// Create a handle and a signal observing it.
    ///
    /// ```
    /// use grapnel_core::CancelSignal;
    ///
    /// let (handle, signal) = CancelSignal::pair();
    /// assert!(!signal.is_cancelled());
    /// handle.cancel();
    /// assert!(signal.is_cancelled());
    /// ```
    #[must_use]
    pub fn pair() -> (CancelHandle, Self) {
        let (sender, receiver) = watch::channel(false);
        (
            CancelHandle { sender },
            Self {
                sources: vec![receiver],
            },
        )
    }

    /// A signal that never fires.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns `true` if any source has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.sources.iter().any(|source| *source.borrow())
    }

    /// A signal firing when either `self` or `other` fires.
    #[must_use]
    pub fn linked(&self, other: &Self) -> Self {
        let mut sources = self.sources.clone();
        sources.extend(other.sources.iter().cloned());
        Self { sources }
    }

    /// Resolves once any source is cancelled.
    ///
    /// Never resolves if there is no source, or if every handle was dropped
    /// without cancelling.
    pub async fn cancelled(&self) {
        if self.sources.is_empty() {
            return pending().await;
        }

        let waits = self.sources.iter().cloned().map(|mut source| {
            Box::pin(async move {
                let closed = source.wait_for(|cancelled| *cancelled).await.is_err();
                if closed {
                    pending::<()>().await;
                }
            })
        });
        select_all(waits).await;
    }

    /// Drive `future` unless the signal fires first.
    ///
    /// An already cancelled signal fails without polling `future`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] on cancellation, otherwise the future's own
    /// result.
    pub async fn run<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tokio::select! {
            biased;
            () = self.cancelled() => Err(Error::Cancelled),
            result = future => result,
        }
    }
}

impl From<&CancelHandle> for CancelSignal {
    fn from(handle: &CancelHandle) -> Self {
        handle.signal()
    }
}
