//! Cancellation and deadline handles for in-flight requests.
//!
//! A [`Cancellation`] travels with a [`Request`](crate::Request) and is attached
//! to the transport-level request before it is executed. Transports race the
//! network call against it; the client races the body read against it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// A cancellation token with an optional deadline.
///
/// The default value never fires. Clones share the same cancel signal.
///
/// # Examples
///
/// ```
/// use gqlclient::Cancellation;
/// use std::time::Duration;
///
/// let (cancellation, handle) = Cancellation::new();
/// let cancellation = cancellation.with_timeout(Duration::from_secs(5));
///
/// assert!(!cancellation.is_cancelled());
/// handle.cancel();
/// assert!(cancellation.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    deadline: Option<Instant>,
    signal: Option<Arc<Signal>>,
}

#[derive(Debug, Default)]
struct Signal {
    fired: AtomicBool,
    notify: Notify,
}

/// Fires the [`Cancellation`] it was created with.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    signal: Arc<Signal>,
}

/// Why a future raced against a [`Cancellation`] did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// The handle was cancelled.
    Cancelled,
    /// The deadline passed.
    DeadlineExceeded,
}

impl Cancellation {
    /// Creates a cancellable token and the handle that fires it.
    pub fn new() -> (Self, CancelHandle) {
        let signal = Arc::new(Signal::default());
        let cancellation = Self {
            deadline: None,
            signal: Some(signal.clone()),
        };
        (cancellation, CancelHandle { signal })
    }

    /// A token that never fires.
    pub fn never() -> Self {
        Self::default()
    }

    /// Sets an absolute deadline, replacing any earlier one.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` if the token was cancelled or its deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        self.interruption().is_some()
    }

    fn interruption(&self) -> Option<Interrupted> {
        if let Some(signal) = &self.signal {
            if signal.fired.load(Ordering::Acquire) {
                return Some(Interrupted::Cancelled);
            }
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interrupted::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the token fires. Pending forever for [`Cancellation::never`].
    pub async fn cancelled(&self) -> Interrupted {
        let signalled = async {
            match &self.signal {
                Some(signal) => signal.wait().await,
                None => std::future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = signalled => Interrupted::Cancelled,
            _ = expired => Interrupted::DeadlineExceeded,
        }
    }

    /// Drives `future` to completion unless the token fires first.
    ///
    /// A token that already fired interrupts without polling `future`.
    pub async fn run<F>(&self, future: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        if let Some(reason) = self.interruption() {
            return Err(reason);
        }

        tokio::select! {
            biased;
            reason = self.cancelled() => Err(reason),
            output = future => Ok(output),
        }
    }
}

impl CancelHandle {
    /// Fires the token. Idempotent.
    pub fn cancel(&self) {
        self.signal.fired.store(true, Ordering::Release);
        self.signal.notify.notify_waiters();
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.signal.fired.load(Ordering::Acquire)
    }
}

impl Signal {
    async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel is not missed.
            notified.as_mut().enable();
            if self.fired.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Display for Interrupted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interrupted::Cancelled => f.write_str("request cancelled"),
            Interrupted::DeadlineExceeded => f.write_str("request deadline exceeded"),
        }
    }
}
