use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

struct State {
    cancelled: bool,
    children: Vec<Weak<Inner>>,
}

struct Inner {
    state: Mutex<State>,
    condvar: Condvar,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel(&self) {
        let children = {
            let mut state = self.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            std::mem::take(&mut state.children)
        };
        self.condvar.notify_all();
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

/// A close-once cancellation signal shared by every clone.
///
/// Cancelling is idempotent and never blocks on the parties that observe it. Tokens can be
/// linked so that cancelling a parent also cancels its children, but not the other way round.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken").field("cancelled", &self.is_cancelled()).finish()
    }
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        CancelToken {
            inner: Arc::new(Inner {
                state: Mutex::new(State { cancelled: false, children: Vec::new() }),
                condvar: Condvar::new(),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.lock().cancelled
    }

    /// A new token that is cancelled together with `self`.
    #[must_use]
    pub fn child(&self) -> CancelToken {
        let child = CancelToken::new();
        self.link(&child);
        child
    }

    /// Cancels `child` whenever `self` gets cancelled, immediately if it already is.
    pub fn link(&self, child: &CancelToken) {
        let already_cancelled = {
            let mut state = self.inner.lock();
            if !state.cancelled {
                state.children.retain(|weak| weak.strong_count() > 0);
                state.children.push(Arc::downgrade(&child.inner));
            }
            state.cancelled
        };
        if already_cancelled {
            child.cancel();
        }
    }

    /// Blocks for at most `timeout`. Returns `true` as soon as the token is cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until(deadline),
            None => self.wait(),
        }
    }

    /// Blocks until `deadline`. Returns `true` as soon as the token is cancelled.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut state = self.inner.lock();
        while !state.cancelled {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self.inner.condvar.wait_timeout(state, deadline - now).unwrap_or_else(PoisonError::into_inner).0;
        }
        true
    }

    /// Blocks until the token is cancelled.
    pub fn wait(&self) -> bool {
        let mut state = self.inner.lock();
        while !state.cancelled {
            state = self.inner.condvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        true
    }
}
