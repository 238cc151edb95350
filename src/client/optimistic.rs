//! Optimistic toggles
//!
//! A like or save flips on screen before the server answers. The server
//! value then replaces the tentative one, or the previous value comes back
//! if the request failed.

use std::future::Future;

/// Lifecycle of one optimistic action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionState<T> {
    Idle(T),
    /// Shown `tentative` while the request is in flight
    Pending { previous: T, tentative: T },
    /// Server confirmed
    Committed(T),
    /// Request failed, previous value restored
    Reverted(T),
}

/// Value with an optimistic update in flight at most once
#[derive(Debug, Clone)]
pub struct Optimistic<T> {
    state: ActionState<T>,
}

impl<T: Clone> Optimistic<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: ActionState::Idle(value),
        }
    }

    pub fn state(&self) -> &ActionState<T> {
        &self.state
    }

    /// Value to display right now
    pub fn value(&self) -> &T {
        match &self.state {
            ActionState::Idle(value)
            | ActionState::Committed(value)
            | ActionState::Reverted(value) => value,
            ActionState::Pending { tentative, .. } => tentative,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, ActionState::Pending { .. })
    }

    /// Show `tentative` immediately. Returns false if an action is already
    /// in flight; the caller should drop the second click.
    pub fn apply(&mut self, tentative: T) -> bool {
        if self.is_pending() {
            return false;
        }
        let previous = self.value().clone();
        self.state = ActionState::Pending {
            previous,
            tentative,
        };
        true
    }

    /// Replace the tentative value with what the server reported.
    pub fn commit(&mut self, confirmed: T) {
        self.state = ActionState::Committed(confirmed);
    }

    /// Restore the value from before [`apply`](Self::apply).
    pub fn revert(&mut self) {
        let restored = match &self.state {
            ActionState::Pending { previous, .. } => previous.clone(),
            _ => self.value().clone(),
        };
        self.state = ActionState::Reverted(restored);
    }

    /// Apply, await `action`, then commit or revert.
    ///
    /// Returns `None` when another action was already pending.
    pub async fn run<F, Fut, E>(&mut self, tentative: T, action: F) -> Option<Result<T, E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.apply(tentative) {
            return None;
        }
        match action().await {
            Ok(confirmed) => {
                self.commit(confirmed.clone());
                Some(Ok(confirmed))
            }
            Err(error) => {
                self.revert();
                Some(Err(error))
            }
        }
    }
}

/// `(liked, like_count)` after flipping a like locally
pub fn toggled_like(liked: bool, like_count: i64) -> (bool, i64) {
    if liked {
        (false, (like_count - 1).max(0))
    } else {
        (true, like_count + 1)
    }
}
