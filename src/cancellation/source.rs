//! The owning side of a cancellation token

use parking_lot::Mutex;
use std::fmt;

use super::token::{CancellationRegistration, CancellationToken};

/// Owns a [`CancellationToken`] and is the only way to cancel it.
///
/// A source can be linked to at most one parent token. When the parent is
/// cancelled the source's token is cancelled too; the reverse never happens.
/// The link is a listener registration on the parent that refers back to
/// this source weakly, so neither side keeps the other alive.
pub struct CancellationTokenSource {
    token: CancellationToken,
    parent: Mutex<Option<CancellationRegistration>>,
}

impl CancellationTokenSource {
    /// Create a standalone cancellation scope
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            parent: Mutex::new(None),
        }
    }

    /// Create a source whose token is cancelled whenever `parent` is.
    ///
    /// If `parent` is already cancelled, so is the new token.
    pub fn with_parent(parent: &CancellationToken) -> Self {
        let source = Self::new();
        source.link(parent);
        source
    }

    /// The token owned by this source
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Request cancellation. Subsequent calls have no effect.
    pub fn cancel(&self) {
        if self.token.trigger() {
            let link = self.parent.lock().take();
            drop(link);
        }
    }

    /// Link this source to `parent`, replacing any previous link.
    pub fn link(&self, parent: &CancellationToken) {
        if self.token.is_cancellation_requested() {
            return;
        }

        let child = self.token.downgrade();
        let registration = parent.on_cancelled(move || {
            if let Some(inner) = child.upgrade() {
                inner.cancel();
            }
        });

        // Already-cancelled parents run the listener inline, leaving nothing to hold.
        if self.token.is_cancellation_requested() {
            return;
        }

        let previous = self.parent.lock().replace(registration);
        drop(previous);
    }

    /// Whether this source is still listening to a parent token.
    pub fn is_linked(&self) -> bool {
        self.parent.lock().is_some() && !self.token.is_cancellation_requested()
    }
}

impl Default for CancellationTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationTokenSource")
            .field("token", &self.token)
            .field("linked", &self.is_linked())
            .finish()
    }
}
