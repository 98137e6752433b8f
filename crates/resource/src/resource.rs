//! The single-resource open/close contract.
//!
//! A [`Resource`] may implement open, close, both or neither, and may do so in
//! continuation style (a [`Completion`] callback) or deferred style (an async
//! method). Which of these apply is declared through [`Capabilities`] so
//! callers never have to guess from the concrete type.

use async_trait::async_trait;

use crate::error::Result;

/// Continuation handed to continuation-style operations.
///
/// Must be called exactly once with the outcome of the operation.
pub type Completion = Box<dyn FnOnce(Result<()>) + Send + 'static>;

/// Calling conventions a resource understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Supports {
    /// `open(done)` / `close(done)` may be called.
    pub callbacks: bool,
    /// `open_deferred()` / `close_deferred()` may be awaited.
    pub deferred: bool,
}

impl Supports {
    /// Continuation style only.
    pub const CALLBACKS: Self = Self {
        callbacks: true,
        deferred: false,
    };
    /// Deferred style only.
    pub const DEFERRED: Self = Self {
        callbacks: false,
        deferred: true,
    };
    /// Either convention.
    pub const BOTH: Self = Self {
        callbacks: true,
        deferred: true,
    };

    /// The resource must be driven through its deferred methods.
    #[must_use]
    pub fn deferred_only(self) -> bool {
        self.deferred && !self.callbacks
    }
}

impl Default for Supports {
    fn default() -> Self {
        Self::CALLBACKS
    }
}

/// Which lifecycle operations a resource provides, and how to call them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Capabilities {
    /// The resource has an open step.
    pub open: bool,
    /// The resource has a close step.
    pub close: bool,
    /// Supported calling conventions.
    pub supports: Supports,
}

impl Capabilities {
    /// Open and close, continuation style.
    pub const FULL: Self = Self {
        open: true,
        close: true,
        supports: Supports::CALLBACKS,
    };

    /// Open step only.
    #[must_use]
    pub fn open_only() -> Self {
        Self {
            close: false,
            ..Self::FULL
        }
    }

    /// Close step only.
    #[must_use]
    pub fn close_only() -> Self {
        Self {
            open: false,
            ..Self::FULL
        }
    }

    /// Neither step; the resource is inert for lifecycle purposes.
    #[must_use]
    pub fn none() -> Self {
        Self {
            open: false,
            close: false,
            ..Self::FULL
        }
    }

    /// Replace the supported calling conventions.
    #[must_use]
    pub fn with_supports(mut self, supports: Supports) -> Self {
        self.supports = supports;
        self
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::FULL
    }
}

/// A unit with an open/close lifecycle.
///
/// Every method has a default, so an implementation only overrides what it
/// actually does. The default flags read `false` ("not yet in that phase")
/// and the default operations complete immediately with success.
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    /// Declared operations and calling conventions.
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// The resource is already open; an open request is satisfied.
    fn is_opened(&self) -> bool {
        false
    }

    /// The resource is already closed; a close request is satisfied.
    fn is_closed(&self) -> bool {
        false
    }

    /// Continuation-style open. `done` must be called exactly once.
    fn open(&self, done: Completion) {
        done(Ok(()));
    }

    /// Continuation-style close. `done` must be called exactly once.
    fn close(&self, done: Completion) {
        done(Ok(()));
    }

    /// Deferred-style open.
    async fn open_deferred(&self) -> Result<()> {
        Ok(())
    }

    /// Deferred-style close.
    async fn close_deferred(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Inert;

    impl Resource for Inert {}

    #[test]
    fn default_capabilities_are_callback_style() {
        let caps = Capabilities::default();
        assert!(caps.open && caps.close);
        assert_eq!(caps.supports, Supports::CALLBACKS);
        assert!(!caps.supports.deferred_only());
    }

    #[test]
    fn deferred_only_requires_no_callbacks() {
        assert!(Supports::DEFERRED.deferred_only());
        assert!(!Supports::BOTH.deferred_only());
    }

    #[test]
    fn partial_capabilities() {
        assert!(!Capabilities::open_only().close);
        assert!(!Capabilities::close_only().open);
        let none = Capabilities::none().with_supports(Supports::BOTH);
        assert!(!none.open && !none.close);
        assert_eq!(none.supports, Supports::BOTH);
    }

    #[tokio::test]
    async fn defaults_succeed_immediately() {
        let inert = Inert;
        assert!(!inert.is_opened());
        assert!(!inert.is_closed());

        let (tx, rx) = tokio::sync::oneshot::channel();
        inert.open(Box::new(move |result| {
            let _ = tx.send(result);
        }));
        assert!(rx.await.unwrap().is_ok());
        assert!(inert.close_deferred().await.is_ok());
    }
}
