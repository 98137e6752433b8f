//! Lifecycle state tracking shared by resources that own an open/close step.
//!
//! [`Tracker`] owns the [`Lifecycle`] of one resource and serializes its
//! transitions: overlapping `open`/`close`/`destroy` calls queue on a
//! transition lock, so a close issued while an open is in flight waits for
//! the open to finish. It also counts active uses through [`ActiveGuard`];
//! a close waits until those drain.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::lifecycle::Lifecycle;

/// Lifecycle state plus transition serialization for one resource.
#[derive(Debug)]
pub struct Tracker {
    state: Mutex<Lifecycle>,
    /// Opened was reported without an open pass having run.
    seeded: AtomicBool,
    transition: tokio::sync::Mutex<()>,
    actives: AtomicUsize,
    idle: Notify,
}

impl Tracker {
    /// A tracker in the [`Lifecycle::Unopened`] state.
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(Lifecycle::Unopened, false)
    }

    /// A tracker that reports [`Lifecycle::Opened`] before any open pass.
    ///
    /// The first explicit [`open`](Self::open) still runs its operation.
    #[must_use]
    pub fn opened() -> Self {
        Self::with_state(Lifecycle::Opened, true)
    }

    fn with_state(state: Lifecycle, seeded: bool) -> Self {
        Self {
            state: Mutex::new(state),
            seeded: AtomicBool::new(seeded),
            transition: tokio::sync::Mutex::new(()),
            actives: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> Lifecycle {
        *self.state.lock()
    }

    /// The resource is open.
    #[must_use]
    pub fn is_opened(&self) -> bool {
        self.state() == Lifecycle::Opened
    }

    /// The resource is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() == Lifecycle::Closed
    }

    /// Opened was pre-seeded and no open pass has run since.
    #[must_use]
    pub fn is_seeded(&self) -> bool {
        self.seeded.load(Ordering::Acquire)
    }

    /// Number of outstanding [`ActiveGuard`]s.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.actives.load(Ordering::Acquire)
    }

    /// Run `op` as this resource's open step.
    ///
    /// Already opened (by a real pass): returns `Ok` without running `op`.
    /// Closing, closed or destroying: fails with [`Error::Closed`]. On
    /// failure the state returns to [`Lifecycle::Unopened`].
    pub async fn open<F, Fut>(&self, op: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let _transition = self.transition.lock().await;

        match self.state() {
            Lifecycle::Opened if !self.is_seeded() => return Ok(()),
            state if state.is_shutting_down() => return Err(Error::Closed),
            _ => {}
        }

        self.set(Lifecycle::Opening)?;
        let mut reset = Reset::new(self, Lifecycle::Unopened);
        let result = op().await;
        reset.disarm();
        self.seeded.store(false, Ordering::Release);

        match result {
            Ok(()) => {
                self.set(Lifecycle::Opened)?;
                Ok(())
            }
            Err(err) => {
                self.set(Lifecycle::Unopened)?;
                Err(err)
            }
        }
    }

    /// Run `op` as this resource's close step.
    ///
    /// Already closed: `Ok` without running `op`. Never opened: moves straight
    /// to [`Lifecycle::Closed`] without running `op`. Otherwise waits for
    /// active uses to drain (one may remain when `allow_active` is set), runs
    /// `op` and ends in [`Lifecycle::Closed`] whatever `op` returned.
    pub async fn close<F, Fut>(&self, allow_active: bool, op: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.shut_down(Lifecycle::Closing, allow_active, op).await
    }

    /// Like [`close`](Self::close), but passes through [`Lifecycle::Destroying`].
    pub async fn destroy<F, Fut>(&self, op: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.shut_down(Lifecycle::Destroying, false, op).await
    }

    async fn shut_down<F, Fut>(&self, via: Lifecycle, allow_active: bool, op: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let _transition = self.transition.lock().await;

        match self.state() {
            Lifecycle::Closed => return Ok(()),
            Lifecycle::Unopened => {
                self.set(Lifecycle::Closed)?;
                return Ok(());
            }
            _ => {}
        }

        self.set(via)?;
        let mut reset = Reset::new(self, Lifecycle::Closed);
        self.wait_idle(usize::from(allow_active)).await;
        let result = op().await;
        reset.disarm();

        self.seeded.store(false, Ordering::Release);
        self.set(Lifecycle::Closed)?;
        result
    }

    /// Register one active use.
    ///
    /// Fails with [`Error::Closed`] unless the resource is opening or opened.
    pub fn active(&self) -> Result<ActiveGuard<'_>> {
        let state = self.state.lock();
        if !state.accepts_active() {
            return Err(Error::Closed);
        }
        self.actives.fetch_add(1, Ordering::AcqRel);
        drop(state);
        Ok(ActiveGuard { tracker: self })
    }

    async fn wait_idle(&self, allowed: usize) {
        loop {
            let notified = self.idle.notified();
            let mut notified = std::pin::pin!(notified);
            notified.as_mut().enable();
            if self.active_count() <= allowed {
                return;
            }
            tracing::debug!(
                actives = self.active_count(),
                allowed,
                "waiting for active uses to drain"
            );
            notified.await;
        }
    }

    fn set(&self, to: Lifecycle) -> Result<()> {
        let mut state = self.state.lock();
        let from = *state;
        if !from.can_transition_to(to) {
            return Err(Error::InvalidStateTransition { from, to });
        }
        *state = to;
        drop(state);
        tracing::trace!(%from, %to, "lifecycle transition");
        Ok(())
    }

    fn force(&self, to: Lifecycle) {
        *self.state.lock() = to;
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII marker for one active use of a resource.
///
/// While any guard is alive a close waits before running its step.
#[derive(Debug)]
pub struct ActiveGuard<'a> {
    tracker: &'a Tracker,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.tracker.actives.fetch_sub(1, Ordering::AcqRel);
        self.tracker.idle.notify_waiters();
    }
}

/// Puts the tracker into a settled state if a pass future is dropped mid-flight.
struct Reset<'a> {
    tracker: &'a Tracker,
    fallback: Lifecycle,
    armed: bool,
}

impl<'a> Reset<'a> {
    fn new(tracker: &'a Tracker, fallback: Lifecycle) -> Self {
        Self {
            tracker,
            fallback,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for Reset<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(fallback = %self.fallback, "lifecycle pass dropped before completion");
            self.tracker.force(self.fallback);
        }
    }
}
