//! An ordered group of resources that opens and closes as one resource.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tandem_resource::{
    ActiveGuard, Capabilities, Completion, Error, Lifecycle, Resource, Result, Tracker,
    combine_result,
};

use crate::config::CollectionConfig;
use crate::sequence;

const DEFAULT_NAME: &str = "collection";

struct Inner {
    config: CollectionConfig,
    members: RwLock<Vec<Arc<dyn Resource>>>,
    tracker: Tracker,
    /// Close errors from the rollback of the most recent failed open.
    rollback_errors: Mutex<Vec<Error>>,
}

/// An ordered, append-only list of resources with all-or-nothing open.
///
/// `open` opens members first to last and, if one fails, closes the ones it
/// already opened in reverse before reporting that member's error. `close`
/// closes members last to first, never stops on a failure and reports every
/// error combined into one. A `Collection` is itself a [`Resource`], so
/// collections nest.
///
/// Each pass works on a snapshot of the member list taken when the pass
/// starts; members pushed meanwhile are picked up by the next pass.
///
/// Every operation comes in two calling conventions: `async` methods
/// (`open`, `close`, `destroy`) and continuation methods (`open_with`,
/// `close_with`, `destroy_with`) that spawn the same pass on the current
/// tokio runtime and report through a callback.
///
/// Cloning is cheap and yields a handle to the same collection.
#[derive(Clone)]
pub struct Collection {
    inner: Arc<Inner>,
}

impl Collection {
    /// Create an unopened collection holding `members` in order.
    pub fn new<I>(members: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Resource>>,
    {
        Self::build(CollectionConfig::default(), members)
    }

    /// Create a collection from a validated configuration.
    pub fn with_config<I>(config: CollectionConfig, members: I) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<dyn Resource>>,
    {
        config.validate()?;
        Ok(Self::build(config, members))
    }

    fn build<I>(config: CollectionConfig, members: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Resource>>,
    {
        let tracker = if config.opened {
            Tracker::opened()
        } else {
            Tracker::new()
        };
        Self {
            inner: Arc::new(Inner {
                config,
                members: RwLock::new(members.into_iter().collect()),
                tracker,
                rollback_errors: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The configuration this collection was built with.
    #[must_use]
    pub fn config(&self) -> &CollectionConfig {
        &self.inner.config
    }

    /// Label used in tracing output.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.config.name.as_deref().unwrap_or(DEFAULT_NAME)
    }

    /// Append one member.
    pub fn push(&self, member: Arc<dyn Resource>) {
        self.inner.members.write().push(member);
    }

    /// Append several members, keeping their order.
    pub fn extend<I>(&self, members: I)
    where
        I: IntoIterator<Item = Arc<dyn Resource>>,
    {
        self.inner.members.write().extend(members);
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.members.read().len()
    }

    /// The collection has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.members.read().is_empty()
    }

    /// Snapshot of the members in insertion order.
    #[must_use]
    pub fn members(&self) -> Vec<Arc<dyn Resource>> {
        self.inner.members.read().clone()
    }

    /// Iterate over a snapshot of the members in insertion order.
    pub fn iter(&self) -> std::vec::IntoIter<Arc<dyn Resource>> {
        self.members().into_iter()
    }

    /// Current lifecycle state of the collection itself.
    #[must_use]
    pub fn state(&self) -> Lifecycle {
        self.inner.tracker.state()
    }

    /// The collection reports itself opened.
    #[must_use]
    pub fn is_opened(&self) -> bool {
        self.inner.tracker.is_opened()
    }

    /// The collection reports itself closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.tracker.is_closed()
    }

    /// Register an active use; a close waits until it is dropped.
    pub fn active(&self) -> Result<ActiveGuard<'_>> {
        self.inner.tracker.active()
    }

    /// Take the close errors recorded while rolling back the last failed open.
    pub fn take_rollback_errors(&self) -> Vec<Error> {
        std::mem::take(&mut *self.inner.rollback_errors.lock())
    }

    /// Open every member in order.
    ///
    /// On failure the members opened by this pass are closed again in reverse
    /// order, the collection goes back to [`Lifecycle::Unopened`] and the
    /// failing member's error is returned unchanged. Errors from that rollback
    /// are kept for [`take_rollback_errors`](Self::take_rollback_errors).
    #[tracing::instrument(name = "collection.open", level = "debug", skip(self), fields(collection = %self.name()))]
    pub async fn open(&self) -> Result<()> {
        let result = self.inner.tracker.open(|| self.open_members()).await;
        match &result {
            Ok(()) => tracing::info!(state = %self.state(), "collection opened"),
            Err(error) => tracing::warn!(%error, state = %self.state(), "collection failed to open"),
        }
        result
    }

    async fn open_members(&self) -> Result<()> {
        let snapshot = self.members();
        tracing::debug!(members = snapshot.len(), "open pass started");
        self.inner.rollback_errors.lock().clear();

        sequence::open_all(snapshot).await.map_err(|failure| {
            *self.inner.rollback_errors.lock() = failure.rollback;
            failure.error
        })
    }

    /// Close every member in reverse order.
    ///
    /// Every member gets a close attempt; all failures are combined into the
    /// returned error. The collection ends up [`Lifecycle::Closed`] either way.
    /// With `allow_active` one outstanding [`ActiveGuard`] (the caller's own)
    /// does not hold the close back.
    #[tracing::instrument(name = "collection.close", level = "debug", skip(self), fields(collection = %self.name()))]
    pub async fn close(&self, allow_active: bool) -> Result<()> {
        let result = self
            .inner
            .tracker
            .close(allow_active, || self.close_members())
            .await;
        match &result {
            Ok(()) => tracing::info!("collection closed"),
            Err(error) => tracing::warn!(%error, "collection closed with errors"),
        }
        result
    }

    async fn close_members(&self) -> Result<()> {
        let snapshot = self.members();
        tracing::debug!(members = snapshot.len(), "close pass started");
        sequence::close_all(snapshot).await
    }

    /// Close the collection, then report `reason` together with any close error.
    ///
    /// The combined error lists `reason` first. Without a reason and with a
    /// clean close the result is `Ok`.
    #[tracing::instrument(name = "collection.destroy", level = "debug", skip(self, reason), fields(collection = %self.name()))]
    pub async fn destroy(&self, reason: Option<Error>) -> Result<()> {
        let closed = self.inner.tracker.destroy(|| self.close_members()).await;
        tracing::info!(has_reason = reason.is_some(), "collection destroyed");
        combine_result([reason, closed.err()])
    }

    /// Continuation-style [`open`](Self::open).
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn open_with<F>(&self, done: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let this = self.clone();
        tokio::spawn(async move { done(this.open().await) });
    }

    /// Continuation-style [`close`](Self::close).
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn close_with<F>(&self, allow_active: bool, done: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let this = self.clone();
        tokio::spawn(async move { done(this.close(allow_active).await) });
    }

    /// Continuation-style [`destroy`](Self::destroy).
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn destroy_with<F>(&self, reason: Option<Error>, done: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let this = self.clone();
        tokio::spawn(async move { done(this.destroy(reason).await) });
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name())
            .field("state", &self.state())
            .field("member_count", &self.len())
            .finish()
    }
}

impl FromIterator<Arc<dyn Resource>> for Collection {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Resource>>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl Extend<Arc<dyn Resource>> for Collection {
    fn extend<I: IntoIterator<Item = Arc<dyn Resource>>>(&mut self, iter: I) {
        Collection::extend(self, iter);
    }
}

impl IntoIterator for &Collection {
    type Item = Arc<dyn Resource>;
    type IntoIter = std::vec::IntoIter<Arc<dyn Resource>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[async_trait]
impl Resource for Collection {
    fn capabilities(&self) -> Capabilities {
        Capabilities::FULL.with_supports(self.inner.config.supports)
    }

    fn is_opened(&self) -> bool {
        Collection::is_opened(self)
    }

    fn is_closed(&self) -> bool {
        Collection::is_closed(self)
    }

    fn open(&self, done: Completion) {
        self.open_with(done);
    }

    fn close(&self, done: Completion) {
        self.close_with(false, done);
    }

    async fn open_deferred(&self) -> Result<()> {
        Collection::open(self).await
    }

    async fn close_deferred(&self) -> Result<()> {
        Collection::close(self, false).await
    }
}
