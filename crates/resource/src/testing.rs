//! Test doubles for lifecycle coordination.
//!
//! [`MockResource`] is a configurable [`Resource`] that records every call it
//! receives into a shared [`CallLog`]. Each invocation is logged twice, once
//! when it starts and once when it settles, so tests can check both ordering
//! and that no two operations overlapped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Operation, Result};
use crate::resource::{Capabilities, Completion, Resource, Supports};

/// Whether a recorded call was starting or settling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The operation was invoked.
    Started,
    /// The operation reported its outcome.
    Settled,
}

/// Record of one lifecycle call for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceCall {
    /// Name of the mock that received the call.
    pub member: String,
    /// Open or close.
    pub operation: Operation,
    /// Start or settlement.
    pub phase: Phase,
}

/// Shared, append-only log of calls across several mocks.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<ResourceCall>>>,
}

impl CallLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, member: &str, operation: Operation, phase: Phase) {
        self.calls.lock().push(ResourceCall {
            member: member.to_string(),
            operation,
            phase,
        });
    }

    /// Every recorded call, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<ResourceCall> {
        self.calls.lock().clone()
    }

    /// Names of members whose `operation` was started, in start order.
    #[must_use]
    pub fn started(&self, operation: Operation) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.operation == operation && call.phase == Phase::Started)
            .map(|call| call.member.clone())
            .collect()
    }

    /// How many times `member` had `operation` started.
    #[must_use]
    pub fn count(&self, member: &str, operation: Operation) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| {
                call.member == member && call.operation == operation && call.phase == Phase::Started
            })
            .count()
    }

    /// Every start is followed by its own settlement before the next start.
    #[must_use]
    pub fn is_serial(&self) -> bool {
        let calls = self.calls.lock();
        calls.chunks(2).all(|pair| match pair {
            [start, settle] => {
                start.phase == Phase::Started
                    && settle.phase == Phase::Settled
                    && start.member == settle.member
                    && start.operation == settle.operation
            }
            _ => false,
        })
    }

    /// Forget every recorded call.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

#[derive(Debug)]
struct MockInner {
    name: String,
    log: CallLog,
    capabilities: Capabilities,
    delay: Duration,
    open_failure: Option<String>,
    close_failure: Option<String>,
    abandon: bool,
    opened: AtomicBool,
    closed: AtomicBool,
}

impl MockInner {
    async fn run(&self, operation: Operation) -> Result<()> {
        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }

        let failure = match operation {
            Operation::Open => self.open_failure.as_deref(),
            Operation::Close => self.close_failure.as_deref(),
        };
        let result = failure.map_or(Ok(()), |message| Err(Error::failed(message)));

        if result.is_ok() {
            match operation {
                Operation::Open => self.opened.store(true, Ordering::SeqCst),
                Operation::Close => {
                    self.opened.store(false, Ordering::SeqCst);
                    self.closed.store(true, Ordering::SeqCst);
                }
            }
        }
        self.log.record(&self.name, operation, Phase::Settled);
        result
    }

    fn invoke(self: &Arc<Self>, operation: Operation, done: Completion) {
        self.log.record(&self.name, operation, Phase::Started);
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let result = inner.run(operation).await;
            if inner.abandon {
                drop(done);
            } else {
                done(result);
            }
        });
    }
}

/// Configurable resource double.
///
/// Flags flip like a real resource would: a successful open sets
/// `is_opened`, a successful close clears it and sets `is_closed`. Failing
/// operations leave the flags untouched.
#[derive(Debug, Clone)]
pub struct MockResource {
    inner: Arc<MockInner>,
}

impl MockResource {
    /// A mock with full continuation-style capabilities that always succeeds.
    pub fn new(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            inner: Arc::new(MockInner {
                name: name.into(),
                log: log.clone(),
                capabilities: Capabilities::default(),
                delay: Duration::ZERO,
                open_failure: None,
                close_failure: None,
                abandon: false,
                opened: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }

    fn configure(self, f: impl FnOnce(&mut MockInner)) -> Self {
        let mut inner = Arc::try_unwrap(self.inner).unwrap_or_else(|shared| MockInner {
            name: shared.name.clone(),
            log: shared.log.clone(),
            capabilities: shared.capabilities,
            delay: shared.delay,
            open_failure: shared.open_failure.clone(),
            close_failure: shared.close_failure.clone(),
            abandon: shared.abandon,
            opened: AtomicBool::new(shared.opened.load(Ordering::SeqCst)),
            closed: AtomicBool::new(shared.closed.load(Ordering::SeqCst)),
        });
        f(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Replace the declared capabilities.
    pub fn with_capabilities(self, capabilities: Capabilities) -> Self {
        self.configure(|inner| inner.capabilities = capabilities)
    }

    /// Keep the operations but change the calling conventions.
    pub fn with_supports(self, supports: Supports) -> Self {
        self.configure(|inner| inner.capabilities.supports = supports)
    }

    /// Sleep this long inside every operation.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.configure(|inner| inner.delay = delay)
    }

    /// Fail every open with `message`.
    pub fn failing_open(self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.configure(|inner| inner.open_failure = Some(message))
    }

    /// Fail every close with `message`.
    pub fn failing_close(self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.configure(|inner| inner.close_failure = Some(message))
    }

    /// Drop the completion instead of calling it (continuation style only).
    pub fn abandoning(self) -> Self {
        self.configure(|inner| inner.abandon = true)
    }

    /// Start out reporting `is_opened() == true`.
    pub fn already_opened(self) -> Self {
        self.inner.opened.store(true, Ordering::SeqCst);
        self
    }

    /// Flip the closed flag from outside.
    pub fn set_closed(&self, closed: bool) {
        self.inner.closed.store(closed, Ordering::SeqCst);
    }

    /// Name recorded in the call log.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Share this mock as a trait object.
    #[must_use]
    pub fn shared(&self) -> Arc<dyn Resource> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl Resource for MockResource {
    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities
    }

    fn is_opened(&self) -> bool {
        self.inner.opened.load(Ordering::SeqCst)
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn open(&self, done: Completion) {
        self.inner.invoke(Operation::Open, done);
    }

    fn close(&self, done: Completion) {
        self.inner.invoke(Operation::Close, done);
    }

    async fn open_deferred(&self) -> Result<()> {
        self.inner
            .log
            .record(&self.inner.name, Operation::Open, Phase::Started);
        self.inner.run(Operation::Open).await
    }

    async fn close_deferred(&self) -> Result<()> {
        self.inner
            .log
            .record(&self.inner.name, Operation::Close, Phase::Started);
        self.inner.run(Operation::Close).await
    }
}
