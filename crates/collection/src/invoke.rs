//! Calling a member's open/close in whichever convention it declares.

use tandem_resource::{Completion, Error, Operation, Resource, Result};
use tokio::sync::oneshot;

/// The member needs no call for `operation`.
///
/// True when the member lacks the operation entirely or its flag already
/// reports the target phase.
pub fn is_satisfied(member: &dyn Resource, operation: Operation) -> bool {
    let capabilities = member.capabilities();
    match operation {
        Operation::Open => !capabilities.open || member.is_opened(),
        Operation::Close => !capabilities.close || member.is_closed(),
    }
}

/// Run `operation` on `member` and normalize the outcome to a `Result`.
///
/// Deferred-only members are awaited directly. Everyone else is called in
/// continuation style, bridged through a oneshot channel; a completion
/// dropped without being called surfaces as [`Error::Abandoned`].
pub async fn invoke(member: &dyn Resource, operation: Operation) -> Result<()> {
    if is_satisfied(member, operation) {
        tracing::debug!(%operation, "member already satisfied, skipping");
        return Ok(());
    }

    if member.capabilities().supports.deferred_only() {
        return match operation {
            Operation::Open => member.open_deferred().await,
            Operation::Close => member.close_deferred().await,
        };
    }

    let (tx, rx) = oneshot::channel();
    let done: Completion = Box::new(move |result| {
        // Receiver is gone only if the pass itself was dropped.
        let _ = tx.send(result);
    });
    match operation {
        Operation::Open => member.open(done),
        Operation::Close => member.close(done),
    }

    rx.await.unwrap_or(Err(Error::Abandoned { operation }))
}
