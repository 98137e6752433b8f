//! Open and close passes over an ordered list of members.
//!
//! Both passes are strictly serial: each member's call settles before the
//! next member is touched. Open walks forward and stops at the first failure,
//! then rolls back whatever it opened. Close walks backward and never stops.

use std::sync::Arc;

use tandem_resource::{Error, Operation, Resource, Result, combine_result};

use crate::invoke::invoke;

/// An open pass that failed partway.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct OpenFailure {
    /// The error of the member that failed to open, unchanged.
    pub error: Error,
    /// Position of that member in the pass snapshot.
    pub failed_at: usize,
    /// Errors from closing the already-opened members, in rollback order.
    pub rollback: Vec<Error>,
}

impl OpenFailure {
    /// Discard the rollback details and keep the original error.
    #[must_use]
    pub fn into_error(self) -> Error {
        self.error
    }
}

/// Open `members` in order, rolling back on the first failure.
///
/// Members that need no open (see [`is_satisfied`](crate::invoke::is_satisfied))
/// count as opened and take part in a rollback like any other.
pub async fn open_all(members: Vec<Arc<dyn Resource>>) -> std::result::Result<(), OpenFailure> {
    let mut opened: Vec<Arc<dyn Resource>> = Vec::with_capacity(members.len());

    for (index, member) in members.into_iter().enumerate() {
        tracing::debug!(member = index, "opening member");
        match invoke(member.as_ref(), Operation::Open).await {
            Ok(()) => opened.push(member),
            Err(error) => {
                tracing::warn!(
                    member = index,
                    %error,
                    rollback = opened.len(),
                    "member failed to open, rolling back"
                );
                let rollback = close_each(&opened).await;
                for err in &rollback {
                    tracing::warn!(error = %err, "member failed to close during rollback");
                }
                return Err(OpenFailure {
                    error,
                    failed_at: index,
                    rollback,
                });
            }
        }
    }

    Ok(())
}

/// Close `members` last to first and combine every error encountered.
pub async fn close_all(members: Vec<Arc<dyn Resource>>) -> Result<()> {
    let errors = close_each(&members).await;
    combine_result(errors.into_iter().map(Some))
}

async fn close_each(stack: &[Arc<dyn Resource>]) -> Vec<Error> {
    let mut errors = Vec::new();
    for (index, member) in stack.iter().enumerate().rev() {
        tracing::debug!(member = index, "closing member");
        if let Err(error) = invoke(member.as_ref(), Operation::Close).await {
            tracing::warn!(member = index, %error, "member failed to close");
            errors.push(error);
        }
    }
    errors
}
