//! Combining several errors into one.
//!
//! [`combine`] is the only place an [`AggregateError`] is built. Zero inputs
//! produce no error and a single input passes through untouched, so callers
//! never see an aggregate wrapping fewer than two errors.

use std::fmt;

use crate::error::Error;

/// Two or more errors reported as one.
///
/// `Display` joins the constituent messages with `"; "` in the order they
/// were combined. The constituents stay reachable through [`errors`](Self::errors).
#[derive(Debug)]
pub struct AggregateError {
    errors: Vec<Error>,
}

impl AggregateError {
    /// The constituent errors, in combination order.
    #[must_use]
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Take ownership of the constituent errors.
    #[must_use]
    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }

    /// Number of constituent errors (always at least two).
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always `false`; present for symmetry with [`len`](Self::len).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

/// Combine an ordered sequence of optional errors into at most one error.
///
/// Absent entries are skipped. Aggregates among the inputs are flattened into
/// their constituents, so the result never nests.
pub fn combine<I>(errors: I) -> Option<Error>
where
    I: IntoIterator<Item = Option<Error>>,
{
    let mut flat = Vec::new();
    for err in errors.into_iter().flatten() {
        match err {
            Error::Aggregate(aggregate) => flat.extend(aggregate.into_errors()),
            other => flat.push(other),
        }
    }

    match flat.len() {
        0 => None,
        1 => flat.pop(),
        _ => Some(Error::Aggregate(AggregateError { errors: flat })),
    }
}

/// Like [`combine`], but as a `Result` for callers that report through `?`.
pub fn combine_result<I>(errors: I) -> crate::error::Result<()>
where
    I: IntoIterator<Item = Option<Error>>,
{
    combine(errors).map_or(Ok(()), Err)
}
