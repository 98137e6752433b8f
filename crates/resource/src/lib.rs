//! # Tandem Resource
//!
//! The single-resource side of lifecycle coordination: the [`Resource`]
//! open/close contract with its [`Capabilities`] descriptor, the
//! [`Lifecycle`] state machine, the [`Tracker`] that serializes transitions,
//! and the [`Error`] type together with the [`combine`] error combiner.

pub mod aggregate;
pub mod error;
pub mod lifecycle;
pub mod resource;
pub mod tracker;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use aggregate::{AggregateError, combine, combine_result};
pub use error::{Error, Operation, Result};
pub use lifecycle::Lifecycle;
pub use resource::{Capabilities, Completion, Resource, Supports};
pub use tracker::{ActiveGuard, Tracker};
