//! # Tandem Collection
//!
//! Coordinates the open/close lifecycle of an ordered group of resources as
//! a single resource:
//!
//! - open runs first to last, stops at the first failure and rolls back what
//!   it opened, last to first;
//! - close runs last to first, attempts every member and combines all errors;
//! - destroy is a close whose result is combined with a caller's reason.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tandem_collection::{Collection, Resource};
//!
//! struct Socket;
//! impl Resource for Socket {}
//!
//! # async fn run() -> tandem_collection::Result<()> {
//! let sockets = Collection::new([Arc::new(Socket) as Arc<dyn Resource>]);
//! sockets.open().await?;
//! sockets.close(false).await?;
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod config;
pub mod invoke;
pub mod sequence;

pub use collection::Collection;
pub use config::CollectionConfig;
pub use invoke::{invoke, is_satisfied};
pub use sequence::{OpenFailure, close_all, open_all};

pub use tandem_resource::{
    AggregateError, Capabilities, Completion, Error, Lifecycle, Operation, Resource, Result,
    Supports, combine,
};
