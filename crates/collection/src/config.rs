//! Collection configuration.

use serde::{Deserialize, Serialize};
use tandem_resource::{Error, Result, Supports};

/// Configuration for a [`Collection`](crate::Collection).
///
/// Every field has a default, so a partial JSON/YAML blob deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Report the collection as opened before any open pass has run.
    pub opened: bool,
    /// Label used in tracing spans; defaults to `"collection"`.
    pub name: Option<String>,
    /// Calling conventions the collection declares when it is itself a member.
    pub supports: Supports,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            opened: false,
            name: None,
            supports: Supports::BOTH,
        }
    }
}

impl CollectionConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the "initially opened" flag.
    pub fn opened(mut self, opened: bool) -> Self {
        self.opened = opened;
        self
    }

    /// Set the tracing label.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the declared calling conventions.
    pub fn supports(mut self, supports: Supports) -> Self {
        self.supports = supports;
        self
    }

    /// Check the configuration for contradictions.
    pub fn validate(&self) -> Result<()> {
        if !self.supports.callbacks && !self.supports.deferred {
            return Err(Error::configuration(
                "collection must support at least one calling convention",
            ));
        }
        if self.name.as_deref().is_some_and(str::is_empty) {
            return Err(Error::configuration("collection name cannot be empty"));
        }
        Ok(())
    }
}
