//! # Tandem Log
//!
//! `tracing-subscriber` setup shared by tandem binaries and tests.
//!
//! ```no_run
//! tandem_log::init(tandem_log::Config::from_env()).expect("logger");
//! ```

pub mod builder;
pub mod config;
pub mod error;

pub use builder::{LoggerBuilder, Target};
pub use config::{Config, DisplayConfig, Format};
pub use error::{LogError, LogResult};

/// Install the global subscriber described by `config`.
pub fn init(config: Config) -> LogResult<()> {
    LoggerBuilder::from_config(config).build()
}

/// Install a trace-level subscriber writing to the test harness.
///
/// Safe to call from every test: once a subscriber is installed, later
/// calls do nothing.
pub fn init_test() {
    let _ = LoggerBuilder::from_config(Config::test())
        .target(Target::Test)
        .build();
}
