//! Logger builder implementation

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{Config, DisplayConfig, Format};
use crate::error::{LogError, LogResult};

type BoxedLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

/// Box a fmt layer, dropping the timer when timestamps are disabled.
macro_rules! boxed_layer {
    ($layer:expr, $display:expr) => {{
        if $display.time {
            Box::new($layer) as BoxedLayer
        } else {
            Box::new($layer.without_time()) as BoxedLayer
        }
    }};
}

/// Where formatted events go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    /// Standard output
    #[default]
    Stdout,
    /// Standard error
    Stderr,
    /// The test harness's captured output
    Test,
}

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
    target: Target,
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            target: Target::default(),
        }
    }

    /// Send output to `target` instead of stdout
    #[must_use]
    pub fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Parse the filter without installing anything
    pub fn filter(&self) -> LogResult<EnvFilter> {
        EnvFilter::try_new(&self.config.level).map_err(|e| LogError::Filter {
            directive: self.config.level.clone(),
            reason: e.to_string(),
        })
    }

    /// Build and install the global subscriber
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Filter string cannot be parsed
    /// - A global subscriber is already installed
    pub fn build(self) -> LogResult<()> {
        let filter = self.filter()?;
        let layer = fmt_layer(self.config.format, &self.config.display, self.target);

        Registry::default()
            .with(filter)
            .with(layer)
            .try_init()
            .map_err(|e| LogError::AlreadyInitialized(e.to_string()))?;

        tracing::debug!(
            level = %self.config.level,
            format = ?self.config.format,
            "logger initialized"
        );
        Ok(())
    }
}

fn fmt_layer(format: Format, display: &DisplayConfig, target: Target) -> BoxedLayer {
    let writer = match target {
        Target::Stdout => BoxMakeWriter::new(std::io::stdout),
        Target::Stderr => BoxMakeWriter::new(std::io::stderr),
        Target::Test => BoxMakeWriter::new(fmt::TestWriter::new()),
    };

    let base = fmt::layer()
        .with_writer(writer)
        .with_ansi(display.colors)
        .with_target(display.target)
        .with_file(display.source)
        .with_line_number(display.source)
        .with_thread_ids(display.thread_ids);

    match format {
        Format::Pretty => boxed_layer!(base.pretty(), display),
        Format::Compact => boxed_layer!(base.compact(), display),
        Format::Json => boxed_layer!(base.json().flatten_event(display.flatten), display),
    }
}
