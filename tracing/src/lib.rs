//! Logging setup shared by the binaries of this workspace.
//!
//! Everything is written to stderr, so stdout stays reserved for the
//! converted call ID.

use tracing::Level;
use tracing_subscriber::{
    filter::{FromEnvError, ParseError},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid RUST_LOG: {0}")]
    Filter(#[from] FromEnvError),

    #[error("invalid log directive: {0}")]
    Directive(#[from] ParseError),

    #[error(transparent)]
    Init(#[from] TryInitError),
}

/// Output format of the stderr layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Compact,
    Json,
}

#[derive(Debug)]
pub struct TracingBuilder {
    level: Level,
    format: Format,
    directives: Vec<String>,
}

impl Default for TracingBuilder {
    fn default() -> Self {
        TracingBuilder {
            level: Level::INFO,
            format: Format::default(),
            directives: vec![],
        }
    }
}

impl TracingBuilder {
    /// Set the default log level. RUST_LOG still has a higher priority over
    /// this value.
    pub fn level(mut self, level: Level) -> TracingBuilder {
        self.level = level;
        self
    }

    pub fn format(mut self, format: Format) -> TracingBuilder {
        self.format = format;
        self
    }

    /// Add an extra filter directive, like `llb_convert=trace`. Directives
    /// added here are applied after the ones from RUST_LOG.
    pub fn directive(mut self, directive: impl Into<String>) -> TracingBuilder {
        self.directives.push(directive.into());
        self
    }

    /// Assembles the EnvFilter from the configured level, RUST_LOG and any
    /// extra directives.
    fn filter(&self) -> Result<EnvFilter, Error> {
        let mut filter = EnvFilter::builder()
            .with_default_directive(self.level.into())
            .from_env()?;
        for directive in &self.directives {
            filter = filter.add_directive(directive.parse()?);
        }
        Ok(filter)
    }

    /// Installs the global subscriber: an EnvFilter over a single stderr
    /// writer. Fails if a global subscriber was already set.
    pub fn build(self) -> Result<(), Error> {
        let fmt_layer = match self.format {
            Format::Compact => tracing_subscriber::fmt::Layer::new()
                .with_writer(std::io::stderr)
                .compact()
                .boxed(),
            Format::Json => tracing_subscriber::fmt::Layer::new()
                .with_writer(std::io::stderr)
                .json()
                .boxed(),
        };

        tracing_subscriber::registry()
            .with(self.filter()?)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}
