//! Logging for the reattach tool.
//!
//! Everything goes to stderr as one line per event, prefixed by severity:
//! `warning: ...`, `fatal: ...`. stdout belongs to the exec'd program.
//!
//! The filter is read from `REATTACH_LOG` (same syntax as `RUST_LOG`) and
//! defaults to `warn`.

use anyhow::{Context as _, Result, anyhow};
use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "REATTACH_LOG";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// An `EnvFilter` directive string.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
        }
    }
}

impl LogConfig {
    /// Reads the filter from [`LOG_ENV`], falling back to the default.
    pub fn from_env() -> Self {
        match std::env::var(LOG_ENV) {
            Ok(filter) if !filter.trim().is_empty() => Self { filter },
            _ => Self::default(),
        }
    }
}

/// The line prefix for `level`, without the trailing `": "`.
pub fn prefix_for(level: &Level) -> Option<&'static str> {
    match *level {
        Level::ERROR => Some("fatal"),
        Level::WARN => Some("warning"),
        Level::INFO => None,
        Level::DEBUG => Some("debug"),
        Level::TRACE => Some("trace"),
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

/// A layer writing `<prefix>: <message>` lines.
pub struct PrefixLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl PrefixLayer<io::Stderr> {
    /// A layer writing to stderr.
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> PrefixLayer<W> {
    /// A layer writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for PrefixLayer<W>
where
    S: Subscriber,
    W: Write + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let mut line = String::new();
        if let Some(prefix) = prefix_for(event.metadata().level()) {
            line.push_str(prefix);
            line.push_str(": ");
        }
        line.push_str(&visitor.message);
        line.push_str(&visitor.fields);
        line.push('\n');

        if let Ok(mut w) = self.writer.lock() {
            let _ = w.write_all(line.as_bytes());
            let _ = w.flush();
        }
    }
}

/// Installs the global subscriber. Call once, before anything logs.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .with_context(|| format!("invalid {LOG_ENV} filter {:?}", config.filter))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(PrefixLayer::stderr())
        .try_init()
        .map_err(|e| anyhow!("failed to install logger: {e}"))
}
