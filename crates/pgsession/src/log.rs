//! Session log sinks and formatting.
//!
//! A session writes debug lines to an optional [`LogSink`]. Executed statements are only
//! logged when a formatter is configured as well; failures and transaction control are logged
//! whenever a sink is present (through the formatter when there is one, otherwise with
//! [`default_log_format`]).

use crate::cursor::Cursor;
use crate::error::SessionError;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Something that accepts debug lines.
pub trait LogSink: Send + Sync {
    /// Write one line. Implementations must not panic; write failures are swallowed.
    fn write_debug_line(&self, line: &str);
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn write_debug_line(&self, line: &str) {
        (**self).write_debug_line(line)
    }
}

/// What the formatter is asked to render.
#[derive(Debug)]
pub enum LogEvent<'a> {
    /// A statement completed; the cursor holds its SQL, timestamp, timing and row count.
    Executed(&'a Cursor),
    /// An operation failed.
    Failed {
        /// Short description of what failed, e.g. `execute()`.
        context: &'a str,
        error: &'a SessionError,
    },
}

/// Formatter turning a [`LogEvent`] into a log line.
pub type LogFormatter = Arc<dyn Fn(&LogEvent<'_>) -> String + Send + Sync>;

/// Executed statements render as their SQL; failures as `"<context> failed: <error>"`.
pub fn default_log_format(event: &LogEvent<'_>) -> String {
    match event {
        LogEvent::Executed(cursor) => cursor.query().unwrap_or_default().to_string(),
        LogEvent::Failed { context, error } => format!("{context} failed: {error}"),
    }
}

/// Raw line sink over any writer (a file, stderr, a `Vec<u8>` in tests).
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consume the sink and return the writer.
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn write_debug_line(&self, line: &str) {
        let mut writer = match self.writer.lock() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = writeln!(writer, "{line}");
    }
}

impl<W> std::fmt::Debug for WriterSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterSink").finish_non_exhaustive()
    }
}

/// A `tracing`-based sink emitting each line as an event with target `pgsession.sql`.
///
/// Enable via the crate feature: `pgsession = { features = ["tracing"] }`.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone)]
pub struct TracingSink {
    /// Tracing event level to emit at.
    pub level: tracing::Level,
    /// Truncate long lines (in bytes). `None` means no truncation.
    pub max_line_length: Option<usize>,
}

#[cfg(feature = "tracing")]
impl Default for TracingSink {
    fn default() -> Self {
        Self {
            level: tracing::Level::DEBUG,
            max_line_length: Some(200),
        }
    }
}

#[cfg(feature = "tracing")]
impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum line length to display.
    pub fn max_line_length(mut self, len: usize) -> Self {
        self.max_line_length = Some(len);
        self
    }

    /// Disable truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_line_length = None;
        self
    }

    pub(crate) fn truncate<'a>(&self, line: &'a str) -> std::borrow::Cow<'a, str> {
        match self.max_line_length {
            Some(max) if line.len() > max => {
                let mut end = max;
                while end > 0 && !line.is_char_boundary(end) {
                    end -= 1;
                }
                format!("{}...", &line[..end]).into()
            }
            _ => line.into(),
        }
    }
}

#[cfg(feature = "tracing")]
impl LogSink for TracingSink {
    fn write_debug_line(&self, line: &str) {
        use tracing::Level;

        let line = self.truncate(line);
        match self.level {
            Level::ERROR => tracing::error!(target: "pgsession.sql", "{line}"),
            Level::WARN => tracing::warn!(target: "pgsession.sql", "{line}"),
            Level::INFO => tracing::info!(target: "pgsession.sql", "{line}"),
            Level::DEBUG => tracing::debug!(target: "pgsession.sql", "{line}"),
            Level::TRACE => tracing::trace!(target: "pgsession.sql", "{line}"),
        }
    }
}

/// Sink plus optional formatter, as held by a session.
#[derive(Clone, Default)]
pub(crate) struct SessionLog {
    pub sink: Option<Arc<dyn LogSink>>,
    pub formatter: Option<LogFormatter>,
}

impl SessionLog {
    /// Executed statements are only stamped and logged with both a sink and a formatter.
    pub fn logs_executions(&self) -> bool {
        self.sink.is_some() && self.formatter.is_some()
    }

    pub fn debug(&self, line: &str) {
        if let Some(sink) = &self.sink {
            if !line.is_empty() {
                sink.write_debug_line(line);
            }
        }
    }

    pub fn event(&self, event: &LogEvent<'_>) {
        if self.sink.is_none() {
            return;
        }
        let line = match &self.formatter {
            Some(format) => format(event),
            None => default_log_format(event),
        };
        self.debug(&line);
    }

    pub fn failure(&self, context: &str, error: &SessionError) {
        self.event(&LogEvent::Failed { context, error });
    }
}

impl std::fmt::Debug for SessionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLog")
            .field("sink", &self.sink.is_some())
            .field("formatter", &self.formatter.is_some())
            .finish()
    }
}
