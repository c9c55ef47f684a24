//! The session's cursor: a buffer over the result of the most recent statement.

use crate::error::{SessionError, SessionResult};
use crate::pool::ResultSet;
use crate::record::{ColumnMeta, Record, RowShape};
use crate::value::Value;
use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

/// Result buffer of the last executed statement.
///
/// Rows are decoded into [`Record`]s according to the cursor's [`RowShape`] as they are
/// fetched. Executing a new statement replaces the buffer.
#[derive(Debug)]
pub struct Cursor {
    shape: RowShape,
    query: Option<String>,
    description: Vec<ColumnMeta>,
    rows: VecDeque<Vec<Value>>,
    row_count: Option<u64>,
    timestamp: Option<SystemTime>,
    elapsed: Option<Duration>,
    closed: bool,
}

impl Cursor {
    pub(crate) fn new(shape: RowShape) -> Self {
        Self {
            shape,
            query: None,
            description: Vec::new(),
            rows: VecDeque::new(),
            row_count: None,
            timestamp: None,
            elapsed: None,
            closed: false,
        }
    }

    pub(crate) fn ensure_open(&self) -> SessionResult<()> {
        if self.closed {
            return Err(SessionError::SessionClosed);
        }
        Ok(())
    }

    /// Forget the previous result and note the statement about to run.
    pub(crate) fn begin(&mut self, sql: &str, stamp: bool) {
        self.query = Some(sql.to_string());
        self.description.clear();
        self.rows.clear();
        self.row_count = None;
        self.elapsed = None;
        self.timestamp = stamp.then(SystemTime::now);
    }

    pub(crate) fn load(&mut self, result: ResultSet, elapsed: Duration) {
        self.description = result.columns;
        self.rows = result.rows.into();
        self.row_count = Some(result.rows_affected);
        self.elapsed = Some(elapsed);
    }

    /// Next buffered row, if any.
    pub fn fetch_one(&mut self) -> Option<Record> {
        let values = self.rows.pop_front()?;
        Some(Record::decode(self.shape, &self.description, values))
    }

    /// All remaining buffered rows.
    pub fn fetch_all(&mut self) -> Vec<Record> {
        self.rows
            .drain(..)
            .map(|values| Record::decode(self.shape, &self.description, values))
            .collect()
    }

    /// Remaining rows as name-addressable records, regardless of the configured shape.
    pub(crate) fn fetch_all_named(&mut self) -> Vec<Record> {
        self.rows
            .drain(..)
            .map(|values| Record::decode(RowShape::Named, &self.description, values))
            .collect()
    }

    /// Rows affected or returned by the last statement; `None` before any statement ran.
    pub fn row_count(&self) -> Option<u64> {
        self.row_count
    }

    /// Result columns of the last statement.
    pub fn description(&self) -> &[ColumnMeta] {
        &self.description
    }

    /// SQL text of the last statement, as sent to the server.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// When the last statement started. Only recorded while execution logging is active.
    pub fn timestamp(&self) -> Option<SystemTime> {
        self.timestamp
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    pub fn shape(&self) -> RowShape {
        self.shape
    }

    /// Close the cursor, dropping any buffered rows. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.rows.clear();
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
