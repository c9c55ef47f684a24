//! The [`Session`]: one pooled connection, one cursor, table-oriented helpers.
//!
//! Statements run inside a transaction block that is opened lazily before the first statement
//! (unless [`SessionConfig::autocommit`] is set) and ended by [`Session::commit`] or
//! [`Session::rollback`]. For ergonomic commit/rollback handling, use [`Session::finish`] or
//! the [`scoped!`](crate::scoped) macro.
//!
//! # Example
//!
//! ```ignore
//! use pgsession::{DataMap, Session, SessionConfig, WhereClause};
//!
//! let pool = pgsession::create_pool("postgres://...")?;
//! let mut session = Session::open(&pool, SessionConfig::default()).await?;
//!
//! pgsession::scoped!(session, s, {
//!     let id = s
//!         .insert_returning("users", &DataMap::new().with("name", "alice"), "id")
//!         .await?;
//!     s.update(
//!         "users",
//!         &DataMap::new().with("name", "Alice"),
//!         Some(&WhereClause::new("name=%s").bind("alice")),
//!     )
//!     .await?;
//!     Ok(id)
//! })?;
//! ```

mod ops;

#[cfg(test)]
mod tests;

use crate::config::SessionConfig;
use crate::cursor::Cursor;
use crate::error::{SessionError, SessionResult};
use crate::log::{LogEvent, LogSink, SessionLog};
use crate::pool::{Connection, ConnectionPool};
use crate::record::RowShape;
use crate::statement::{count_placeholders, has_numbered_params, number_placeholders};
use crate::value::Value;
use std::sync::Arc;
use std::time::Instant;

/// Runs the given block against a session and finishes it.
///
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
/// - Closes the session's cursor either way.
///
/// The block must evaluate to `pgsession::SessionResult<T>`.
///
/// ```ignore
/// let count = pgsession::scoped!(session, s, {
///     s.truncate("audit", TruncateOptions::new()).await?;
///     s.insert_bulk("audit", &rows).await
/// })?;
/// ```
#[macro_export]
macro_rules! scoped {
    ($session:expr, $s:ident, $body:block) => {{
        #[allow(unused_mut)]
        let mut $s = &mut $session;
        let __pgsession_outcome: $crate::SessionResult<_> = async { $body }.await;
        $s.finish(__pgsession_outcome).await
    }};
}

/// A borrowed pooled connection plus its cursor.
///
/// The connection goes back to the pool exactly once: on [`Session::close`], or when the
/// session is dropped. Every operation after that fails with [`SessionError::SessionClosed`].
pub struct Session<'p, P: ConnectionPool> {
    pool: &'p P,
    conn: Option<P::Connection>,
    cursor: Cursor,
    config: SessionConfig,
    log: SessionLog,
    in_transaction: bool,
}

/// Builder for sessions with logging attached.
pub struct SessionBuilder<'p, P: ConnectionPool> {
    pool: &'p P,
    config: SessionConfig,
    log: SessionLog,
}

impl<'p, P: ConnectionPool> SessionBuilder<'p, P> {
    /// Replace the whole configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the row shape.
    pub fn row_shape(mut self, shape: RowShape) -> Self {
        self.config.row_shape = shape;
        self
    }

    /// Write debug lines to `sink`.
    pub fn log_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.log.sink = Some(Arc::new(sink));
        self
    }

    /// Render log lines with `format`. Executed statements are only logged when both a sink
    /// and a formatter are configured.
    pub fn log_format<F>(mut self, format: F) -> Self
    where
        F: Fn(&LogEvent<'_>) -> String + Send + Sync + 'static,
    {
        self.log.formatter = Some(Arc::new(format));
        self
    }

    /// Acquire a connection and open the session.
    pub async fn open(self) -> SessionResult<Session<'p, P>> {
        Session::connect(self.pool, self.config, self.log).await
    }
}

impl<'p, P: ConnectionPool> Session<'p, P> {
    /// Acquire a connection from `pool` and open a session without logging.
    pub async fn open(pool: &'p P, config: SessionConfig) -> SessionResult<Self> {
        Self::connect(pool, config, SessionLog::default()).await
    }

    /// Start building a session with logging options.
    pub fn builder(pool: &'p P) -> SessionBuilder<'p, P> {
        SessionBuilder {
            pool,
            config: SessionConfig::default(),
            log: SessionLog::default(),
        }
    }

    async fn connect(pool: &'p P, config: SessionConfig, log: SessionLog) -> SessionResult<Self> {
        let conn = match pool.get_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                let err = SessionError::Connection(e.to_string());
                log.failure("postgresql connection", &err);
                return Err(err);
            }
        };

        if !conn.is_open() {
            let _ = pool.release_connection(conn, true);
            let err = SessionError::Connection("acquired connection is already closed".to_string());
            log.failure("postgresql connection", &err);
            return Err(err);
        }

        Ok(Self {
            pool,
            conn: Some(conn),
            cursor: Cursor::new(config.row_shape),
            config,
            log,
            in_transaction: false,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The cursor holding the last statement's result.
    pub fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    /// Whether the underlying connection is currently open.
    pub fn is_open(&self) -> bool {
        self.conn.as_ref().is_some_and(Connection::is_open)
    }

    /// Whether a transaction block is open on the connection.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Execute a raw statement.
    ///
    /// `%s` placeholders are numbered `$1, $2, ...` when `params` is non-empty, and their count
    /// must match `params`. SQL already using `$n` is passed through. Failures are logged and
    /// returned; nothing is retried.
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> SessionResult<&mut Cursor> {
        match self.execute_inner(sql, params).await {
            Ok(()) => Ok(&mut self.cursor),
            Err(err) => {
                self.log.failure("execute()", &err);
                Err(err)
            }
        }
    }

    async fn execute_inner(&mut self, sql: &str, params: &[Value]) -> SessionResult<()> {
        self.cursor.ensure_open()?;
        let conn = self.conn.as_mut().ok_or(SessionError::SessionClosed)?;

        let expected = count_placeholders(sql);
        let exec_sql = if params.is_empty() || (expected == 0 && has_numbered_params(sql)) {
            sql.to_string()
        } else {
            if expected != params.len() {
                return Err(SessionError::validation(format!(
                    "statement has {expected} placeholders but {} parameters were supplied",
                    params.len()
                )));
            }
            number_placeholders(sql)
        };

        if !self.config.autocommit && !self.in_transaction {
            conn.begin().await.map_err(SessionError::Execution)?;
            self.in_transaction = true;
        }

        let stamp = self.log.logs_executions();
        self.cursor.begin(&exec_sql, stamp);
        let started = Instant::now();
        let result = conn
            .run(&exec_sql, params)
            .await
            .map_err(SessionError::Execution)?;
        self.cursor.load(result, started.elapsed());

        if stamp {
            self.log.event(&LogEvent::Executed(&self.cursor));
        }
        Ok(())
    }

    /// Commit the open transaction block, if any.
    ///
    /// On failure the block is still considered open, so the connection is discarded rather
    /// than reused when the session is released.
    pub async fn commit(&mut self) -> SessionResult<()> {
        let conn = self.conn.as_mut().ok_or(SessionError::SessionClosed)?;
        if !self.in_transaction {
            return Ok(());
        }
        match conn.commit().await {
            Ok(()) => {
                self.in_transaction = false;
                Ok(())
            }
            Err(e) => {
                let err = SessionError::Execution(e);
                self.log.failure("commit()", &err);
                Err(err)
            }
        }
    }

    /// Roll back the open transaction block, if any.
    ///
    /// A failed rollback leaves the block marked open; see [`Session::commit`].
    pub async fn rollback(&mut self) -> SessionResult<()> {
        let conn = self.conn.as_mut().ok_or(SessionError::SessionClosed)?;
        if !self.in_transaction {
            return Ok(());
        }
        match conn.rollback().await {
            Ok(()) => {
                self.in_transaction = false;
                Ok(())
            }
            Err(e) => {
                let err = SessionError::Execution(e);
                self.log.failure("rollback()", &err);
                Err(err)
            }
        }
    }

    /// End a unit of work: commit on `Ok`, roll back on `Err`, then close the cursor.
    ///
    /// The original error is returned even when the rollback itself fails (the rollback failure
    /// is logged). A failed commit is returned in place of the value.
    pub async fn finish<T>(&mut self, outcome: SessionResult<T>) -> SessionResult<T> {
        if self.cursor.is_closed() {
            return outcome.and(Err(SessionError::SessionClosed));
        }

        let result = match outcome {
            Ok(value) => {
                self.log.debug("Committing transaction");
                self.commit().await.map(|()| value)
            }
            Err(error) => {
                self.log.debug("Rolling back transaction");
                // already logged by rollback()
                let _ = self.rollback().await;
                Err(error)
            }
        };

        self.cursor.close();
        result
    }

    /// Return the connection to the pool.
    ///
    /// An open transaction block is rolled back first. Release problems are logged, never
    /// returned. Closing twice is a no-op.
    pub async fn close(&mut self) {
        if self.in_transaction {
            let _ = self.rollback().await;
        }
        self.release();
    }

    fn release(&mut self) {
        self.cursor.close();
        let Some(conn) = self.conn.take() else {
            return;
        };

        let outcome = if std::mem::take(&mut self.in_transaction) {
            // mid-transaction connections must not be reused
            self.pool.discard_connection(conn);
            Ok(())
        } else {
            self.pool.release_connection(conn, true)
        };

        if let Err(e) = outcome {
            #[cfg(feature = "tracing")]
            tracing::warn!(target: "pgsession", error = %e, "failed to release connection");
            let err = SessionError::Connection(e.to_string());
            self.log.failure("release", &err);
        }
    }
}

impl<P: ConnectionPool> Drop for Session<'_, P> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<P: ConnectionPool> std::fmt::Debug for Session<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("open", &self.is_open())
            .field("in_transaction", &self.in_transaction)
            .field("config", &self.config)
            .field("log", &self.log)
            .finish_non_exhaustive()
    }
}
