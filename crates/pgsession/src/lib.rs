//! # pgsession
//!
//! A table-oriented convenience session over a Postgres connection pool.
//!
//! ## Features
//!
//! - **One statement per call**: every helper builds exactly one parameterized statement
//! - **Plain data in, plain rows out**: `DataMap` for column values, `Record` for rows
//! - **Transaction-friendly**: lazy `BEGIN`, explicit `commit()` / `rollback()`, and
//!   `scoped!` to commit or roll back a block automatically
//! - **Guaranteed release**: the pooled connection goes back exactly once, on `close()` or drop
//! - **Pluggable logging**: any `LogSink`, with `TracingSink` for `tracing` users
//!
//! ## Session
//!
//! ```ignore
//! use pgsession::{DataMap, OrderSpec, SelectSpec, Session, SessionConfig, WhereClause};
//!
//! let pool = pgsession::create_pool(&std::env::var("DATABASE_URL")?)?;
//! let mut session = Session::open(&pool, SessionConfig::default()).await?;
//!
//! // INSERT
//! session
//!     .insert("users", &DataMap::new().with("name", "alice").with("age", 31))
//!     .await?;
//!
//! // SELECT
//! let users = session
//!     .fetch_all(
//!         "users",
//!         &SelectSpec::new()
//!             .fields(["id", "name"])
//!             .filter(WhereClause::new("age > %s").bind(30))
//!             .order(OrderSpec::asc("name"))
//!             .limit(10),
//!     )
//!     .await?;
//!
//! // UPSERT
//! session
//!     .merge("users", &DataMap::new().with("id", 1).with("name", "Alice"), &["id"])
//!     .await?;
//!
//! session.commit().await?;
//! ```
//!
//! ## Statement builders
//!
//! The SQL behind every helper is available as pure functions in [`statement`], e.g. for use
//! with [`Session::run`] or for inspection in tests.

pub mod config;
pub mod cursor;
pub mod error;
pub mod log;
pub mod pool;
pub mod record;
pub mod session;
pub mod statement;
pub mod value;

pub use config::SessionConfig;
pub use cursor::Cursor;
pub use error::{DriverError, SessionError, SessionResult};
pub use log::{LogEvent, LogFormatter, LogSink, WriterSink, default_log_format};
pub use pool::{Connection, ConnectionPool, ResultSet};
pub use record::{ColumnMeta, Record, RowShape};
pub use session::{Session, SessionBuilder};
pub use statement::{
    Direction, JoinSpec, MergeSet, OrderSpec, SelectSpec, Statement, TruncateOptions, WhereClause,
};
pub use value::{DataMap, Value};

#[cfg(feature = "tracing")]
pub use log::TracingSink;

#[cfg(feature = "pool")]
pub use pool::{
    PoolSettings, create_pool, create_pool_with_config, create_pool_with_manager_config,
};
