//! Statement builders.
//!
//! Each builder is a pure function from typed arguments to a [`Statement`]: SQL text using
//! `%s` positional placeholders plus the parameter list in placeholder order.
//!
//! ## Design
//!
//! - Table and column names are used verbatim; callers are trusted.
//! - Optional clauses (WHERE / ORDER BY / LIMIT / OFFSET / RETURNING) contribute nothing when
//!   absent, empty, or zero.
//! - Placeholders are translated to `$1, $2, ...` only at execution time
//!   (see [`placeholder::number_placeholders`]).

pub mod clause;
pub mod ddl;
pub mod literal;
pub mod placeholder;
pub mod select;
pub mod write;

pub use clause::{Direction, JoinSpec, OrderSpec, SelectSpec, WhereClause};
pub use ddl::{TruncateOptions, build_create, build_drop, build_truncate};
pub use literal::{MergeSet, render_literal};
pub use placeholder::{count_placeholders, has_numbered_params, number_placeholders};
pub use select::{build_join, build_select};
pub use write::{
    build_call, build_delete, build_insert, build_insert_bulk, build_merge, build_merge_update,
    build_update,
};

use crate::value::Value;

/// Placeholder emitted for every bound parameter.
pub const PLACEHOLDER: &str = "%s";

/// A SQL statement together with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Statement without parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}

/// `%s,%s,...` with `n` placeholders.
pub(crate) fn placeholders(n: usize) -> String {
    vec![PLACEHOLDER; n].join(",")
}

/// ` RETURNING cols`, or nothing.
pub(crate) fn push_returning(sql: &mut String, returning: Option<&str>) {
    if let Some(cols) = returning.filter(|c| !c.trim().is_empty()) {
        sql.push_str(" RETURNING ");
        sql.push_str(cols);
    }
}
