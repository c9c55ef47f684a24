//! Typed clause arguments shared by the builders.

use crate::value::Value;

/// A filter predicate with its bound values, e.g. `("id=%s and name=%s", [1, "test"])`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    pub predicate: String,
    pub params: Vec<Value>,
}

impl WhereClause {
    pub fn new(predicate: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params<I, V>(predicate: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            predicate: predicate.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Append one bound value.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicate.trim().is_empty()
    }

    /// ` WHERE predicate`, or nothing when the predicate is empty.
    pub(crate) fn push_sql(&self, sql: &mut String) {
        if !self.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.predicate);
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// `ORDER BY column [direction]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    pub column: String,
    /// `None` leaves the direction to the database default.
    pub direction: Option<Direction>,
}

impl OrderSpec {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: None,
        }
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Some(Direction::Asc),
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Some(Direction::Desc),
        }
    }

    pub(crate) fn push_sql(&self, sql: &mut String) {
        if self.column.trim().is_empty() {
            return;
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&self.column);
        if let Some(dir) = self.direction {
            sql.push(' ');
            sql.push_str(dir.as_sql());
        }
    }
}

/// Clauses that follow the FROM part of a select or join.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Tail {
    pub filter: Option<WhereClause>,
    pub order: Option<OrderSpec>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Tail {
    pub fn push_sql(&self, sql: &mut String) {
        if let Some(filter) = &self.filter {
            filter.push_sql(sql);
        }
        if let Some(order) = &self.order {
            order.push_sql(sql);
        }
        if let Some(limit) = self.limit.filter(|n| *n > 0) {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset.filter(|n| *n > 0) {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }

    /// Bound values of the WHERE clause, if it contributes to the SQL.
    pub fn params(&self) -> Vec<Value> {
        match &self.filter {
            Some(filter) if !filter.is_empty() => filter.params.clone(),
            _ => Vec::new(),
        }
    }
}

macro_rules! tail_setters {
    ($ty:ty) => {
        impl $ty {
            /// Set the WHERE clause.
            pub fn filter(mut self, filter: WhereClause) -> Self {
                self.tail.filter = Some(filter);
                self
            }

            /// Set the ORDER BY clause.
            pub fn order(mut self, order: OrderSpec) -> Self {
                self.tail.order = Some(order);
                self
            }

            /// Set LIMIT (0 means no limit).
            pub fn limit(mut self, limit: u64) -> Self {
                self.tail.limit = Some(limit);
                self
            }

            /// Set OFFSET (0 means no offset).
            pub fn offset(mut self, offset: u64) -> Self {
                self.tail.offset = Some(offset);
                self
            }
        }
    };
}

/// Arguments of a single-table select.
///
/// ```ignore
/// let spec = SelectSpec::new()
///     .fields(["id", "name"])
///     .filter(WhereClause::new("age > %s").bind(30))
///     .order(OrderSpec::asc("name"))
///     .limit(10);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectSpec {
    pub(crate) fields: Vec<String>,
    pub(crate) tail: Tail,
}

impl SelectSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns to select; empty selects `*`.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

tail_setters!(SelectSpec);

/// Arguments of a two-table `LEFT JOIN`.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    pub(crate) tables: [String; 2],
    pub(crate) fields: [Vec<String>; 2],
    pub(crate) on: [String; 2],
    pub(crate) tail: Tail,
}

impl JoinSpec {
    /// Join `left` to `right` on `left.left_field = right.right_field`.
    pub fn new(
        left: impl Into<String>,
        right: impl Into<String>,
        left_field: impl Into<String>,
        right_field: impl Into<String>,
    ) -> Self {
        Self {
            tables: [left.into(), right.into()],
            fields: [Vec::new(), Vec::new()],
            on: [left_field.into(), right_field.into()],
            tail: Tail::default(),
        }
    }

    /// Columns selected from the left table.
    pub fn left_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields[0] = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Columns selected from the right table.
    pub fn right_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields[1] = fields.into_iter().map(Into::into).collect();
        self
    }
}

tail_setters!(JoinSpec);
