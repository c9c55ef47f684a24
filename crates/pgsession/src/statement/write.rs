//! INSERT / UPDATE / upsert / DELETE / CALL builders.

use super::clause::WhereClause;
use super::literal::{MergeSet, render_assignments};
use super::{PLACEHOLDER, Statement, placeholders, push_returning};
use crate::error::{SessionError, SessionResult};
use crate::value::{DataMap, Value};

fn columns(data: &DataMap) -> String {
    data.keys().collect::<Vec<_>>().join(",")
}

/// `INSERT INTO t (c1,c2) VALUES(%s,%s) [RETURNING ..]`
pub fn build_insert(table: &str, data: &DataMap, returning: Option<&str>) -> Statement {
    let mut sql = format!(
        "INSERT INTO {table} ({}) VALUES({})",
        columns(data),
        placeholders(data.len())
    );
    push_returning(&mut sql, returning);
    Statement::new(sql, data.values().cloned().collect())
}

/// `INSERT INTO t (c1,c2) VALUES (%s,%s),(%s,%s) [RETURNING ..]`
///
/// Columns come from the first row. Every other row must carry the same columns in the same
/// order, otherwise the placeholders would no longer line up with the parameters.
pub fn build_insert_bulk(
    table: &str,
    rows: &[DataMap],
    returning: Option<&str>,
) -> SessionResult<Statement> {
    let first = rows
        .first()
        .ok_or_else(|| SessionError::validation("bulk insert requires at least one row"))?;
    if first.is_empty() {
        return Err(SessionError::validation(
            "bulk insert rows must have at least one column",
        ));
    }
    if let Some(pos) = rows.iter().position(|row| !row.same_columns(first)) {
        return Err(SessionError::validation(format!(
            "bulk insert row {pos} has columns ({}) but the first row has ({})",
            columns(&rows[pos]),
            columns(first)
        )));
    }

    let tuple = format!("({})", placeholders(first.len()));
    let values = vec![tuple.as_str(); rows.len()].join(",");
    let mut sql = format!("INSERT INTO {table} ({}) VALUES {values}", columns(first));
    push_returning(&mut sql, returning);

    let params = rows.iter().flat_map(|row| row.values().cloned()).collect();
    Ok(Statement::new(sql, params))
}

/// `UPDATE t SET c1=%s,c2=%s [WHERE ..] [RETURNING ..]`
///
/// Parameters are the data values followed by the WHERE values.
pub fn build_update(
    table: &str,
    data: &DataMap,
    filter: Option<&WhereClause>,
    returning: Option<&str>,
) -> Statement {
    let set = data
        .keys()
        .map(|col| format!("{col}={PLACEHOLDER}"))
        .collect::<Vec<_>>()
        .join(",");

    let mut sql = format!("UPDATE {table} SET {set}");
    let mut params: Vec<Value> = data.values().cloned().collect();
    if let Some(filter) = filter.filter(|f| !f.is_empty()) {
        filter.push_sql(&mut sql);
        params.extend(filter.params.iter().cloned());
    }
    push_returning(&mut sql, returning);
    Statement::new(sql, params)
}

/// Upsert updating every non-conflict column.
///
/// `INSERT INTO t (cols) VALUES(%s,..) ON CONFLICT (conflict) DO UPDATE SET ..`
pub fn build_merge(
    table: &str,
    data: &DataMap,
    conflict: &[&str],
    returning: Option<&str>,
    mode: MergeSet,
) -> SessionResult<Statement> {
    build_upsert(table, data, conflict, None, returning, mode)
}

/// Upsert updating only the non-conflict columns listed in `update`.
pub fn build_merge_update(
    table: &str,
    data: &DataMap,
    conflict: &[&str],
    update: &[&str],
    returning: Option<&str>,
    mode: MergeSet,
) -> SessionResult<Statement> {
    build_upsert(table, data, conflict, Some(update), returning, mode)
}

fn build_upsert(
    table: &str,
    data: &DataMap,
    conflict: &[&str],
    update: Option<&[&str]>,
    returning: Option<&str>,
    mode: MergeSet,
) -> SessionResult<Statement> {
    let assignments = data
        .iter()
        .filter(|(col, _)| !conflict.contains(col))
        .filter(|(col, _)| update.is_none_or(|cols| cols.contains(col)));
    let set = render_assignments(assignments, mode)?;
    if set.is_empty() {
        return Err(SessionError::validation(format!(
            "upsert into {table} has no columns left to update"
        )));
    }

    let mut sql = format!(
        "INSERT INTO {table} ({}) VALUES({}) ON CONFLICT ({}) DO UPDATE SET {set}",
        columns(data),
        placeholders(data.len()),
        conflict.join(",")
    );
    push_returning(&mut sql, returning);
    Ok(Statement::new(sql, data.values().cloned().collect()))
}

/// `DELETE FROM t [WHERE ..] [RETURNING ..]`
pub fn build_delete(
    table: &str,
    filter: Option<&WhereClause>,
    returning: Option<&str>,
) -> Statement {
    let mut sql = format!("DELETE FROM {table}");
    let mut params = Vec::new();
    if let Some(filter) = filter.filter(|f| !f.is_empty()) {
        filter.push_sql(&mut sql);
        params = filter.params.clone();
    }
    push_returning(&mut sql, returning);
    Statement::new(sql, params)
}

/// `CALL procedure(%s,..)`, one argument per data value in map order.
pub fn build_call(procedure: &str, data: Option<&DataMap>) -> Statement {
    match data {
        None => Statement::raw(format!("CALL {procedure}()")),
        Some(data) => Statement::new(
            format!("CALL {procedure}({})", placeholders(data.len())),
            data.values().cloned().collect(),
        ),
    }
}
