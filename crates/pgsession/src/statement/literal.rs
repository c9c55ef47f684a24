//! Inline literal rendering for the `DO UPDATE SET` branch of merges.

use crate::error::{SessionError, SessionResult};
use crate::value::Value;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// How a merge renders its `DO UPDATE SET` assignments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeSet {
    /// Inline literals. Strings are quoted with embedded quotes doubled; values without a
    /// literal form fail with [`SessionError::MalformedLiteral`].
    ///
    /// In both literal modes a `%` inside a string is written as `%%`, which placeholder
    /// numbering folds back, so the server sees the original text.
    #[default]
    Literal,
    /// Inline literals exactly as older callers produced them: strings are wrapped in quotes
    /// without escaping and values without a literal form render as `None`.
    ///
    /// Never use this with untrusted input.
    LegacyLiteral,
    /// `col=EXCLUDED.col`, reusing the bound insert parameters.
    Excluded,
}

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

fn to_timestamp(ts: NaiveDateTime) -> String {
    format!(
        "to_timestamp('{}', 'yyyy-mm-dd hh24:mi:ss.%f')",
        ts.format(TIMESTAMP_FORMAT)
    )
}

/// Render `value` as the right-hand side of `column=<literal>`.
pub fn render_literal(column: &str, value: &Value, mode: MergeSet) -> SessionResult<String> {
    let legacy = mode == MergeSet::LegacyLiteral;
    let rendered = match value {
        Value::Int(v) => v.to_string(),
        Value::Float(v) if v.is_finite() => format!("{v:?}"),
        #[cfg(feature = "rust_decimal")]
        Value::Numeric(v) => v.to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Text(v) if legacy => format!("'{}'", v.replace('%', "%%")),
        Value::Text(v) => format!("'{}'", v.replace('\'', "''").replace('%', "%%")),
        Value::Date(d) => to_timestamp(d.and_time(chrono::NaiveTime::MIN)),
        Value::Timestamp(ts) => to_timestamp(*ts),
        Value::TimestampTz(ts) => to_timestamp(ts.naive_utc()),
        Value::Time(t) => format!("'{}'::time", t.format("%H:%M:%S%.6f")),
        _ if legacy => "None".to_string(),
        other => return Err(SessionError::malformed_literal(column, other.kind())),
    };
    Ok(rendered)
}

/// `col=<rhs>` assignments joined by commas.
pub(crate) fn render_assignments<'a>(
    columns: impl IntoIterator<Item = (&'a str, &'a Value)>,
    mode: MergeSet,
) -> SessionResult<String> {
    let parts = columns
        .into_iter()
        .map(|(col, value)| {
            let rhs = match mode {
                MergeSet::Excluded => format!("EXCLUDED.{col}"),
                _ => render_literal(col, value, mode)?,
            };
            Ok(format!("{col}={rhs}"))
        })
        .collect::<SessionResult<Vec<_>>>()?;
    Ok(parts.join(","))
}
