use super::Statement;
use super::clause::{JoinSpec, SelectSpec};

/// `SELECT <fields|*> FROM <table> [WHERE ..] [ORDER BY ..] [LIMIT n] [OFFSET n]`
pub fn build_select(table: &str, spec: &SelectSpec) -> Statement {
    let fields = if spec.fields.is_empty() {
        "*".to_string()
    } else {
        spec.fields.join(",")
    };

    let mut sql = format!("SELECT {fields} FROM {table}");
    spec.tail.push_sql(&mut sql);
    Statement::new(sql, spec.tail.params())
}

/// `SELECT t1.a,t2.b FROM t1 LEFT JOIN t2 ON (t1.x = t2.y)` followed by the optional clauses.
///
/// When neither table lists any fields, every column is selected with `*`.
pub fn build_join(spec: &JoinSpec) -> Statement {
    let [left, right] = &spec.tables;
    let [left_on, right_on] = &spec.on;

    let qualified: Vec<String> = spec
        .tables
        .iter()
        .zip(&spec.fields)
        .flat_map(|(table, fields)| fields.iter().map(move |f| format!("{table}.{f}")))
        .collect();
    let fields = if qualified.is_empty() {
        "*".to_string()
    } else {
        qualified.join(",")
    };

    let mut sql = format!(
        "SELECT {fields} FROM {left} LEFT JOIN {right} ON ({left}.{left_on} = {right}.{right_on})"
    );
    spec.tail.push_sql(&mut sql);
    Statement::new(sql, spec.tail.params())
}
