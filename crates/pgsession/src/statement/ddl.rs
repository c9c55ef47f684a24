use super::Statement;

/// Flags for `TRUNCATE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TruncateOptions {
    pub restart_identity: bool,
    pub cascade: bool,
}

impl TruncateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset sequences owned by the truncated columns.
    pub fn restart_identity(mut self) -> Self {
        self.restart_identity = true;
        self
    }

    /// Also truncate tables with foreign keys into the target.
    pub fn cascade(mut self) -> Self {
        self.cascade = true;
        self
    }
}

/// `TRUNCATE t [RESTART IDENTITY] [CASCADE]`. `table` may list several tables (`"a, b"`).
pub fn build_truncate(table: &str, options: TruncateOptions) -> Statement {
    let mut sql = format!("TRUNCATE {table}");
    if options.restart_identity {
        sql.push_str(" RESTART IDENTITY");
    }
    if options.cascade {
        sql.push_str(" CASCADE");
    }
    Statement::raw(sql)
}

/// `DROP TABLE IF EXISTS t [CASCADE]`
pub fn build_drop(table: &str, cascade: bool) -> Statement {
    let mut sql = format!("DROP TABLE IF EXISTS {table}");
    if cascade {
        sql.push_str(" CASCADE");
    }
    Statement::raw(sql)
}

/// `CREATE TABLE t (schema)`, e.g. `build_create("my_table", "id SERIAL PRIMARY KEY, name TEXT")`.
pub fn build_create(table: &str, schema: &str) -> Statement {
    Statement::raw(format!("CREATE TABLE {table} ({schema})"))
}
