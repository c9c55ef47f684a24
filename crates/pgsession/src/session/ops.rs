//! Table-oriented helpers. Each one builds a single statement and runs it through
//! [`Session::execute`].

use super::Session;
use crate::cursor::Cursor;
use crate::error::SessionResult;
use crate::pool::ConnectionPool;
use crate::record::Record;
use crate::statement::{
    JoinSpec, SelectSpec, Statement, TruncateOptions, WhereClause, build_call, build_create,
    build_delete, build_drop, build_insert, build_insert_bulk, build_join, build_merge,
    build_merge_update, build_select, build_truncate, build_update,
};
use crate::value::DataMap;

impl<P: ConnectionPool> Session<'_, P> {
    /// Execute a prepared [`Statement`].
    pub async fn run(&mut self, statement: &Statement) -> SessionResult<&mut Cursor> {
        self.execute(statement.sql(), statement.params()).await
    }

    fn built(&self, statement: SessionResult<Statement>) -> SessionResult<Statement> {
        statement.inspect_err(|err| self.log.failure("statement", err))
    }

    async fn affected(&mut self, statement: &Statement) -> SessionResult<u64> {
        let cursor = self.run(statement).await?;
        Ok(cursor.row_count().unwrap_or(0))
    }

    async fn first_row(&mut self, statement: &Statement) -> SessionResult<Option<Record>> {
        Ok(self.run(statement).await?.fetch_one())
    }

    async fn all_rows(&mut self, statement: &Statement) -> SessionResult<Vec<Record>> {
        Ok(self.run(statement).await?.fetch_all())
    }

    /// First matching row. Any configured limit is replaced by `LIMIT 1`.
    pub async fn fetch_one(
        &mut self,
        table: &str,
        spec: &SelectSpec,
    ) -> SessionResult<Option<Record>> {
        let spec = spec.clone().limit(1);
        self.first_row(&build_select(table, &spec)).await
    }

    /// All matching rows.
    pub async fn fetch_all(&mut self, table: &str, spec: &SelectSpec) -> SessionResult<Vec<Record>> {
        self.all_rows(&build_select(table, spec)).await
    }

    /// Rows of a two-table `LEFT JOIN`, always name-addressable. `None` when nothing matched.
    pub async fn join(&mut self, spec: &JoinSpec) -> SessionResult<Option<Vec<Record>>> {
        let rows = self.run(&build_join(spec)).await?.fetch_all_named();
        Ok((!rows.is_empty()).then_some(rows))
    }

    /// Insert one row; returns the number of rows inserted.
    pub async fn insert(&mut self, table: &str, data: &DataMap) -> SessionResult<u64> {
        self.affected(&build_insert(table, data, None)).await
    }

    /// Insert one row and return the `returning` columns of it.
    pub async fn insert_returning(
        &mut self,
        table: &str,
        data: &DataMap,
        returning: &str,
    ) -> SessionResult<Option<Record>> {
        self.first_row(&build_insert(table, data, Some(returning)))
            .await
    }

    /// Insert many rows with one statement. All rows must share the first row's columns.
    pub async fn insert_bulk(&mut self, table: &str, rows: &[DataMap]) -> SessionResult<u64> {
        let statement = self.built(build_insert_bulk(table, rows, None))?;
        self.affected(&statement).await
    }

    /// Bulk insert returning the first inserted row's `returning` columns.
    pub async fn insert_bulk_returning(
        &mut self,
        table: &str,
        rows: &[DataMap],
        returning: &str,
    ) -> SessionResult<Option<Record>> {
        let statement = self.built(build_insert_bulk(table, rows, Some(returning)))?;
        self.first_row(&statement).await
    }

    /// Update matching rows (every row without a filter); returns the number updated.
    pub async fn update(
        &mut self,
        table: &str,
        data: &DataMap,
        filter: Option<&WhereClause>,
    ) -> SessionResult<u64> {
        self.affected(&build_update(table, data, filter, None)).await
    }

    pub async fn update_returning(
        &mut self,
        table: &str,
        data: &DataMap,
        filter: Option<&WhereClause>,
        returning: &str,
    ) -> SessionResult<Vec<Record>> {
        self.all_rows(&build_update(table, data, filter, Some(returning)))
            .await
    }

    /// Insert, or update every non-conflict column when a row with the same `conflict` key
    /// already exists.
    pub async fn merge(
        &mut self,
        table: &str,
        data: &DataMap,
        conflict: &[&str],
    ) -> SessionResult<u64> {
        let mode = self.config.merge_set;
        let statement = self.built(build_merge(table, data, conflict, None, mode))?;
        self.affected(&statement).await
    }

    pub async fn merge_returning(
        &mut self,
        table: &str,
        data: &DataMap,
        conflict: &[&str],
        returning: &str,
    ) -> SessionResult<Vec<Record>> {
        let mode = self.config.merge_set;
        let statement = self.built(build_merge(table, data, conflict, Some(returning), mode))?;
        self.all_rows(&statement).await
    }

    /// Like [`merge`](Self::merge), but only the columns in `update` are overwritten.
    pub async fn merge_update(
        &mut self,
        table: &str,
        data: &DataMap,
        conflict: &[&str],
        update: &[&str],
    ) -> SessionResult<u64> {
        let mode = self.config.merge_set;
        let statement =
            self.built(build_merge_update(table, data, conflict, update, None, mode))?;
        self.affected(&statement).await
    }

    pub async fn merge_update_returning(
        &mut self,
        table: &str,
        data: &DataMap,
        conflict: &[&str],
        update: &[&str],
        returning: &str,
    ) -> SessionResult<Option<Record>> {
        let mode = self.config.merge_set;
        let statement = self.built(build_merge_update(
            table,
            data,
            conflict,
            update,
            Some(returning),
            mode,
        ))?;
        self.first_row(&statement).await
    }

    /// Delete matching rows (every row without a filter); returns the number deleted.
    pub async fn delete(&mut self, table: &str, filter: Option<&WhereClause>) -> SessionResult<u64> {
        self.affected(&build_delete(table, filter, None)).await
    }

    pub async fn delete_returning(
        &mut self,
        table: &str,
        filter: Option<&WhereClause>,
        returning: &str,
    ) -> SessionResult<Vec<Record>> {
        self.all_rows(&build_delete(table, filter, Some(returning)))
            .await
    }

    /// Call a stored procedure, discarding anything it returns.
    pub async fn call(&mut self, procedure: &str, data: Option<&DataMap>) -> SessionResult<()> {
        self.run(&build_call(procedure, data)).await?;
        Ok(())
    }

    /// Call a stored procedure and return its rows (e.g. `INOUT` parameters).
    pub async fn call_proc(
        &mut self,
        procedure: &str,
        data: Option<&DataMap>,
    ) -> SessionResult<Vec<Record>> {
        self.all_rows(&build_call(procedure, data)).await
    }

    pub async fn truncate(&mut self, table: &str, options: TruncateOptions) -> SessionResult<()> {
        self.run(&build_truncate(table, options)).await?;
        Ok(())
    }

    /// `DROP TABLE IF EXISTS`.
    pub async fn drop_table(&mut self, table: &str, cascade: bool) -> SessionResult<()> {
        self.run(&build_drop(table, cascade)).await?;
        Ok(())
    }

    /// `CREATE TABLE table (schema)`, with `schema` the column definitions.
    pub async fn create_table(&mut self, table: &str, schema: &str) -> SessionResult<()> {
        self.run(&build_create(table, schema)).await?;
        Ok(())
    }
}
