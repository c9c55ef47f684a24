use super::*;
use crate::error::DriverError;
use crate::pool::ResultSet;
use crate::record::{ColumnMeta, Record};
use crate::statement::{JoinSpec, MergeSet, OrderSpec, SelectSpec, TruncateOptions, WhereClause};
use crate::value::DataMap;
use std::collections::VecDeque;
use std::sync::Mutex;

// ── Scripted pool ──

#[derive(Default)]
struct Script {
    statements: Vec<(String, Vec<Value>)>,
    results: VecDeque<Result<ResultSet, String>>,
    acquired: usize,
    released: usize,
    discarded: usize,
    refuse: bool,
    hand_out_closed: bool,
    fail_rollback: bool,
}

#[derive(Clone, Default)]
struct MockPool {
    script: Arc<Mutex<Script>>,
}

struct MockConnection {
    script: Arc<Mutex<Script>>,
    open: bool,
}

impl MockPool {
    fn respond(&self, result: ResultSet) {
        self.script.lock().unwrap().results.push_back(Ok(result));
    }

    fn fail_next(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .results
            .push_back(Err(message.to_string()));
    }

    fn sql(&self) -> Vec<String> {
        let script = self.script.lock().unwrap();
        script.statements.iter().map(|(sql, _)| sql.clone()).collect()
    }

    fn params(&self, idx: usize) -> Vec<Value> {
        self.script.lock().unwrap().statements[idx].1.clone()
    }

    fn released(&self) -> usize {
        self.script.lock().unwrap().released
    }

    fn discarded(&self) -> usize {
        self.script.lock().unwrap().discarded
    }
}

impl MockConnection {
    fn record(&self, sql: &str, params: &[Value]) {
        self.script
            .lock()
            .unwrap()
            .statements
            .push((sql.to_string(), params.to_vec()));
    }
}

impl Connection for MockConnection {
    async fn run(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, DriverError> {
        self.record(sql, params);
        match self.script.lock().unwrap().results.pop_front() {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(message.into()),
            None => Ok(ResultSet::affected(0)),
        }
    }

    async fn begin(&mut self) -> Result<(), DriverError> {
        self.record("BEGIN", &[]);
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.record("COMMIT", &[]);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.record("ROLLBACK", &[]);
        if self.script.lock().unwrap().fail_rollback {
            return Err("server closed the connection unexpectedly".into());
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl ConnectionPool for MockPool {
    type Connection = MockConnection;

    async fn get_connection(&self) -> Result<MockConnection, DriverError> {
        let mut script = self.script.lock().unwrap();
        if script.refuse {
            return Err("pool exhausted".into());
        }
        script.acquired += 1;
        Ok(MockConnection {
            script: self.script.clone(),
            open: !script.hand_out_closed,
        })
    }

    fn release_connection(
        &self,
        _conn: MockConnection,
        _fail_silently: bool,
    ) -> Result<(), DriverError> {
        self.script.lock().unwrap().released += 1;
        Ok(())
    }

    fn discard_connection(&self, _conn: MockConnection) {
        self.script.lock().unwrap().discarded += 1;
    }
}

#[derive(Clone, Default)]
struct Lines(Arc<Mutex<Vec<String>>>);

impl Lines {
    fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl LogSink for Lines {
    fn write_debug_line(&self, line: &str) {
        self.0.lock().unwrap().push(line.to_string());
    }
}

fn users_result(rows: Vec<Vec<Value>>) -> ResultSet {
    ResultSet {
        columns: vec![
            ColumnMeta::new("id", "int4"),
            ColumnMeta::new("name", "text"),
        ],
        rows_affected: rows.len() as u64,
        rows,
    }
}

async fn open(pool: &MockPool) -> Session<'_, MockPool> {
    Session::open(pool, SessionConfig::default()).await.unwrap()
}

// ── Statements ──

#[tokio::test]
async fn fetch_all_numbers_placeholders_and_opens_transaction() {
    let pool = MockPool::default();
    let mut session = open(&pool).await;

    let spec = SelectSpec::new()
        .fields(["id", "name"])
        .filter(WhereClause::new("age > %s").bind(30))
        .order(OrderSpec::asc("name"))
        .limit(10);
    let rows = session.fetch_all("users", &spec).await.unwrap();

    assert!(rows.is_empty());
    assert_eq!(
        pool.sql(),
        vec![
            "BEGIN",
            "SELECT id,name FROM users WHERE age > $1 ORDER BY name ASC LIMIT 10"
        ]
    );
    assert_eq!(pool.params(1), vec![Value::Int(30)]);
    assert!(session.in_transaction());
}

#[tokio::test]
async fn update_binds_data_then_filter() {
    let pool = MockPool::default();
    pool.respond(ResultSet::affected(1));
    let mut session = open(&pool).await;

    let updated = session
        .update(
            "users",
            &DataMap::new().with("name", "Bob"),
            Some(&WhereClause::new("id=%s").bind(5)),
        )
        .await
        .unwrap();

    assert_eq!(updated, 1);
    assert_eq!(pool.sql()[1], "UPDATE users SET name=$1 WHERE id=$2");
    assert_eq!(
        pool.params(1),
        vec![Value::Text("Bob".into()), Value::Int(5)]
    );
}

#[tokio::test]
async fn fetch_one_forces_limit_one() {
    let pool = MockPool::default();
    pool.respond(users_result(vec![vec![Value::Int(1), Value::Text("alice".into())]]));
    let mut session = open(&pool).await;

    let spec = SelectSpec::new()
        .filter(WhereClause::new("id=%s").bind(1))
        .limit(50);
    let row = session.fetch_one("users", &spec).await.unwrap().unwrap();

    assert_eq!(pool.sql()[1], "SELECT * FROM users WHERE id=$1 LIMIT 1");
    assert!(row.matches(&DataMap::new().with("id", 1).with("name", "alice")));
}

#[tokio::test]
async fn insert_returning_gives_the_returned_row() {
    let pool = MockPool::default();
    pool.respond(ResultSet {
        columns: vec![ColumnMeta::new("id", "int4")],
        rows: vec![vec![Value::Int(7)]],
        rows_affected: 1,
    });
    let mut session = open(&pool).await;

    let data = DataMap::new().with("name", "alice").with("age", 31);
    let row = session
        .insert_returning("users", &data, "id")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(row.get("id"), Some(&Value::Int(7)));
    assert_eq!(
        pool.sql()[1],
        "INSERT INTO users (name,age) VALUES($1,$2) RETURNING id"
    );
    assert_eq!(pool.params(1), data.into_values());
}

#[tokio::test]
async fn positional_rows_follow_config() {
    let pool = MockPool::default();
    pool.respond(users_result(vec![
        vec![Value::Int(1), Value::Text("a".into())],
        vec![Value::Int(2), Value::Text("b".into())],
    ]));
    let mut session = Session::open(&pool, SessionConfig::new().row_shape(RowShape::Positional))
        .await
        .unwrap();

    let rows = session.fetch_all("users", &SelectSpec::new()).await.unwrap();
    assert_eq!(
        rows[1],
        Record::Positional(vec![Value::Int(2), Value::Text("b".into())])
    );
    assert_eq!(rows[1].get("id"), None);
}

#[tokio::test]
async fn join_is_named_and_none_when_empty() {
    let pool = MockPool::default();
    pool.respond(ResultSet::default());
    pool.respond(users_result(vec![vec![Value::Int(1), Value::Text("a".into())]]));
    let mut session = Session::open(&pool, SessionConfig::new().row_shape(RowShape::Positional))
        .await
        .unwrap();

    let spec = JoinSpec::new("users", "orders", "id", "user_id")
        .left_fields(["id"])
        .right_fields(["name"]);
    assert_eq!(session.join(&spec).await.unwrap(), None);

    let rows = session.join(&spec).await.unwrap().unwrap();
    assert_eq!(rows[0].get("name"), Some(&Value::Text("a".into())));
    assert_eq!(
        pool.sql()[1],
        "SELECT users.id,orders.name FROM users LEFT JOIN orders ON (users.id = orders.user_id)"
    );
}

#[tokio::test]
async fn merge_escapes_literals_by_default() {
    let pool = MockPool::default();
    let mut session = open(&pool).await;

    let data = DataMap::new().with("id", 1).with("name", "O'Brien");
    session.merge("users", &data, &["id"]).await.unwrap();

    assert_eq!(
        pool.sql()[1],
        "INSERT INTO users (id,name) VALUES($1,$2) ON CONFLICT (id) DO UPDATE SET name='O''Brien'"
    );
}

#[tokio::test]
async fn merge_update_uses_excluded_when_configured() {
    let pool = MockPool::default();
    let mut session = Session::open(&pool, SessionConfig::new().merge_set(MergeSet::Excluded))
        .await
        .unwrap();

    let data = DataMap::new()
        .with("id", 1)
        .with("name", "a")
        .with("age", 3);
    session
        .merge_update("users", &data, &["id"], &["age", "missing"])
        .await
        .unwrap();

    assert_eq!(
        pool.sql()[1],
        "INSERT INTO users (id,name,age) VALUES($1,$2,$3) ON CONFLICT (id) DO UPDATE SET age=EXCLUDED.age"
    );
}

#[tokio::test]
async fn merge_with_unrenderable_value_sends_nothing() {
    let pool = MockPool::default();
    let lines = Lines::default();
    let mut session = Session::builder(&pool)
        .log_sink(lines.clone())
        .open()
        .await
        .unwrap();

    let data = DataMap::new().with("id", 1).with("meta", Value::Null);
    let err = session.merge("users", &data, &["id"]).await.unwrap_err();

    assert!(matches!(err, SessionError::MalformedLiteral { .. }));
    assert!(pool.sql().is_empty());
    assert_eq!(lines.all().len(), 1);
}

#[tokio::test]
async fn divergent_bulk_rows_are_rejected() {
    let pool = MockPool::default();
    let mut session = open(&pool).await;

    let rows = [
        DataMap::new().with("a", 1).with("b", 2),
        DataMap::new().with("b", 2).with("a", 1),
    ];
    let err = session.insert_bulk("t", &rows).await.unwrap_err();
    assert!(matches!(err, SessionError::Validation(_)));
    assert!(pool.sql().is_empty());
}

#[tokio::test]
async fn placeholder_count_mismatch_is_rejected() {
    let pool = MockPool::default();
    let mut session = open(&pool).await;

    let err = session
        .execute("SELECT * FROM t WHERE a=%s AND b=%s", &[Value::Int(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Validation(_)));
    assert!(pool.sql().is_empty());
}

#[tokio::test]
async fn raw_dollar_parameters_pass_through() {
    let pool = MockPool::default();
    let mut session = open(&pool).await;

    session
        .execute("SELECT * FROM t WHERE a=$1", &[Value::Int(1)])
        .await
        .unwrap();
    assert_eq!(pool.sql()[1], "SELECT * FROM t WHERE a=$1");
}

#[tokio::test]
async fn dollar_in_identifier_still_checks_param_count() {
    let pool = MockPool::default();
    let mut session = open(&pool).await;

    let err = session
        .execute("UPDATE t SET a$b=%s WHERE id=%s", &[Value::Int(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Validation(_)));

    // no placeholders and no `$n`: the params have nowhere to go
    let err = session
        .execute("SELECT * FROM t WHERE n = 'x'", &[Value::Int(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Validation(_)));
    assert!(pool.sql().is_empty());

    session
        .execute("UPDATE t SET a$b=%s WHERE id=%s", &[Value::Int(1), Value::Int(2)])
        .await
        .unwrap();
    session
        .execute(r"SELECT * FROM t WHERE n = E'it\'s' AND id=%s", &[Value::Int(3)])
        .await
        .unwrap();
    assert_eq!(
        pool.sql(),
        vec![
            "BEGIN",
            "UPDATE t SET a$b=$1 WHERE id=$2",
            r"SELECT * FROM t WHERE n = E'it\'s' AND id=$1",
        ]
    );
}

#[tokio::test]
async fn percent_in_merge_literal_survives_numbering() {
    let pool = MockPool::default();
    let mut session = open(&pool).await;

    let data = DataMap::new().with("id", 1).with("rate", "50%s off");
    session.merge("deals", &data, &["id"]).await.unwrap();

    assert_eq!(
        pool.sql()[1],
        "INSERT INTO deals (id,rate) VALUES($1,$2) ON CONFLICT (id) DO UPDATE SET rate='50%s off'"
    );
}

#[tokio::test]
async fn ddl_and_call_statements() {
    let pool = MockPool::default();
    let mut session = Session::open(&pool, SessionConfig::new().autocommit(true))
        .await
        .unwrap();

    session
        .truncate("t", TruncateOptions::new().restart_identity())
        .await
        .unwrap();
    session.drop_table("t", true).await.unwrap();
    session.create_table("t", "id serial primary key").await.unwrap();
    session
        .call("refresh", Some(&DataMap::new().with("days", 7)))
        .await
        .unwrap();

    assert_eq!(
        pool.sql(),
        vec![
            "TRUNCATE t RESTART IDENTITY",
            "DROP TABLE IF EXISTS t CASCADE",
            "CREATE TABLE t (id serial primary key)",
            "CALL refresh($1)",
        ]
    );
}

// ── Returning contract ──

fn two_ids() -> ResultSet {
    ResultSet {
        columns: vec![ColumnMeta::new("id", "int4")],
        rows: vec![vec![Value::Int(1)], vec![Value::Int(2)]],
        rows_affected: 2,
    }
}

#[tokio::test]
async fn single_row_returning_variants_keep_the_first_row() {
    let pool = MockPool::default();
    let mut session = open(&pool).await;
    let rows = [DataMap::new().with("id", 1), DataMap::new().with("id", 2)];
    let data = DataMap::new().with("id", 1).with("name", "a");

    pool.respond(two_ids());
    let row = session.insert_returning("users", &data, "id").await.unwrap();
    assert_eq!(row.unwrap().get("id"), Some(&Value::Int(1)));

    pool.respond(two_ids());
    let row = session
        .insert_bulk_returning("users", &rows, "id")
        .await
        .unwrap();
    assert_eq!(row.unwrap().get("id"), Some(&Value::Int(1)));

    pool.respond(two_ids());
    let row = session
        .merge_update_returning("users", &data, &["id"], &["name"], "id")
        .await
        .unwrap();
    assert_eq!(row.unwrap().get("id"), Some(&Value::Int(1)));

    pool.respond(ResultSet::default());
    let row = session.insert_returning("users", &data, "id").await.unwrap();
    assert_eq!(row, None);
}

#[tokio::test]
async fn multi_row_returning_variants_keep_every_row() {
    let pool = MockPool::default();
    let mut session = open(&pool).await;
    let data = DataMap::new().with("id", 1).with("name", "a");
    let filter = WhereClause::new("id > %s").bind(0);
    let ids = |rows: Vec<Record>| -> Vec<Value> {
        rows.iter().filter_map(|r| r.get("id").cloned()).collect()
    };

    pool.respond(two_ids());
    let rows = session
        .update_returning("users", &DataMap::new().with("name", "b"), Some(&filter), "id")
        .await
        .unwrap();
    assert_eq!(ids(rows), vec![Value::Int(1), Value::Int(2)]);

    pool.respond(two_ids());
    let rows = session
        .merge_returning("users", &data, &["id"], "id")
        .await
        .unwrap();
    assert_eq!(ids(rows), vec![Value::Int(1), Value::Int(2)]);

    pool.respond(two_ids());
    let rows = session
        .delete_returning("users", Some(&filter), "id")
        .await
        .unwrap();
    assert_eq!(ids(rows), vec![Value::Int(1), Value::Int(2)]);

    pool.respond(two_ids());
    let rows = session.call_proc("list_ids", None).await.unwrap();
    assert_eq!(ids(rows), vec![Value::Int(1), Value::Int(2)]);
}

#[tokio::test]
async fn call_discards_procedure_rows() {
    let pool = MockPool::default();
    pool.respond(two_ids());
    let mut session = open(&pool).await;

    let () = session.call("list_ids", None).await.unwrap();
    assert_eq!(pool.sql()[1], "CALL list_ids()");
}

// ── Transactions ──

#[tokio::test]
async fn begin_is_lazy_and_reopened_after_commit() {
    let pool = MockPool::default();
    let mut session = open(&pool).await;

    // nothing open yet
    session.commit().await.unwrap();
    assert!(pool.sql().is_empty());

    session.execute("SELECT 1", &[]).await.unwrap();
    session.execute("SELECT 2", &[]).await.unwrap();
    session.commit().await.unwrap();
    session.execute("SELECT 3", &[]).await.unwrap();
    session.rollback().await.unwrap();

    assert_eq!(
        pool.sql(),
        vec!["BEGIN", "SELECT 1", "SELECT 2", "COMMIT", "BEGIN", "SELECT 3", "ROLLBACK"]
    );
}

#[tokio::test]
async fn autocommit_never_opens_a_transaction() {
    let pool = MockPool::default();
    let mut session = Session::open(&pool, SessionConfig::new().autocommit(true))
        .await
        .unwrap();

    session.execute("SELECT 1", &[]).await.unwrap();
    session.commit().await.unwrap();
    assert_eq!(pool.sql(), vec!["SELECT 1"]);
}

#[tokio::test]
async fn scoped_failure_rolls_back_and_closes_cursor() {
    let pool = MockPool::default();
    let lines = Lines::default();
    let mut session = Session::builder(&pool)
        .log_sink(lines.clone())
        .open()
        .await
        .unwrap();

    let outcome: SessionResult<u64> = crate::scoped!(session, s, {
        s.insert("users", &DataMap::new().with("name", "a")).await?;
        Err(SessionError::validation("boom"))
    });

    assert!(matches!(outcome, Err(SessionError::Validation(_))));
    let sql = pool.sql();
    assert_eq!(sql.last().map(String::as_str), Some("ROLLBACK"));
    assert!(!sql.iter().any(|s| s == "COMMIT"));
    assert!(lines.all().contains(&"Rolling back transaction".to_string()));
    assert!(session.cursor().is_closed());

    let again = session.finish(Ok(())).await;
    assert!(matches!(again, Err(SessionError::SessionClosed)));
    let err = session.execute("SELECT 1", &[]).await.unwrap_err();
    assert!(err.is_closed());
}

#[tokio::test]
async fn scoped_success_commits() {
    let pool = MockPool::default();
    pool.respond(ResultSet::affected(2));
    let lines = Lines::default();
    let mut session = Session::builder(&pool)
        .log_sink(lines.clone())
        .open()
        .await
        .unwrap();

    let rows = [
        DataMap::new().with("name", "a"),
        DataMap::new().with("name", "b"),
    ];
    let inserted = crate::scoped!(session, s, { s.insert_bulk("users", &rows).await }).unwrap();

    assert_eq!(inserted, 2);
    assert_eq!(
        pool.sql(),
        vec!["BEGIN", "INSERT INTO users (name) VALUES ($1),($2)", "COMMIT"]
    );
    assert_eq!(lines.all(), vec!["Committing transaction"]);
}

#[tokio::test]
async fn failed_statement_is_logged_and_returned() {
    let pool = MockPool::default();
    pool.fail_next("relation \"nope\" does not exist");
    let lines = Lines::default();
    let mut session = Session::builder(&pool)
        .log_sink(lines.clone())
        .open()
        .await
        .unwrap();

    let err = session.fetch_all("nope", &SelectSpec::new()).await.unwrap_err();
    assert!(matches!(err, SessionError::Execution(_)));
    assert_eq!(
        lines.all(),
        vec!["execute() failed: Execution error: relation \"nope\" does not exist"]
    );
}

// ── Lifecycle ──

#[tokio::test]
async fn close_releases_once() {
    let pool = MockPool::default();
    let mut session = open(&pool).await;
    assert!(session.is_open());

    session.close().await;
    session.close().await;
    assert!(!session.is_open());
    assert_eq!(pool.released(), 1);

    let err = session.insert("t", &DataMap::new().with("a", 1)).await.unwrap_err();
    assert!(err.is_closed());
    assert!(matches!(
        session.commit().await,
        Err(SessionError::SessionClosed)
    ));

    drop(session);
    assert_eq!(pool.released(), 1);
}

#[tokio::test]
async fn close_rolls_back_open_transaction() {
    let pool = MockPool::default();
    let mut session = open(&pool).await;
    session.execute("SELECT 1", &[]).await.unwrap();

    session.close().await;
    assert_eq!(pool.sql().last().map(String::as_str), Some("ROLLBACK"));
    assert_eq!(pool.released(), 1);
    assert_eq!(pool.discarded(), 0);
}

#[tokio::test]
async fn failed_rollback_discards_the_connection() {
    let pool = MockPool::default();
    pool.script.lock().unwrap().fail_rollback = true;
    let mut session = open(&pool).await;
    session.execute("SELECT 1", &[]).await.unwrap();

    session.close().await;
    assert_eq!(pool.sql().last().map(String::as_str), Some("ROLLBACK"));
    assert_eq!(pool.released(), 0);
    assert_eq!(pool.discarded(), 1);
}

#[tokio::test]
async fn failed_rollback_keeps_transaction_open() {
    let pool = MockPool::default();
    pool.script.lock().unwrap().fail_rollback = true;
    let mut session = open(&pool).await;
    session.execute("SELECT 1", &[]).await.unwrap();

    assert!(session.rollback().await.is_err());
    assert!(session.in_transaction());

    let outcome = session.finish(Err::<(), _>(SessionError::validation("boom"))).await;
    assert!(matches!(outcome, Err(SessionError::Validation(_))));
    drop(session);
    assert_eq!(pool.discarded(), 1);
}

#[tokio::test]
async fn drop_releases_or_discards() {
    let pool = MockPool::default();
    {
        let _session = open(&pool).await;
    }
    assert_eq!(pool.released(), 1);

    {
        let mut session = open(&pool).await;
        session.execute("SELECT 1", &[]).await.unwrap();
    }
    assert_eq!(pool.released(), 1);
    assert_eq!(pool.discarded(), 1);
}

#[tokio::test]
async fn open_failures_are_connection_errors() {
    let pool = MockPool::default();
    pool.script.lock().unwrap().refuse = true;
    let lines = Lines::default();

    let err = Session::builder(&pool)
        .log_sink(lines.clone())
        .open()
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Connection(_)));
    assert_eq!(
        lines.all(),
        vec!["postgresql connection failed: Connection error: pool exhausted"]
    );

    let pool = MockPool::default();
    pool.script.lock().unwrap().hand_out_closed = true;
    let err = Session::open(&pool, SessionConfig::default()).await.unwrap_err();
    assert!(matches!(err, SessionError::Connection(_)));
    assert_eq!(pool.released(), 1);
}

// ── Logging ──

#[tokio::test]
async fn executions_are_logged_only_with_a_formatter() {
    let pool = MockPool::default();
    let lines = Lines::default();
    let mut session = Session::builder(&pool)
        .log_sink(lines.clone())
        .open()
        .await
        .unwrap();
    session.execute("SELECT 1", &[]).await.unwrap();
    assert!(session.cursor().timestamp().is_none());
    assert!(lines.all().is_empty());
    drop(session);

    let lines = Lines::default();
    let mut session = Session::builder(&pool)
        .log_sink(lines.clone())
        .log_format(|event| match event {
            LogEvent::Executed(cursor) => format!(
                "[{}] {}",
                cursor.row_count().unwrap_or_default(),
                cursor.query().unwrap_or_default()
            ),
            other => crate::log::default_log_format(other),
        })
        .open()
        .await
        .unwrap();
    session
        .execute("SELECT * FROM t WHERE a=%s", &[Value::Int(1)])
        .await
        .unwrap();

    assert!(session.cursor().timestamp().is_some());
    assert_eq!(lines.all(), vec!["[0] SELECT * FROM t WHERE a=$1"]);
}
