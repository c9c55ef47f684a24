//! Scoped sessions with logging
//!
//! Run with: RUST_LOG=debug cargo run --example scoped -p pgsession
//!
//! Set DATABASE_URL in .env file or environment variable.

use deadpool_postgres::Pool;
use pgsession::{
    DataMap, LogEvent, PoolSettings, SelectSpec, Session, SessionConfig, SessionError,
    TracingSink, WhereClause, default_log_format,
};

async fn transfer(
    session: &mut Session<'_, Pool>,
    from: i32,
    to: i32,
    amount: i64,
) -> Result<(), SessionError> {
    session
        .execute(
            "UPDATE accounts SET balance = balance - %s WHERE id = %s",
            &[amount.into(), from.into()],
        )
        .await?;
    session
        .execute(
            "UPDATE accounts SET balance = balance + %s WHERE id = %s",
            &[amount.into(), to.into()],
        )
        .await?;

    let balance = session
        .fetch_one(
            "accounts",
            &SelectSpec::new()
                .fields(["balance"])
                .filter(WhereClause::new("id=%s").bind(from)),
        )
        .await?
        .and_then(|row| row.get("balance").and_then(|v| v.as_i64()))
        .unwrap_or_default();
    if balance < 0 {
        return Err(SessionError::validation(format!(
            "account {from} would be overdrawn ({balance})"
        )));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), SessionError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let pool = PoolSettings::from_env()?.create_pool()?;

    // Setup
    let mut setup = Session::open(&pool, SessionConfig::new().autocommit(true)).await?;
    setup.drop_table("accounts", false).await?;
    setup
        .create_table(
            "accounts",
            "id INT PRIMARY KEY, owner TEXT NOT NULL, balance BIGINT NOT NULL",
        )
        .await?;
    setup
        .insert_bulk(
            "accounts",
            &[
                DataMap::new().with("id", 1).with("owner", "alice").with("balance", 100),
                DataMap::new().with("id", 2).with("owner", "bob").with("balance", 20),
            ],
        )
        .await?;
    setup.close().await;

    let mut session = Session::builder(&pool)
        .log_sink(TracingSink::new().max_line_length(120))
        .log_format(|event| match event {
            LogEvent::Executed(cursor) => format!(
                "{} ({:?}, {} rows)",
                cursor.query().unwrap_or_default(),
                cursor.elapsed().unwrap_or_default(),
                cursor.row_count().unwrap_or_default()
            ),
            other => default_log_format(other),
        })
        .open()
        .await?;

    // Both updates commit together.
    pgsession::scoped!(session, s, { transfer(s, 1, 2, 30).await })?;

    // The overdraft check fails after both updates ran; nothing is kept.
    let mut session = Session::builder(&pool)
        .log_sink(TracingSink::new())
        .open()
        .await?;
    let outcome = pgsession::scoped!(session, s, { transfer(s, 2, 1, 1_000).await });
    println!("Second transfer: {outcome:?}");

    Ok(())
}
