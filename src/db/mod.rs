use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

pub mod row_parsers;

/// Opens the pool named by `DATABASE_URL` and applies pending migrations.
pub async fn init() -> anyhow::Result<SqlitePool> {
	let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
	let pool = connect(&database_url).await?;

	sqlx::migrate!()
		.run(&pool)
		.await
		.context("failed to run migrations")?;

	Ok(pool)
}

pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a pool without migrating. Foreign keys are enforced on every connection.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
	let options = SqliteConnectOptions::from_str(database_url)
		.context("invalid DATABASE_URL")?
		.create_if_missing(true)
		.foreign_keys(true);

	SqlitePoolOptions::new()
		.max_connections(10)
		.min_connections(1)
		.acquire_timeout(Duration::from_secs(10))
		.connect_with(tune(options))
		.await
		.context("failed to connect to database")
}

/// WAL journal, and writers wait up to [`BUSY_TIMEOUT`] for the write lock.
pub fn tune(options: SqliteConnectOptions) -> SqliteConnectOptions {
	options
		.journal_mode(SqliteJournalMode::Wal)
		.busy_timeout(BUSY_TIMEOUT)
}
