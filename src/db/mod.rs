pub mod repository;

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

const CREATE_TODOS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS todos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    completed BOOLEAN NOT NULL DEFAULT FALSE
)
"#;

/// Opens the database at `database_url`, creating the file if it is missing.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

pub async fn init_schema(db: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_TODOS_TABLE).execute(db).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) async fn setup_test_db() -> SqlitePool {
    // One connection only: every `:memory:` connection is a separate database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test db");

    init_schema(&pool).await.expect("Failed to create todos table");

    pool
}
