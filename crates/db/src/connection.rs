use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub type DbPool = sqlx::SqlitePool;

/// Opens a pool against `database_url`.
///
/// A `read_only` pool never creates the database file and refuses writes at
/// the SQLite level.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
    read_only: bool,
) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .read_only(read_only)
        .create_if_missing(!read_only);

    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect_with(options)
        .await
}

#[cfg(test)]
mod tests {
    use super::connect_with_settings;

    #[tokio::test]
    async fn read_only_pool_rejects_writes() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let url = format!("sqlite://{}", dir.path().join("sales.db").display());

        let writable = connect_with_settings(&url, 1, 5, false).await.expect("create database");
        sqlx::query("CREATE TABLE scratch (value INTEGER)")
            .execute(&writable)
            .await
            .expect("create table");
        writable.close().await;

        let read_only = connect_with_settings(&url, 1, 5, true).await.expect("open read only");
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scratch")
            .fetch_one(&read_only)
            .await
            .expect("reads still work");
        assert_eq!(count, 0);
        assert!(sqlx::query("INSERT INTO scratch (value) VALUES (1)")
            .execute(&read_only)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn read_only_pool_does_not_create_missing_database() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("absent.db");
        let url = format!("sqlite://{}", path.display());

        assert!(connect_with_settings(&url, 1, 5, true).await.is_err());
        assert!(!path.exists());
    }
}
