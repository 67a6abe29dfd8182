use anyhow::{Context, Result};
use sqlx::{any::AnyConnectOptions, AnyPool, ConnectOptions, migrate::Migrator};
use sqlx::any::AnyPoolOptions;
use std::{path::PathBuf, str::FromStr};
use std::sync::Once;

use crate::config::project_dirs;
use crate::storage::Storage;

// sqlx::any needs its drivers registered once per process
static INSTALL_DRIVERS: Once = Once::new();

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
}

impl Database {
    /// Connect to `database_url`, or to a SQLite file in the user's data directory.
    pub async fn connect(database_url: Option<&str>) -> Result<Self> {
        INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);

        let url = match database_url {
            Some(u) if !u.trim().is_empty() => u.to_string(),
            _ => default_sqlite_url()?,
        };

        let opts = AnyConnectOptions::from_str(&url)
            .with_context(|| format!("invalid database URL: {url}"))?
            .disable_statement_logging();

        // every connection to an in-memory sqlite db is a separate db
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await
            .with_context(|| format!("failed to connect to database: {url}"))?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.context("running migrations")
    }

    pub fn pool(&self) -> &AnyPool { &self.pool }
}

#[async_trait::async_trait]
impl Storage for Database {
    async fn get_text(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query_scalar::<_, String>("SELECT value FROM kv_records WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn put_text(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv_records(key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)\n             ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at=excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn default_sqlite_url() -> Result<String> {
    let proj = project_dirs().context("unable to determine data directory for default sqlite path")?;
    let mut path: PathBuf = proj.data_dir().to_path_buf();
    std::fs::create_dir_all(&path).with_context(|| format!("creating data dir: {}", path.display()))?;
    path.push("panograb.db");

    let mut path_str = path.to_string_lossy().to_string();
    if path_str.contains(' ') { path_str = path_str.replace(' ', "%20"); }
    Ok(format!("sqlite://{path_str}?mode=rwc"))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> Database {
        let db = Database::connect(Some("sqlite::memory:")).await.unwrap();
        db.run_migrations().await.unwrap();
        db
    }

    #[tokio::test]
    async fn text_records_upsert() {
        let db = memory_db().await;
        assert_eq!(db.get_text("VRDir").await.unwrap(), None);
        db.put_text("VRDir", "/a").await.unwrap();
        db.put_text("VRDir", "/b").await.unwrap();
        assert_eq!(db.get_text("VRDir").await.unwrap().as_deref(), Some("/b"));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_records")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = memory_db().await;
        db.run_migrations().await.unwrap();
    }

    #[tokio::test]
    async fn file_database_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("records.db").display());
        {
            let db = Database::connect(Some(&url)).await.unwrap();
            db.run_migrations().await.unwrap();
            db.put_text("VRFiles", "[]").await.unwrap();
            db.pool().close().await;
        }
        let db = Database::connect(Some(&url)).await.unwrap();
        assert_eq!(db.get_text("VRFiles").await.unwrap().as_deref(), Some("[]"));
    }
}
