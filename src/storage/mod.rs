use std::path::Path;

use anyhow::{Context, Result};
use sqlx::pool::PoolConnection;
use sqlx::{sqlite::SqlitePoolOptions, Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::warn;

pub type DbPool = SqlitePool;

/// A unit of store work. Committed explicitly; rolled back when dropped.
pub type Transition = sqlx::Transaction<'static, Sqlite>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store read failed for key {key}: {source}")]
    Read {
        key: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("store write failed for key {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to acquire store connection: {0}")]
    Acquire(#[source] sqlx::Error),
    #[error("failed to begin store transition: {0}")]
    Begin(#[source] sqlx::Error),
    #[error("failed to commit store transition: {0}")]
    Commit(#[source] sqlx::Error),
}

pub async fn init_pool(database_url: &str) -> Result<DbPool> {
    ensure_dir_exists(database_url)?;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to SQLite")?;

    apply_schema(&pool).await?;
    Ok(pool)
}

fn ensure_dir_exists(database_url: &str) -> Result<()> {
    if let Some(path) = database_url.strip_prefix("sqlite://") {
        if path != ":memory:" {
            if let Some(dir) = Path::new(path).parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed creating db directory {:?}", dir))?;
            }
        }
    }
    Ok(())
}

async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv_store (
            key BLOB PRIMARY KEY,
            value BLOB NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    verify_kv_columns(pool).await?;
    Ok(())
}

/// A plain connection for read-only queries outside any transition.
pub async fn acquire(pool: &DbPool) -> Result<PoolConnection<Sqlite>, StoreError> {
    pool.acquire().await.map_err(StoreError::Acquire)
}

pub async fn begin_transition(pool: &DbPool) -> Result<Transition, StoreError> {
    pool.begin().await.map_err(StoreError::Begin)
}

pub async fn commit_transition(tx: Transition) -> Result<(), StoreError> {
    tx.commit().await.map_err(StoreError::Commit)
}

pub async fn kv_get(conn: &mut SqliteConnection, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
    sqlx::query_scalar::<_, Vec<u8>>("SELECT value FROM kv_store WHERE key = ?1;")
        .bind(key)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|source| StoreError::Read {
            key: display_key(key),
            source,
        })
}

pub async fn kv_set(conn: &mut SqliteConnection, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO kv_store (key, value)
        VALUES (?1, ?2)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value;
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(&mut *conn)
    .await
    .map_err(|source| StoreError::Write {
        key: display_key(key),
        source,
    })?;
    Ok(())
}

fn display_key(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}

async fn verify_kv_columns(pool: &SqlitePool) -> Result<()> {
    let rows = sqlx::query("PRAGMA table_info(kv_store);")
        .fetch_all(pool)
        .await?;

    let mut key_is_blob = false;
    let mut value_is_blob = false;

    for row in rows {
        let name: String = row.try_get("name")?;
        let col_type: Option<String> = row.try_get("type")?;
        match name.as_str() {
            "key" => key_is_blob = col_type.as_deref() == Some("BLOB"),
            "value" => value_is_blob = col_type.as_deref() == Some("BLOB"),
            _ => {}
        }
    }

    if !key_is_blob || !value_is_blob {
        warn!("kv_store columns are not BLOB; delete/recreate DB to pick up new schema");
    }
    Ok(())
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> DbPool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    apply_schema(&pool).await.expect("schema");
    pool
}
