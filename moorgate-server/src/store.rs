//! SQLite-backed nonce store.
//!
//! Single-use semantics ride on one conditional UPDATE: consuming flips a
//! row from unused to used only while it is unexpired, and the row count
//! tells whether this caller won. Two concurrent submissions of the same
//! challenge therefore cannot both pass, whatever the interleaving.

use async_trait::async_trait;
use moorgate_auth::{generate_nonce, NonceStore, NonceStoreError};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::SqlitePool;

/// Persistent store of issued nonces, keyed `(subject, nonce)`.
#[derive(Clone)]
pub struct SqliteNonceStore {
    pool: SqlitePool,
    ttl_secs: i64,
}

impl SqliteNonceStore {
    /// Build the store on an existing pool, creating the table if needed.
    ///
    /// # Errors
    ///
    /// The schema statement fails.
    pub async fn new(pool: SqlitePool, ttl_secs: i64) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS nonces (
                subject TEXT NOT NULL,
                nonce TEXT NOT NULL,
                issued_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                used_at INTEGER,
                PRIMARY KEY (subject, nonce)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool, ttl_secs })
    }

    /// Open (or create) the database at `path` and build a store on it.
    ///
    /// # Errors
    ///
    /// The database cannot be opened or the schema cannot be created.
    pub async fn open(path: &str, ttl_secs: i64) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // SQLite allows one writer at a time anyway; a single pooled
        // connection keeps the UPDATE race inside the engine.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::new(pool, ttl_secs).await
    }

    /// Delete rows past their expiry. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// The delete fails.
    pub async fn purge_expired(&self, now_unix: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM nonces WHERE expires_at <= ?")
            .bind(now_unix)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl NonceStore for SqliteNonceStore {
    async fn issue(&self, subject: &str) -> Result<String, NonceStoreError> {
        let nonce = generate_nonce();
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO nonces (subject, nonce, issued_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(subject)
        .bind(&nonce)
        .bind(now)
        .bind(now + self.ttl_secs)
        .execute(&self.pool)
        .await
        .map_err(|e| NonceStoreError::Unavailable(e.to_string()))?;

        Ok(nonce)
    }

    async fn consume(&self, subject: &str, nonce: &str) -> Result<bool, NonceStoreError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "UPDATE nonces
             SET used_at = ?
             WHERE subject = ? AND nonce = ? AND used_at IS NULL AND expires_at > ?",
        )
        .bind(now)
        .bind(subject)
        .bind(nonce)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| NonceStoreError::Unavailable(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBJECT: &str = "GA7QYNF7SOWQ3GLR2BGMZEHXAVIRZA4KVWLTJJFC7MGXUA74P7UJVSGZ";

    async fn test_store(ttl_secs: i64) -> SqliteNonceStore {
        let options = SqliteConnectOptions::new().filename(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        SqliteNonceStore::new(pool, ttl_secs).await.unwrap()
    }

    #[tokio::test]
    async fn test_issue_then_consume_exactly_once() {
        let store = test_store(300).await;

        let nonce = store.issue(SUBJECT).await.unwrap();
        assert!(store.consume(SUBJECT, &nonce).await.unwrap());
        assert!(!store.consume(SUBJECT, &nonce).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_nonce_not_consumable() {
        let store = test_store(300).await;
        assert!(!store.consume(SUBJECT, "never-issued").await.unwrap());
    }

    #[tokio::test]
    async fn test_nonce_scoped_to_subject() {
        let store = test_store(300).await;

        let nonce = store.issue(SUBJECT).await.unwrap();
        assert!(!store.consume("someone-else", &nonce).await.unwrap());
        assert!(store.consume(SUBJECT, &nonce).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_nonce_not_consumable() {
        let store = test_store(-10).await;

        let nonce = store.issue(SUBJECT).await.unwrap();
        assert!(!store.consume(SUBJECT, &nonce).await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_removes_only_expired_rows() {
        let store = test_store(300).await;
        let now = chrono::Utc::now().timestamp();

        let live = store.issue(SUBJECT).await.unwrap();
        sqlx::query("INSERT INTO nonces (subject, nonce, issued_at, expires_at) VALUES (?, ?, ?, ?)")
            .bind(SUBJECT)
            .bind("stale")
            .bind(now - 600)
            .bind(now - 300)
            .execute(&store.pool)
            .await
            .unwrap();

        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert!(store.consume(SUBJECT, &live).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_consumption_has_single_winner() {
        let store = test_store(300).await;
        let nonce = store.issue(SUBJECT).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            let nonce = nonce.clone();
            handles.push(tokio::spawn(
                async move { store.consume(SUBJECT, &nonce).await },
            ));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
