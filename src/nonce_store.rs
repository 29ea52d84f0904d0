use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, error, info};
use ulid::Ulid;

use crate::api::NonceRequest;
use crate::error::VerificationError;
use crate::signer::compute_hash;

/// What a signed request presents for verification
#[derive(Debug, Clone, Copy)]
pub struct SignedCheck<'a> {
    pub method: &'a str,
    pub action: &'a str,
    pub client_nonce: &'a str,
    pub hash: &'a str,
    /// Raw request body, empty when there is none
    pub payload: &'a str,
}

/// SQLite-backed ledger of issued server nonces and spent client nonces
#[derive(Debug, Clone)]
pub struct NonceStore {
    pool: Arc<SqlitePool>,
}

impl NonceStore {
    pub async fn new(db_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePool::connect(db_url).await?;
        Self::with_pool(pool).await
    }

    /// Store that lives as long as the process; every handle shares one connection
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS server_nonces (
                nonce TEXT PRIMARY KEY,
                subject TEXT NOT NULL,
                method TEXT NOT NULL,
                action TEXT NOT NULL,
                data TEXT NOT NULL,
                issued_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                consumed BOOLEAN NOT NULL DEFAULT FALSE
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS used_client_nonces (
                nonce TEXT PRIMARY KEY,
                used_at INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn generate_nonce() -> String {
        Ulid::new().to_string()
    }

    /// Issue a server nonce bound to `subject` and the requested action
    pub async fn issue(
        &self,
        subject: &str,
        request: &NonceRequest,
        ttl_secs: i64,
    ) -> Result<String, sqlx::Error> {
        let nonce = Self::generate_nonce();
        let now = Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO server_nonces (nonce, subject, method, action, data, issued_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&nonce)
        .bind(subject)
        .bind(request.method.to_uppercase())
        .bind(&request.action)
        .bind(&request.data)
        .bind(now)
        .bind(now + ttl_secs)
        .execute(&*self.pool)
        .await?;

        debug!(
            "Issued nonce {} for {} {}",
            nonce, request.method, request.action
        );
        Ok(nonce)
    }

    /// Check a signed request and spend its nonces.
    ///
    /// The client nonce is recorded before anything else, so it can never be
    /// presented twice. Only the server nonce the request was actually signed
    /// with is consumed; other live nonces for the same action stay usable.
    pub async fn verify_signed(
        &self,
        subject: &str,
        check: &SignedCheck<'_>,
    ) -> Result<(), VerificationError> {
        let now = Utc::now().timestamp();

        let inserted = sqlx::query("INSERT OR IGNORE INTO used_client_nonces (nonce, used_at) VALUES (?, ?)")
            .bind(check.client_nonce)
            .bind(now)
            .execute(&*self.pool)
            .await
            .map_err(|e| {
                error!("Database error when storing client nonce: {}", e);
                VerificationError::Database(e)
            })?;
        if inserted.rows_affected() == 0 {
            return Err(VerificationError::NonceAlreadyUsed);
        }

        let candidates = sqlx::query(
            "SELECT nonce, data FROM server_nonces
             WHERE subject = ? AND method = ? AND action = ?
               AND consumed = FALSE AND expires_at > ?
             ORDER BY issued_at DESC, rowid DESC",
        )
        .bind(subject)
        .bind(check.method.to_uppercase())
        .bind(check.action)
        .bind(now)
        .fetch_all(&*self.pool)
        .await?;

        if candidates.is_empty() {
            return Err(VerificationError::InvalidNonce);
        }

        let server_nonce = candidates.iter().find_map(|row| {
            let nonce: String = row.get(0);
            let data: String = row.get(1);
            let expected = compute_hash(&nonce, check.client_nonce, check.payload);
            (data == check.payload && hashes_match(&expected, check.hash)).then_some(nonce)
        });
        let Some(server_nonce) = server_nonce else {
            return Err(VerificationError::InvalidHash);
        };

        let consumed = sqlx::query(
            "UPDATE server_nonces SET consumed = TRUE WHERE nonce = ? AND consumed = FALSE",
        )
        .bind(&server_nonce)
        .execute(&*self.pool)
        .await?;
        if consumed.rows_affected() == 0 {
            // Spent by a concurrent request
            return Err(VerificationError::InvalidNonce);
        }

        info!("Verified signed request for {}", check.action);
        Ok(())
    }

    /// Drop expired server nonces and client nonces older than `retain_secs`
    pub async fn cleanup_expired(&self, retain_secs: i64) -> Result<u64, sqlx::Error> {
        let now = Utc::now().timestamp();

        let servers = sqlx::query("DELETE FROM server_nonces WHERE expires_at <= ? OR consumed = TRUE")
            .bind(now)
            .execute(&*self.pool)
            .await?;
        let clients = sqlx::query("DELETE FROM used_client_nonces WHERE used_at < ?")
            .bind(now - retain_secs)
            .execute(&*self.pool)
            .await?;

        let rows_affected = servers.rows_affected() + clients.rows_affected();
        info!("Cleaned up {} old nonces", rows_affected);

        Ok(rows_affected)
    }
}

/// Constant-time comparison of two hex digests
fn hashes_match(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}
