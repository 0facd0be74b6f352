//! Session token verification against the sessions table.
//!
//! Bearer tokens are never stored in the clear: the table keys on the
//! SHA-256 hex digest of the token, so a leaked database does not leak
//! usable credentials. Session issuance (login) is owned by the
//! surrounding ERP; this service only verifies.

use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::Row;

use countersign_core::external::identity::IdentityProvider;
use countersign_types::error::AuthError;
use countersign_types::identity::Caller;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `IdentityProvider`.
pub struct SqliteIdentityProvider {
    pool: DatabasePool,
}

impl SqliteIdentityProvider {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Lowercase hex SHA-256 of a bearer token.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

impl IdentityProvider for SqliteIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Caller, AuthError> {
        let token_hash = hash_token(token);

        let row = sqlx::query(
            "SELECT company_id, employee_id, expires_at FROM sessions WHERE token_hash = ?",
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| AuthError::StorageError(e.to_string()))?;

        let Some(row) = row else {
            return Err(AuthError::InvalidToken);
        };

        let expires_at: Option<String> = row
            .try_get("expires_at")
            .map_err(|e| AuthError::StorageError(e.to_string()))?;
        if let Some(expires_at) = expires_at {
            let expires_at = parse_datetime(&expires_at)
                .map_err(|e| AuthError::StorageError(e.to_string()))?;
            if Utc::now() > expires_at {
                return Err(AuthError::SessionExpired);
            }
        }

        let company_id: String = row
            .try_get("company_id")
            .map_err(|e| AuthError::StorageError(e.to_string()))?;
        let employee_id: String = row
            .try_get("employee_id")
            .map_err(|e| AuthError::StorageError(e.to_string()))?;

        let caller = Caller {
            company_id: company_id
                .parse()
                .map_err(|_| AuthError::InvalidToken)?,
            employee_id: employee_id
                .parse()
                .map_err(|_| AuthError::InvalidToken)?,
        };

        // Best-effort usage bookkeeping; a failure here never blocks auth.
        let _ = sqlx::query("UPDATE sessions SET last_used_at = ? WHERE token_hash = ?")
            .bind(format_datetime(&Utc::now()))
            .bind(&token_hash)
            .execute(&self.pool.writer)
            .await;

        Ok(caller)
    }
}
