//! Revoked access tokens.
//!
//! Tokens are JWTs and verify on their own, so revocation is a deny list checked after
//! the signature: single tokens by `jti` (logout, RFC 7009 revocation) and every token
//! of a user issued at or before a cutoff (session invalidation). Expired entries are
//! pruned whenever a token is revoked.

use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::auth::token::Claims;
use crate::error::AppError;

/// In-process revocation state behind [`RevocationStore::Memory`].
#[derive(Debug, Default)]
pub struct MemoryRevocations {
    tokens: HashMap<String, i64>,
    cutoffs: HashMap<i32, i64>,
}

/// Where revocations are recorded. `Database` is shared by every process using the
/// same Postgres; `Memory` lives and dies with this process.
#[derive(Debug, Clone)]
pub enum RevocationStore {
    Database(PgPool),
    Memory(Arc<RwLock<MemoryRevocations>>),
}

fn poisoned<T>(_: T) -> AppError {
    AppError::InternalServerError("Revocation store lock poisoned".into())
}

impl RevocationStore {
    pub fn database(pool: PgPool) -> Self {
        RevocationStore::Database(pool)
    }

    pub fn memory() -> Self {
        RevocationStore::Memory(Arc::default())
    }

    /// Revokes the single token described by `claims`.
    pub async fn revoke(&self, claims: &Claims) -> Result<(), AppError> {
        let now = Utc::now().timestamp();
        match self {
            RevocationStore::Database(pool) => {
                sqlx::query(
                    "INSERT INTO revoked_tokens (jti, user_id, expires_at) VALUES ($1, $2, $3) \
                     ON CONFLICT (jti) DO NOTHING",
                )
                .bind(&claims.jti)
                .bind(claims.sub)
                .bind(claims.exp as i64)
                .execute(pool)
                .await?;
                sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < $1")
                    .bind(now)
                    .execute(pool)
                    .await?;
            }
            RevocationStore::Memory(state) => {
                let mut state = state.write().map_err(poisoned)?;
                state.tokens.retain(|_, expires_at| *expires_at >= now);
                state.tokens.insert(claims.jti.clone(), claims.exp as i64);
            }
        }
        log::info!("revoked token {} for user {}", claims.jti, claims.sub);
        Ok(())
    }

    /// Revokes every token of `user_id` issued at or before `cutoff` (unix seconds).
    pub async fn revoke_all(&self, user_id: i32, cutoff: i64) -> Result<(), AppError> {
        match self {
            RevocationStore::Database(pool) => {
                sqlx::query(
                    "INSERT INTO session_cutoffs (user_id, revoked_before) VALUES ($1, $2) \
                     ON CONFLICT (user_id) DO UPDATE SET revoked_before = \
                     GREATEST(session_cutoffs.revoked_before, EXCLUDED.revoked_before)",
                )
                .bind(user_id)
                .bind(cutoff)
                .execute(pool)
                .await?;
            }
            RevocationStore::Memory(state) => {
                let mut state = state.write().map_err(poisoned)?;
                let entry = state.cutoffs.entry(user_id).or_insert(cutoff);
                *entry = (*entry).max(cutoff);
            }
        }
        log::info!("invalidated tokens of user {} issued up to {}", user_id, cutoff);
        Ok(())
    }

    /// Passes `claims` through unless their token has been revoked.
    pub async fn ensure_active(&self, claims: Claims) -> Result<Claims, AppError> {
        if self.is_revoked(&claims).await? {
            Err(AppError::Unauthorized("Token has been revoked".into()))
        } else {
            Ok(claims)
        }
    }

    pub async fn is_revoked(&self, claims: &Claims) -> Result<bool, AppError> {
        let issued_at = claims.iat as i64;
        match self {
            RevocationStore::Database(pool) => {
                let (revoked,): (bool,) = sqlx::query_as(
                    "SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE jti = $1) \
                     OR EXISTS(SELECT 1 FROM session_cutoffs \
                               WHERE user_id = $2 AND revoked_before >= $3)",
                )
                .bind(&claims.jti)
                .bind(claims.sub)
                .bind(issued_at)
                .fetch_one(pool)
                .await?;
                Ok(revoked)
            }
            RevocationStore::Memory(state) => {
                let state = state.read().map_err(poisoned)?;
                Ok(state.tokens.contains_key(&claims.jti)
                    || state
                        .cutoffs
                        .get(&claims.sub)
                        .map_or(false, |cutoff| *cutoff >= issued_at))
            }
        }
    }
}
