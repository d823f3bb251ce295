use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

const TOKEN_LEN: usize = 48;

/// Server-side session row. The token is an opaque random bearer value; a
/// fresh one is minted on every login and registration.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

pub fn mint_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

impl Session {
    /// Establish a new session for a user.
    pub async fn establish(
        db: &PgPool,
        user_id: Uuid,
        ttl_minutes: i64,
    ) -> Result<Session, sqlx::Error> {
        let token = mint_token();
        let expires_at = OffsetDateTime::now_utc() + Duration::minutes(ttl_minutes);
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, token, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token, created_at, expires_at
            "#,
        )
        .bind(user_id)
        .bind(&token)
        .bind(expires_at)
        .fetch_one(db)
        .await?;
        debug!(%user_id, "session established");
        Ok(session)
    }

    /// Look up a live session by token. Expired rows are invisible.
    pub async fn find_valid(db: &PgPool, token: &str) -> Result<Option<Session>, sqlx::Error> {
        sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, token, created_at, expires_at
            FROM sessions
            WHERE token = $1 AND expires_at > now()
            "#,
        )
        .bind(token)
        .fetch_optional(db)
        .await
    }

    /// Destroy this session (logout).
    pub async fn destroy(&self, db: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(r#"DELETE FROM sessions WHERE id = $1"#)
            .bind(self.id)
            .execute(db)
            .await?;
        debug!(user_id = %self.user_id, "session destroyed");
        Ok(())
    }

    /// Rotate the session identifier. Old row out, fresh row in, in one
    /// transaction: at no point are two tokens live for this session.
    pub async fn rotate(self, db: &PgPool, ttl_minutes: i64) -> Result<Session, sqlx::Error> {
        let token = mint_token();
        let expires_at = OffsetDateTime::now_utc() + Duration::minutes(ttl_minutes);

        let mut tx = db.begin().await?;
        sqlx::query(r#"DELETE FROM sessions WHERE id = $1"#)
            .bind(self.id)
            .execute(&mut *tx)
            .await?;
        let fresh = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, token, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token, created_at, expires_at
            "#,
        )
        .bind(self.user_id)
        .bind(&token)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(user_id = %fresh.user_id, "session rotated");
        Ok(fresh)
    }
}

/// Extracts the live session from the `Authorization: Bearer` header. The
/// dashboard gate and every profile route hang off this.
pub struct CurrentSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let session = Session::find_valid(&state.db, token)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        Ok(CurrentSession(session))
    }
}
