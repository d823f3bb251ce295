use sqlx::PgPool;
use uuid::Uuid;

use crate::photos::names::PhotoNames;
use crate::users::repo_types::User;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, photo, thumbnail, square, created_at";

impl User {
    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
        photos: Option<&PhotoNames>,
    ) -> Result<User, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, photo, thumbnail, square)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#,
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(photos.map(|p| p.photo.as_str()))
        .bind(photos.map(|p| p.thumbnail.as_str()))
        .bind(photos.map(|p| p.square.as_str()))
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM users WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM users WHERE email = $1"#
        ))
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn list(db: &PgPool) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"#
        ))
        .fetch_all(db)
        .await
    }

    pub async fn email_taken_by_other(
        db: &PgPool,
        email: &str,
        exclude: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let row: Option<(Uuid,)> =
            sqlx::query_as(r#"SELECT id FROM users WHERE email = $1 AND id <> $2"#)
                .bind(email)
                .bind(exclude)
                .fetch_optional(db)
                .await?;
        Ok(row.is_some())
    }

    /// Persist the whole record in one statement. All mutable columns,
    /// including the three photo fields, are written together so the row can
    /// never end up half-updated.
    pub async fn save(&self, db: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
               SET name = $2,
                   email = $3,
                   password_hash = $4,
                   photo = $5,
                   thumbnail = $6,
                   square = $7
             WHERE id = $1
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.email)
        .bind(&self.password_hash)
        .bind(&self.photo)
        .bind(&self.thumbnail)
        .bind(&self.square)
        .execute(db)
        .await?;
        Ok(())
    }
}

/// Postgres unique violations carry SQLSTATE 23505; the only unique
/// constraint in play is the one on users.email.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}
