use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database. The three photo fields are either null or
/// hold the filename of an object currently in storage; the photo lifecycle
/// keeps them in sync and they are always updated together.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub photo: Option<String>,
    pub thumbnail: Option<String>,
    pub square: Option<String>,
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    /// A user row detached from any database, for lifecycle tests.
    pub fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Ana".into(),
            email: "ana@example.com".into(),
            password_hash: "$argon2id$fake".into(),
            photo: None,
            thumbnail: None,
            square: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}
