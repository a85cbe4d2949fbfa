use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A user row with its credential material. Never serialized; the salt and
/// hash stay inside the auth layer.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: User,
    pub password_salt: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub email: String,
    pub name: String,
    pub password_salt: String,
    pub password_hash: String,
}
