use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use planner_core::models::{CreateUserInput, User};

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct SignupInput {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(input): Json<SignupInput>,
) -> Result<Json<AuthResponse>, ApiError> {
    if input.email.trim().is_empty() || input.password.is_empty() || input.name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "email, password and name are required".to_string(),
        ));
    }

    if state.db.find_user_by_email(input.email.trim())?.is_some() {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let salt = Uuid::new_v4().simple().to_string();
    let hash = hash_password(&salt, &input.password);
    let user = state.db.create_user(CreateUserInput {
        email: input.email.trim().to_string(),
        name: input.name.trim().to_string(),
        password_salt: salt,
        password_hash: hash,
    })?;

    let token = state.db.create_token(user.id)?;
    tracing::info!(user_id = %user.id, "user signed up");

    Ok(Json(AuthResponse { token, user }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<Json<AuthResponse>, ApiError> {
    let record = state
        .db
        .find_user_by_email(input.email.trim())?
        .ok_or(ApiError::Unauthorized)?;

    // Non-disclosing: a wrong password and an unknown email look identical.
    if hash_password(&record.password_salt, &input.password) != record.password_hash {
        return Err(ApiError::Unauthorized);
    }

    let token = state.db.create_token(record.user.id)?;

    Ok(Json(AuthResponse {
        token,
        user: record.user,
    }))
}

pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_depends_on_salt_and_password() {
        let a = hash_password("salt-a", "secret");
        let b = hash_password("salt-b", "secret");
        let c = hash_password("salt-a", "other");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, hash_password("salt-a", "secret"));
    }
}
