use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;

use crate::db::models::User;
use crate::error::{AppError, AppResult, FieldError};
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/auth", get(current_user).post(login))
}

/// Exchange email + password for a signed credential.
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let mut errors = Vec::new();
    if req.email.trim().is_empty() {
        errors.push(FieldError::new("email", "Please provide a valid email"));
    }
    if req.password.is_empty() {
        errors.push(FieldError::new("password", "Password is required"));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let email = req.email.trim().to_lowercase();
    let conn = state.db.get()?;

    // A missing user and a wrong password report the same error
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT id, password_hash FROM users WHERE email = ?1",
            params![email],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .ok();

    let (user_id, password_hash) =
        row.ok_or_else(|| invalid_credentials())?;

    let matches = bcrypt::verify(&req.password, &password_hash)
        .map_err(|e| AppError::Internal(format!("bcrypt: {}", e)))?;
    if !matches {
        return Err(invalid_credentials());
    }

    let token = state
        .tokens
        .issue(&user_id)
        .map_err(|e| AppError::Internal(format!("token issue: {}", e)))?;

    Ok(Json(json!({ "token": token })))
}

/// Return the authenticated user's record, minus the password hash.
async fn current_user(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<User>> {
    let conn = state.db.get()?;
    let record = conn
        .query_row(
            "SELECT id, name, email, avatar, created_at FROM users WHERE id = ?1",
            params![user.id],
            |r| {
                Ok(User {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    email: r.get(2)?,
                    avatar: r.get(3)?,
                    created_at: r.get(4)?,
                })
            },
        )
        .map_err(|_| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(record))
}

fn invalid_credentials() -> AppError {
    AppError::Validation(vec![FieldError::bare("Invalid credentials")])
}
