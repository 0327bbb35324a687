use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::error::{AppError, AppResult, FieldError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/users", post(register))
}

/// Register a new user and issue a credential.
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let mut errors = Vec::new();
    if req.name.trim().is_empty() {
        errors.push(FieldError::new("name", "Name is required"));
    }
    if !is_valid_email(&req.email) {
        errors.push(FieldError::new("email", "Please provide a valid email"));
    }
    if req.password.len() < 6 {
        errors.push(FieldError::new(
            "password",
            "Please enter a password of minimum 6 characters",
        ));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let email = req.email.trim().to_lowercase();
    let conn = state.db.get()?;

    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;
    if exists {
        return Err(AppError::Validation(vec![FieldError::bare(
            "User already exists",
        )]));
    }

    let avatar = gravatar_url(&email);
    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("bcrypt: {}", e)))?;

    let user_id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO users (id, name, email, password_hash, avatar) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, req.name.trim(), email, password_hash, avatar],
    )?;

    let token = state
        .tokens
        .issue(&user_id)
        .map_err(|e| AppError::Internal(format!("token issue: {}", e)))?;

    Ok(Json(json!({ "token": token })))
}

fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}

/// Gravatar URL for an email: sha256 of the trimmed, lowercased address,
/// sized 200, pg-rated, with the "mystery man" default.
fn gravatar_url(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    format!(
        "https://www.gravatar.com/avatar/{}?s=200&r=pg&d=mm",
        hex::encode(digest)
    )
}
