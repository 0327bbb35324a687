use axum::extract::{Path, State};
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;

use crate::db::models::{Education, Experience, Profile, ProfileUser, Social};
use crate::error::{AppError, AppResult, FieldError};
use crate::extractors::CurrentUser;
use crate::github;
use crate::state::AppState;

// --- Request types ---

/// Skills arrive either as a ready-made array or as a comma-separated
/// string, depending on the client form.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum SkillsInput {
    List(Vec<String>),
    Csv(String),
}

#[derive(Deserialize)]
pub struct UpsertProfileRequest {
    #[serde(default)]
    pub status: String,
    pub skills: Option<SkillsInput>,
    pub company: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub githubusername: Option<String>,
    pub youtube: Option<String>,
    pub twitter: Option<String>,
    pub facebook: Option<String>,
    pub linkedin: Option<String>,
    pub instagram: Option<String>,
}

#[derive(Deserialize)]
pub struct ExperienceRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    pub location: Option<String>,
    #[serde(default)]
    pub from: String,
    pub to: Option<String>,
    #[serde(default)]
    pub current: bool,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct EducationRequest {
    #[serde(default)]
    pub school: String,
    #[serde(default)]
    pub degree: String,
    #[serde(default)]
    pub fieldofstudy: String,
    #[serde(default)]
    pub from: String,
    pub to: Option<String>,
    #[serde(default)]
    pub current: bool,
    pub description: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/profile",
            get(list_profiles).post(upsert_profile).delete(delete_account),
        )
        .route("/api/profile/me", get(own_profile))
        .route("/api/profile/user/{user_id}", get(profile_by_user))
        .route("/api/profile/experience", put(add_experience))
        .route("/api/profile/experience/{id}", delete(delete_experience))
        .route("/api/profile/education", put(add_education))
        .route("/api/profile/education/{id}", delete(delete_education))
        .route("/api/profile/github/{username}", get(github_repos))
}

// --- Handlers ---

async fn own_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Profile>> {
    let conn = state.db.get()?;
    Ok(Json(fetch_profile(&conn, &user.id)?))
}

async fn upsert_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<UpsertProfileRequest>,
) -> AppResult<Json<Profile>> {
    let mut errors = Vec::new();
    if req.status.trim().is_empty() {
        errors.push(FieldError::new("status", "Status is required"));
    }
    let skills = req.skills.as_ref().map(normalize_skills).unwrap_or_default();
    if skills.is_empty() {
        errors.push(FieldError::new("skills", "Skills is required"));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let conn = state.db.get()?;

    let user_exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE id = ?1",
        params![user.id],
        |r| r.get(0),
    )?;
    if !user_exists {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let skills_json = serde_json::to_string(&skills)?;
    let website = req.website.as_deref().and_then(normalize_url);
    let youtube = req.youtube.as_deref().and_then(normalize_url);
    let twitter = req.twitter.as_deref().and_then(normalize_url);
    let facebook = req.facebook.as_deref().and_then(normalize_url);
    let linkedin = req.linkedin.as_deref().and_then(normalize_url);
    let instagram = req.instagram.as_deref().and_then(normalize_url);

    // Create-or-replace keyed by the owner; at most one profile per user
    conn.execute(
        "INSERT INTO profiles (user_id, status, skills, company, website, location, bio, \
                               githubusername, youtube, twitter, facebook, linkedin, instagram) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13) \
         ON CONFLICT(user_id) DO UPDATE SET \
           status = excluded.status, \
           skills = excluded.skills, \
           company = excluded.company, \
           website = excluded.website, \
           location = excluded.location, \
           bio = excluded.bio, \
           githubusername = excluded.githubusername, \
           youtube = excluded.youtube, \
           twitter = excluded.twitter, \
           facebook = excluded.facebook, \
           linkedin = excluded.linkedin, \
           instagram = excluded.instagram",
        params![
            user.id,
            req.status.trim(),
            skills_json,
            trimmed(req.company),
            website,
            trimmed(req.location),
            trimmed(req.bio),
            trimmed(req.githubusername),
            youtube,
            twitter,
            facebook,
            linkedin,
            instagram,
        ],
    )?;

    Ok(Json(fetch_profile(&conn, &user.id)?))
}

async fn list_profiles(State(state): State<AppState>) -> AppResult<Json<Vec<Profile>>> {
    let conn = state.db.get()?;

    let user_ids: Vec<String> = {
        let mut stmt = conn
            .prepare("SELECT user_id FROM profiles ORDER BY created_at DESC, user_id DESC")?;
        let user_ids = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<_, _>>()?;
        user_ids
    };

    let mut profiles = Vec::with_capacity(user_ids.len());
    for user_id in user_ids {
        profiles.push(fetch_profile(&conn, &user_id)?);
    }
    Ok(Json(profiles))
}

async fn profile_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Profile>> {
    let conn = state.db.get()?;
    Ok(Json(fetch_profile(&conn, &user_id)?))
}

async fn add_experience(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<ExperienceRequest>,
) -> AppResult<Json<Profile>> {
    let mut errors = Vec::new();
    if req.title.trim().is_empty() {
        errors.push(FieldError::new("title", "Title is required"));
    }
    if req.company.trim().is_empty() {
        errors.push(FieldError::new("company", "Company is required"));
    }
    if req.from.trim().is_empty() {
        errors.push(FieldError::new("from", "Start date is required"));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let conn = state.db.get()?;
    ensure_profile_exists(&conn, &user.id)?;

    let entry_id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO experience (id, user_id, title, company, location, from_date, to_date, \
                                 current, description) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            entry_id,
            user.id,
            req.title.trim(),
            req.company.trim(),
            trimmed(req.location),
            req.from.trim(),
            trimmed(req.to),
            req.current,
            trimmed(req.description),
        ],
    )?;

    Ok(Json(fetch_profile(&conn, &user.id)?))
}

async fn delete_experience(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Profile>> {
    let conn = state.db.get()?;
    ensure_profile_exists(&conn, &user.id)?;

    // Identity-keyed removal; an unknown id is an error, never a
    // silent removal of some other entry
    let removed = conn.execute(
        "DELETE FROM experience WHERE id = ?1 AND user_id = ?2",
        params![id, user.id],
    )?;
    if removed == 0 {
        return Err(AppError::NotFound("Experience not found".to_string()));
    }

    Ok(Json(fetch_profile(&conn, &user.id)?))
}

async fn add_education(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<EducationRequest>,
) -> AppResult<Json<Profile>> {
    let mut errors = Vec::new();
    if req.school.trim().is_empty() {
        errors.push(FieldError::new("school", "School is required"));
    }
    if req.degree.trim().is_empty() {
        errors.push(FieldError::new("degree", "Degree is required"));
    }
    if req.fieldofstudy.trim().is_empty() {
        errors.push(FieldError::new("fieldofstudy", "Field of study is required"));
    }
    if req.from.trim().is_empty() {
        errors.push(FieldError::new("from", "Start date is required"));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let conn = state.db.get()?;
    ensure_profile_exists(&conn, &user.id)?;

    let entry_id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO education (id, user_id, school, degree, fieldofstudy, from_date, to_date, \
                                current, description) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            entry_id,
            user.id,
            req.school.trim(),
            req.degree.trim(),
            req.fieldofstudy.trim(),
            req.from.trim(),
            trimmed(req.to),
            req.current,
            trimmed(req.description),
        ],
    )?;

    Ok(Json(fetch_profile(&conn, &user.id)?))
}

async fn delete_education(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Profile>> {
    let conn = state.db.get()?;
    ensure_profile_exists(&conn, &user.id)?;

    let removed = conn.execute(
        "DELETE FROM education WHERE id = ?1 AND user_id = ?2",
        params![id, user.id],
    )?;
    if removed == 0 {
        return Err(AppError::NotFound("Education not found".to_string()));
    }

    Ok(Json(fetch_profile(&conn, &user.id)?))
}

/// Remove the user's posts, profile, and account. Irreversible; the
/// client is responsible for confirming first.
async fn delete_account(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let mut conn = state.db.get()?;

    let tx = conn.transaction()?;
    tx.execute("DELETE FROM posts WHERE user_id = ?1", params![user.id])?;
    tx.execute("DELETE FROM profiles WHERE user_id = ?1", params![user.id])?;
    tx.execute("DELETE FROM users WHERE id = ?1", params![user.id])?;
    tx.commit()?;

    Ok(Json(json!({ "msg": "User deleted" })))
}

async fn github_repos(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let repos =
        github::user_repos(&state.http, &state.config.github.api_base, &username).await?;
    Ok(Json(repos))
}

// --- Query helpers ---

fn ensure_profile_exists(conn: &rusqlite::Connection, user_id: &str) -> AppResult<()> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM profiles WHERE user_id = ?1",
        params![user_id],
        |r| r.get(0),
    )?;
    if !exists {
        return Err(AppError::NotFound(
            "There is no profile for this user".to_string(),
        ));
    }
    Ok(())
}

fn fetch_profile(conn: &rusqlite::Connection, user_id: &str) -> AppResult<Profile> {
    let row = conn
        .query_row(
            "SELECT p.user_id, u.name, u.avatar, p.status, p.skills, p.company, p.website, \
                    p.location, p.bio, p.githubusername, p.youtube, p.twitter, p.facebook, \
                    p.linkedin, p.instagram, p.created_at \
             FROM profiles p JOIN users u ON u.id = p.user_id \
             WHERE p.user_id = ?1",
            params![user_id],
            |r| {
                Ok((
                    ProfileUser {
                        id: r.get(0)?,
                        name: r.get(1)?,
                        avatar: r.get(2)?,
                    },
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, Option<String>>(5)?,
                    r.get::<_, Option<String>>(6)?,
                    r.get::<_, Option<String>>(7)?,
                    r.get::<_, Option<String>>(8)?,
                    r.get::<_, Option<String>>(9)?,
                    Social {
                        youtube: r.get(10)?,
                        twitter: r.get(11)?,
                        facebook: r.get(12)?,
                        linkedin: r.get(13)?,
                        instagram: r.get(14)?,
                    },
                    r.get::<_, String>(15)?,
                ))
            },
        )
        .map_err(|_| AppError::NotFound("There is no profile for this user".to_string()))?;

    let (user, status, skills_json, company, website, location, bio, githubusername, social, created_at) =
        row;

    let skills: Vec<String> = serde_json::from_str(&skills_json)?;

    Ok(Profile {
        user,
        status,
        skills,
        company,
        website,
        location,
        bio,
        githubusername,
        social,
        experience: fetch_experience(conn, user_id)?,
        education: fetch_education(conn, user_id)?,
        created_at,
    })
}

/// Experience entries, newest first (v7 ids sort by creation time).
fn fetch_experience(
    conn: &rusqlite::Connection,
    user_id: &str,
) -> Result<Vec<Experience>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, company, location, from_date, to_date, current, description \
         FROM experience WHERE user_id = ?1 ORDER BY id DESC",
    )?;
    let entries = stmt
        .query_map(params![user_id], |r| {
            Ok(Experience {
                id: r.get(0)?,
                title: r.get(1)?,
                company: r.get(2)?,
                location: r.get(3)?,
                from: r.get(4)?,
                to: r.get(5)?,
                current: r.get(6)?,
                description: r.get(7)?,
            })
        })?
        .collect::<Result<_, _>>()?;
    Ok(entries)
}

fn fetch_education(
    conn: &rusqlite::Connection,
    user_id: &str,
) -> Result<Vec<Education>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, school, degree, fieldofstudy, from_date, to_date, current, description \
         FROM education WHERE user_id = ?1 ORDER BY id DESC",
    )?;
    let entries = stmt
        .query_map(params![user_id], |r| {
            Ok(Education {
                id: r.get(0)?,
                school: r.get(1)?,
                degree: r.get(2)?,
                fieldofstudy: r.get(3)?,
                from: r.get(4)?,
                to: r.get(5)?,
                current: r.get(6)?,
                description: r.get(7)?,
            })
        })?
        .collect::<Result<_, _>>()?;
    Ok(entries)
}

// --- Normalization ---

/// Canonical https form of a user-entered URL: prepend a scheme when
/// missing, upgrade http, strip a bare trailing slash. Unparseable
/// input is kept as typed.
fn normalize_url(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let mut parsed = match url::Url::parse(&candidate) {
        Ok(u) => u,
        Err(_) => return Some(trimmed.to_string()),
    };
    if parsed.scheme() == "http" && parsed.set_scheme("https").is_err() {
        return Some(candidate);
    }

    let mut out = parsed.to_string();
    if parsed.path() == "/" && parsed.query().is_none() && parsed.fragment().is_none() {
        out.pop();
    }
    Some(out)
}

fn normalize_skills(input: &SkillsInput) -> Vec<String> {
    let raw: Vec<String> = match input {
        SkillsInput::List(list) => list.clone(),
        SkillsInput::Csv(csv) => csv.split(',').map(String::from).collect(),
    };
    raw.iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
