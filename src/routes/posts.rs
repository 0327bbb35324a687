use axum::extract::{Path, State};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;

use crate::db::models::{Comment, Like, Post};
use crate::error::{AppError, AppResult, FieldError};
use crate::extractors::CurrentUser;
use crate::state::AppState;

// --- Request types ---

#[derive(Deserialize)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub text: String,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/{id}", get(get_post).delete(delete_post))
        .route("/api/posts/like/{id}", put(like_post))
        .route("/api/posts/unlike/{id}", put(unlike_post))
        .route("/api/posts/comment/{id}", post(add_comment))
        .route(
            "/api/posts/comment/{id}/{comment_id}",
            delete(delete_comment),
        )
}

// --- Handlers ---

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<Json<Post>> {
    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::Validation(vec![FieldError::new(
            "text",
            "Text is required",
        )]));
    }

    let conn = state.db.get()?;

    // Author name and avatar are captured at creation time and not kept
    // in sync with later edits
    let (name, avatar): (String, String) = conn
        .query_row(
            "SELECT name, avatar FROM users WHERE id = ?1",
            params![user.id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .map_err(|_| AppError::NotFound("User not found".to_string()))?;

    let post_id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO posts (id, user_id, text, name, avatar) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![post_id, user.id, text, name, avatar],
    )?;

    let created = fetch_post(&conn, &post_id)?;
    Ok(Json(created))
}

async fn list_posts(State(state): State<AppState>) -> AppResult<Json<Vec<Post>>> {
    let conn = state.db.get()?;

    let ids: Vec<String> = {
        let mut stmt =
            conn.prepare("SELECT id FROM posts ORDER BY created_at DESC, id DESC")?;
        let ids = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<_, _>>()?;
        ids
    };

    let mut posts = Vec::with_capacity(ids.len());
    for id in ids {
        posts.push(fetch_post(&conn, &id)?);
    }
    Ok(Json(posts))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Post>> {
    let conn = state.db.get()?;
    Ok(Json(fetch_post(&conn, &id)?))
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;

    let owner_id: String = conn
        .query_row("SELECT user_id FROM posts WHERE id = ?1", params![id], |r| {
            r.get(0)
        })
        .map_err(|_| AppError::NotFound("Post not found".to_string()))?;

    if owner_id != user.id {
        return Err(AppError::Forbidden("User not authorized".to_string()));
    }

    conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    Ok(Json(json!({ "msg": "Post removed" })))
}

async fn like_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Like>>> {
    let conn = state.db.get()?;
    ensure_post_exists(&conn, &id)?;

    let already_liked: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM likes WHERE post_id = ?1 AND user_id = ?2",
        params![id, user.id],
        |r| r.get(0),
    )?;
    if already_liked {
        return Err(AppError::Conflict("Post already liked".to_string()));
    }

    let like_id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO likes (id, post_id, user_id) VALUES (?1, ?2, ?3)",
        params![like_id, id, user.id],
    )?;

    Ok(Json(fetch_likes(&conn, &id)?))
}

async fn unlike_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Like>>> {
    let conn = state.db.get()?;
    ensure_post_exists(&conn, &id)?;

    let removed = conn.execute(
        "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
        params![id, user.id],
    )?;
    if removed == 0 {
        return Err(AppError::Conflict(
            "Post has not yet been liked".to_string(),
        ));
    }

    Ok(Json(fetch_likes(&conn, &id)?))
}

async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<Json<Vec<Comment>>> {
    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::Validation(vec![FieldError::new(
            "text",
            "Text is required",
        )]));
    }

    let conn = state.db.get()?;
    ensure_post_exists(&conn, &id)?;

    let (name, avatar): (String, String) = conn
        .query_row(
            "SELECT name, avatar FROM users WHERE id = ?1",
            params![user.id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .map_err(|_| AppError::NotFound("User not found".to_string()))?;

    let comment_id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO comments (id, post_id, user_id, text, name, avatar) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![comment_id, id, user.id, text, name, avatar],
    )?;

    Ok(Json(fetch_comments(&conn, &id)?))
}

async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, comment_id)): Path<(String, String)>,
) -> AppResult<Json<Vec<Comment>>> {
    let conn = state.db.get()?;
    ensure_post_exists(&conn, &id)?;

    let author_id: String = conn
        .query_row(
            "SELECT user_id FROM comments WHERE id = ?1 AND post_id = ?2",
            params![comment_id, id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound("Comment not found".to_string()))?;

    if author_id != user.id {
        return Err(AppError::Forbidden("User not authorized".to_string()));
    }

    // Removal is keyed by the comment id, not by a rescan of the
    // requester's id across the sequence
    conn.execute("DELETE FROM comments WHERE id = ?1", params![comment_id])?;

    Ok(Json(fetch_comments(&conn, &id)?))
}

// --- Query helpers ---

fn ensure_post_exists(conn: &rusqlite::Connection, id: &str) -> AppResult<()> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
        params![id],
        |r| r.get(0),
    )?;
    if !exists {
        return Err(AppError::NotFound("Post not found".to_string()));
    }
    Ok(())
}

fn fetch_post(conn: &rusqlite::Connection, id: &str) -> AppResult<Post> {
    let (post_id, user_id, text, name, avatar, created_at) = conn
        .query_row(
            "SELECT id, user_id, text, name, avatar, created_at FROM posts WHERE id = ?1",
            params![id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, String>(5)?,
                ))
            },
        )
        .map_err(|_| AppError::NotFound("Post not found".to_string()))?;

    Ok(Post {
        id: post_id,
        user: user_id,
        text,
        name,
        avatar,
        likes: fetch_likes(conn, id)?,
        comments: fetch_comments(conn, id)?,
        created_at,
    })
}

/// Likes for a post, newest first (v7 ids sort by creation time).
fn fetch_likes(conn: &rusqlite::Connection, post_id: &str) -> Result<Vec<Like>, AppError> {
    let mut stmt =
        conn.prepare("SELECT user_id FROM likes WHERE post_id = ?1 ORDER BY id DESC")?;
    let likes = stmt
        .query_map(params![post_id], |r| Ok(Like { user: r.get(0)? }))?
        .collect::<Result<_, _>>()?;
    Ok(likes)
}

fn fetch_comments(conn: &rusqlite::Connection, post_id: &str) -> Result<Vec<Comment>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, text, name, avatar, created_at \
         FROM comments WHERE post_id = ?1 ORDER BY id DESC",
    )?;
    let comments = stmt
        .query_map(params![post_id], |r| {
            Ok(Comment {
                id: r.get(0)?,
                user: r.get(1)?,
                text: r.get(2)?,
                name: r.get(3)?,
                avatar: r.get(4)?,
                created_at: r.get(5)?,
            })
        })?
        .collect::<Result<_, _>>()?;
    Ok(comments)
}
