use crate::error::AppError;

const USER_AGENT: &str = "devlink";

/// Fetch a user's five most recent public repositories.
///
/// The single outbound call in the system: blocking from the caller's
/// point of view, no retry. A reachable API that answers anything but
/// 200 (unknown user, rate limit) reads as "no github profile".
pub async fn user_repos(
    http: &reqwest::Client,
    api_base: &str,
    username: &str,
) -> Result<serde_json::Value, AppError> {
    let url = format!(
        "{}/users/{}/repos?per_page=5&sort=created:asc",
        api_base.trim_end_matches('/'),
        username
    );

    let response = http
        .get(&url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await
        .map_err(|e| AppError::Upstream(format!("github request failed: {}", e)))?;

    if response.status() != reqwest::StatusCode::OK {
        return Err(AppError::NotFound("No github profile".to_string()));
    }

    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| AppError::Upstream(format!("github response unreadable: {}", e)))
}
