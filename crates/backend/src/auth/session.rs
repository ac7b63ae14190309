use axum::http::{header, HeaderMap};

use super::jwt;
use crate::db::{self, DbPool};
use crate::error::{ApiError, ApiResult};
use crate::sync::SessionActor;

/// Auth configuration loaded from environment
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_duration_days: i64,
    pub cookie_name: String,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_duration_days: 7,
            cookie_name: "auth_token".to_string(),
        }
    }
}

/// Resolve the staff member acting in this request.
///
/// No token means an anonymous session. A token that fails validation, or
/// names a staff member that no longer exists, is rejected.
pub async fn extract_session_actor(
    headers: &HeaderMap,
    config: &AuthConfig,
    pool: &DbPool,
) -> ApiResult<SessionActor> {
    let token = match extract_token_from_cookie(headers, &config.cookie_name)
        .or_else(|| extract_token_from_header(headers))
    {
        Some(t) => t,
        None => return Ok(SessionActor::anonymous()),
    };

    let claims = jwt::validate_token(config, &token)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

    let staff_id = claims
        .staff_id()
        .ok_or_else(|| ApiError::Unauthorized("Token subject is not a staff id".to_string()))?;

    let mut conn = pool.get().await?;
    let staff = db::staff::find_by_id(&mut conn, staff_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown staff member".to_string()))?;

    tracing::trace!(staff_id = %staff.id, "session actor resolved");
    Ok(SessionActor::new(Some(staff)))
}

fn extract_token_from_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;

    for cookie_str in cookie_header.split(';') {
        if let Ok(cookie) = cookie::Cookie::parse(cookie_str.trim()) {
            if cookie.name() == cookie_name {
                return Some(cookie.value().to_string());
            }
        }
    }

    None
}

fn extract_token_from_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|s| s.to_string())
}
