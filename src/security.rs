use crate::models::ApiError;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{self, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::HashMap, convert::Infallible, env, sync::Arc};
use tracing::{info, warn};

#[derive(Clone)]
pub struct AuthState {
    records: Arc<HashMap<String, UserRecord>>,
}

/// Identity attached to the request once the presented key checks out.
/// Jobs and catalogs are scoped to `user_id`.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub user_id: String,
    pub api_key_id: String,
}

#[derive(Clone)]
struct UserRecord {
    user_id: String,
    api_key_id: String,
}

impl AuthState {
    pub fn from_env() -> Self {
        Self {
            records: Arc::new(load_keys_from_env()),
        }
    }

    #[cfg(test)]
    fn with_key(user_id: &str, key: &str) -> Self {
        let mut records = HashMap::new();
        records.insert(
            key.to_string(),
            UserRecord {
                user_id: user_id.to_string(),
                api_key_id: "key-01".to_string(),
            },
        );
        Self {
            records: Arc::new(records),
        }
    }

    fn authenticate(&self, presented: &str) -> Option<AuthContext> {
        self.records.get(presented).map(|record| AuthContext {
            user_id: record.user_id.clone(),
            api_key_id: record.api_key_id.clone(),
        })
    }
}

pub async fn require_api_auth(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Infallible> {
    let Some(presented) = extract_api_key(request.headers()) else {
        return Ok(unauthorized_response(
            "missing_api_key",
            "Provide X-Catforge-Key or Bearer token",
        ));
    };

    let Some(context) = state.authenticate(&presented) else {
        return Ok(unauthorized_response(
            "invalid_api_key",
            "Key not recognized",
        ));
    };

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

fn extract_api_key(headers: &http::HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(http::header::AUTHORIZATION)
        && let Ok(raw) = value.to_str()
        && raw.len() >= 7
        && raw[..6].eq_ignore_ascii_case("bearer")
    {
        return Some(raw[6..].trim().to_string());
    }
    headers
        .get("X-Catforge-Key")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn unauthorized_response(code: &str, message: &str) -> Response {
    let payload = ApiError {
        error: code.to_string(),
        detail: Some(message.to_string()),
    };
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}

fn load_keys_from_env() -> HashMap<String, UserRecord> {
    let raw = env::var("CATFORGE_API_KEYS").unwrap_or_else(|_| "demo-user:demo-key".to_string());
    let mut entries = HashMap::new();
    for (idx, token) in raw.split(',').enumerate() {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut parts = trimmed.splitn(2, ':');
        let user_id = parts.next().map(str::trim).filter(|s| !s.is_empty());
        let key = parts.next().map(str::trim).filter(|s| !s.is_empty());
        match (user_id, key) {
            (Some(user), Some(secret)) => {
                let record = UserRecord {
                    user_id: user.to_string(),
                    api_key_id: format!("key-{:02}", idx + 1),
                };
                entries.insert(secret.to_string(), record);
            }
            _ => warn!(
                target = "catforge.api",
                "ignored malformed CATFORGE_API_KEYS entry: {trimmed}"
            ),
        }
    }

    if entries.is_empty() {
        warn!(
            target = "catforge.api",
            "CATFORGE_API_KEYS produced no keys; falling back to demo credentials"
        );
        entries.insert(
            "demo-key".to_string(),
            UserRecord {
                user_id: "demo-user".to_string(),
                api_key_id: "key-01".to_string(),
            },
        );
    } else {
        info!(
            target = "catforge.api",
            key_count = entries.len(),
            "loaded API keys from env"
        );
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn bearer_token_and_header_key_are_both_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer secret-1"),
        );
        assert_eq!(extract_api_key(&headers).as_deref(), Some("secret-1"));

        let mut headers = HeaderMap::new();
        headers.insert("X-Catforge-Key", HeaderValue::from_static("secret-2"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("secret-2"));

        assert!(extract_api_key(&HeaderMap::new()).is_none());
    }

    #[test]
    fn authenticate_maps_key_to_user() {
        let state = AuthState::with_key("user-1", "sekrit");
        let context = state.authenticate("sekrit").unwrap();
        assert_eq!(context.user_id, "user-1");
        assert!(state.authenticate("wrong").is_none());
    }
}
