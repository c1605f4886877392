//! HTTP handlers
//!
//! Admin routes authenticate with `Authorization: Bearer <key>`. A key
//! that ran past its expiry is refreshed on the spot and the new one is
//! returned in the 401 body. A deactivated key is simply invalid.

use super::MonitorState;
use crate::admin::KeyStatus;
use crate::error::BotError;
use crate::utils::{format_duration, mask_chat_id};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

const UP: &str = "UP";
const DOWN: &str = "DOWN";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub server: String,
    pub store: String,
    pub bus: String,
    pub uptime: String,
}

/// User as exposed to admins
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedUser {
    pub id: String,
    pub telegram_id: String,
    pub has_started: bool,
    pub current_crypto: String,
    pub current_fiat: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    username: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn internal(e: BotError) -> Response {
    tracing::error!("❌ Admin API failure: {}", e);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|key| !key.is_empty())
}

/// Resolve the caller. `Err` is the response to return.
async fn authenticate(state: &MonitorState, headers: &HeaderMap) -> Result<String, Response> {
    let Some(key) = bearer(headers) else {
        return Err(error_response(StatusCode::UNAUTHORIZED, "missing API key"));
    };

    match state.admin.validate(key).await.map_err(internal)? {
        KeyStatus::Valid(admin) => Ok(admin.username),
        KeyStatus::Invalid => {
            tracing::warn!("🔒 Rejected invalid API key");
            Err(error_response(StatusCode::UNAUTHORIZED, "invalid API key"))
        }
        KeyStatus::Expired(admin) => {
            let issued = state.admin.refresh(&admin.username).await.map_err(internal)?;
            tracing::info!("🔑 Expired key of {} replaced", admin.username);
            Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "API key expired",
                    "username": issued.username,
                    "newKey": issued.key,
                    "expiresAt": issued.expires_at,
                })),
            )
                .into_response())
        }
    }
}

async fn healthcheck(State(state): State<Arc<MonitorState>>) -> (StatusCode, Json<HealthReport>) {
    let store = match state.db.ping().await {
        Ok(()) => UP,
        Err(e) => {
            tracing::warn!("⚠️ Store health check failed: {}", e);
            DOWN
        }
    };
    let bus = match state.bus.ping().await {
        Ok(()) => UP,
        Err(e) => {
            tracing::warn!("⚠️ Bus health check failed: {}", e);
            DOWN
        }
    };

    let healthy = store == UP && bus == UP;
    let report = HealthReport {
        status: if healthy { UP } else { DOWN }.to_string(),
        server: UP.to_string(),
        store: store.to_string(),
        bus: bus.to_string(),
        uptime: format_duration(state.started_at.elapsed().as_secs() as i64),
    };
    let code = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(report))
}

async fn list_users(State(state): State<Arc<MonitorState>>, headers: HeaderMap) -> Response {
    let caller = match authenticate(&state, &headers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    let users = match state.db.list_users().await {
        Ok(users) => users,
        Err(e) => return internal(e),
    };
    tracing::info!("👥 {} listed {} users", caller, users.len());

    let masked: Vec<MaskedUser> = users
        .into_iter()
        .map(|u| MaskedUser {
            id: u.id,
            telegram_id: mask_chat_id(&u.telegram_id),
            has_started: u.has_started,
            current_crypto: u.current_crypto.code().to_string(),
            current_fiat: u.current_fiat.code().to_string(),
            created_at: u.created_at,
        })
        .collect();
    Json(masked).into_response()
}

async fn refresh_key(
    State(state): State<Arc<MonitorState>>,
    headers: HeaderMap,
    Json(request): Json<RefreshRequest>,
) -> Response {
    let Some(key) = bearer(&headers) else {
        return error_response(StatusCode::UNAUTHORIZED, "missing API key");
    };
    // Own key may be refreshed after it expired, never after deactivation
    let caller = match state.admin.validate(key).await {
        Ok(KeyStatus::Valid(admin)) | Ok(KeyStatus::Expired(admin)) => admin.username,
        Ok(KeyStatus::Invalid) => return error_response(StatusCode::UNAUTHORIZED, "invalid API key"),
        Err(e) => return internal(e),
    };

    match state.db.find_admin(&request.username).await {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "admin not found"),
        Err(e) => return internal(e),
    }
    if caller != request.username {
        tracing::warn!("🔒 {} tried to refresh the key of {}", caller, request.username);
        return error_response(StatusCode::FORBIDDEN, "cannot refresh another admin's key");
    }

    match state.admin.refresh(&request.username).await {
        Ok(issued) => Json(json!({
            "username": issued.username,
            "key": issued.key,
            "expiresAt": issued.expires_at,
        }))
        .into_response(),
        Err(BotError::NotFound(_)) => error_response(StatusCode::NOT_FOUND, "admin not found"),
        Err(e) => internal(e),
    }
}

pub fn create_router(state: Arc<MonitorState>) -> Router {
    Router::new()
        .route("/healthcheck", get(healthcheck))
        .route("/admin/users", get(list_users))
        .route("/admin/refresh", post(refresh_key))
        .with_state(state)
}
