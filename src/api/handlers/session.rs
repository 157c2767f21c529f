//! Current-principal endpoint for cookie and bearer auth.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use utoipa::ToSchema;

use super::presented_session_token;
use crate::api::state::AppState;
use crate::openid::context::principal_from_session;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    identity: String,
    roles: Vec<String>,
    attributes: HashMap<String, String>,
}

#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "Session holds an authenticated principal", body = SessionResponse),
        (status = 401, description = "No authenticated principal")
    ),
    tag = "auth"
)]
pub async fn session(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    // Missing cookies are treated as "not authenticated" to avoid leaking
    // whether a session exists at all.
    let Some(token) = presented_session_token(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let Some(session) = state.sessions().resolve(&token) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let Some(principal) = principal_from_session(&session) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let response = SessionResponse {
        identity: principal.identity().to_string(),
        roles: principal.roles().iter().cloned().collect(),
        attributes: principal.attributes().clone(),
    };
    (StatusCode::OK, Json(response)).into_response()
}
