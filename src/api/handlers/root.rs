//! Default route: send visitors to the login page.

use axum::{
    extract::Extension,
    response::{IntoResponse, Redirect},
};
use std::sync::Arc;

use crate::api::state::AppState;

pub async fn root(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Redirect::to(state.config().login_path())
}
