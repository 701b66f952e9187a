//! Anti-bot challenge endpoint.

use axum::{Json, extract::State};
use shortpath_common::Challenge;

use crate::state::AppState;

/// Issue a fresh challenge; the answer stays on the server
pub async fn get_challenge(State(state): State<AppState>) -> Json<Challenge> {
    Json(state.challenges.get_challenge())
}
