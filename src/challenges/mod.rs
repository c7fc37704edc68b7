pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;

use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/challenges",
            get(handlers::list_challenges).post(handlers::create_challenge),
        )
        .route("/challenges/:id/join", post(handlers::join_challenge))
        .route("/challenges/:id/leaderboard", get(handlers::leaderboard))
}
