pub mod dto;
pub mod handlers;
pub mod repo;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/dashboard/:date",
        axum::routing::get(handlers::get_dashboard),
    )
}
