use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod handlers;
pub mod password;
pub mod sessions;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
