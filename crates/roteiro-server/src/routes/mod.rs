pub mod ask;
pub mod health;

use crate::state::AppState;
use axum::Router;

pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(ask::routes(state))
        .merge(health::routes())
}
