mod collections;
mod docs;
mod health;
mod pagination;
mod search;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(collections::router())
        .merge(docs::router())
        .merge(search::router())
        .merge(health::router())
        .with_state(state)
}
