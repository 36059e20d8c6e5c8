mod handlers;
pub mod response;

use axum::{
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::db::Database;

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Cancelled on server shutdown; each request runs under a child token.
    pub shutdown: CancellationToken,
}

pub fn create_router(db: Database, shutdown: CancellationToken) -> Router {
    let api = Router::new()
        .route(
            "/plan/add-user-to-plan-proc",
            post(handlers::add_user_to_procedure),
        )
        .route(
            "/plan/remove-user-from-plan-proc",
            post(handlers::remove_user_from_procedure),
        )
        .route(
            "/plan/remove-all-users-from-plan-proc",
            post(handlers::remove_all_users_from_procedure),
        )
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(CatchPanicLayer::custom(response::panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { db, shutdown })
}
