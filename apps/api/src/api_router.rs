use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use council_core::AppError;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

mod cors;

pub fn build_router(app_state: AppState, cors_origin: Option<&str>) -> Result<Router, AppError> {
    let protected_routes = Router::new()
        .route("/api/commands", post(handlers::commands::command_handler))
        .route(
            "/api/permissions",
            get(handlers::info::list_permissions_handler),
        )
        .route("/api/roles", get(handlers::info::list_roles_handler))
        .route("/api/roles/{role_id}", get(handlers::info::role_handler))
        .route(
            "/api/roles/{role_id}/permissions",
            get(handlers::info::role_permissions_handler),
        )
        .route(
            "/api/users/{user_id}/permissions",
            get(handlers::info::user_permissions_handler),
        )
        .route(
            "/api/users/{user_id}/roles",
            get(handlers::info::user_roles_handler),
        )
        .route("/api/votes/{vote_id}", get(handlers::info::vote_handler))
        .route(
            "/api/votes/{vote_id}/tally",
            get(handlers::info::tally_handler),
        )
        .route("/ws", get(handlers::events::events_handler))
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_bearer_auth,
        ));

    let mut router = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http());

    if let Some(origin) = cors_origin {
        router = router.layer(cors::build_cors_layer(origin)?);
    }

    Ok(router.with_state(app_state))
}
