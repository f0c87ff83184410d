// src/routes.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};

use crate::{config::AppState, handlers, middleware::auth::auth_guard};

pub fn build_router(app_state: AppState) -> Router {
    // Tudo em /api/onboarding exige sessão
    let onboarding_routes = Router::new()
        .route("/unified-profile", get(handlers::onboarding::unified_profile))
        .route("/verify-state", get(handlers::onboarding::verify_state))
        .route("/advance", post(handlers::onboarding::advance_status))
        .route("/setup/trigger", post(handlers::setup::trigger_setup))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/onboarding", onboarding_routes)
        .with_state(app_state)
}
