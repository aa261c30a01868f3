//! HTTP routes.
//!
//! Route groups:
//! - public: liveness, readiness, metrics, sign-in
//! - refresh track: refresh and sign-out (refresh cookie)
//! - access track: account and administration. Each role group carries its
//!   own gate (Writer, Editor, Admin, SuperAdmin); gates are not inherited
//!   between groups.

use crate::handlers::auth_handler::AppState;
use crate::handlers::{account_handler, admin_handler, auth_handler, health};
use crate::middleware::auth::{require_access_token, require_refresh_token};
use crate::middleware::http_metrics::http_metrics_middleware;
use crate::middleware::role::{require_role, RequiredRole};
use crate::models::Role;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Routes that require exactly `role` (besides a valid access token).
fn role_group(role: Role, routes: Router<Arc<AppState>>) -> Router<Arc<AppState>> {
    routes.route_layer(middleware::from_fn_with_state(
        RequiredRole(role.as_str()),
        require_role,
    ))
}

/// Build the application routes.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let request_timeout = state.config.request_timeout;

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/api/v1/auth/sign-in", post(auth_handler::handle_sign_in));

    let refresh_routes = Router::new()
        .route("/api/v1/auth/refresh", post(auth_handler::handle_refresh))
        .route("/api/v1/auth/sign-out", post(auth_handler::handle_sign_out))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_refresh_token,
        ));

    let access_routes = Router::new()
        .route("/api/v1/account", get(account_handler::handle_get_account))
        .merge(role_group(
            Role::Writer,
            Router::new().route(
                "/api/v1/account/sessions",
                get(account_handler::handle_get_own_sessions),
            ),
        ))
        .merge(role_group(
            Role::Editor,
            Router::new().route(
                "/api/v1/users/:user_id/sessions",
                get(admin_handler::handle_list_sessions),
            ),
        ))
        .merge(role_group(
            Role::Admin,
            Router::new().route(
                "/api/v1/users/:user_id/sessions/revoke",
                post(admin_handler::handle_revoke_sessions),
            ),
        ))
        .merge(role_group(
            Role::SuperAdmin,
            Router::new()
                .route("/api/v1/users", post(admin_handler::handle_create_account))
                .route(
                    "/api/v1/users/:user_id/roles",
                    put(admin_handler::handle_set_roles),
                ),
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_access_token,
        ));

    let metrics_routes = Router::new()
        .route("/metrics", get(health::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (outermost last):
    // 1. TimeoutLayer bounds the whole request
    // 2. TraceLayer logs it
    // 3. HTTP metrics see every response, including timeouts and 404s
    public_routes
        .merge(refresh_routes)
        .merge(access_routes)
        .with_state(state)
        .merge(metrics_routes)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}
