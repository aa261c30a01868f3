//! Authentication middleware.
//!
//! - `require_access_token` guards general routes (bearer token)
//! - `require_refresh_token` guards refresh and sign-out (refresh cookie)
//!
//! Both open the request's store session and insert it into the request
//! extensions next to the typed context, so handlers share one store
//! deadline with the pipeline.

use crate::errors::AuthError;
use crate::handlers::auth_handler::AppState;
use crate::observability::metrics::record_token_validation;
use crate::services::authentication_service;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tracing::instrument;

/// Name of the cookie carrying the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Extract Bearer token from the Authorization header.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Access-token track.
///
/// Any failure is the same 401 to the client. On success the request carries
/// an [`authentication_service::AccessContext`] and a
/// [`crate::repositories::StoreSession`].
#[instrument(skip_all, name = "quill.middleware.access")]
pub async fn require_access_token(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    let Some(token) = extract_bearer_token(&req) else {
        tracing::debug!(target: "quill.middleware.auth", "Missing or malformed Authorization header");
        record_token_validation("access", "error", Some("missing"));
        return Err(AuthError::MalformedToken);
    };

    let session = state.store.session();
    let ctx = authentication_service::authenticate_access(&session, &state.config, token).await?;

    req.extensions_mut().insert(ctx);
    req.extensions_mut().insert(session);

    Ok(next.run(req).await)
}

/// Refresh-token track.
///
/// On success the request carries an
/// [`authentication_service::RefreshContext`] and a
/// [`crate::repositories::StoreSession`].
#[instrument(skip_all, name = "quill.middleware.refresh")]
pub async fn require_refresh_token(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    let jar = CookieJar::from_headers(req.headers());
    let Some(token) = jar
        .get(REFRESH_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
    else {
        tracing::debug!(target: "quill.middleware.auth", "Missing refresh cookie");
        record_token_validation("refresh", "error", Some("missing"));
        return Err(AuthError::MalformedToken);
    };

    let session = state.store.session();
    let ctx = authentication_service::authenticate_refresh(&session, &state.config, &token).await?;

    req.extensions_mut().insert(ctx);
    req.extensions_mut().insert(session);

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::crypto::jwt;
    use crate::models::{Role, TokenKind};
    use crate::repositories::StoreSession;
    use crate::services::authentication_service::{AccessContext, RefreshContext};
    use crate::services::testing::{test_config, test_identity, test_store, TEST_PASSWORD};
    use crate::services::token_service;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    async fn whoami(
        Extension(ctx): Extension<AccessContext>,
        Extension(_session): Extension<StoreSession>,
    ) -> String {
        ctx.username
    }

    async fn refresh_owner(Extension(ctx): Extension<RefreshContext>) -> String {
        ctx.identity.username
    }

    async fn app() -> (Router, Arc<AppState>) {
        let (memory, store) = test_store();
        memory
            .insert_identity(test_identity("ada", vec![Role::Writer]))
            .await;
        let state = Arc::new(AppState {
            store,
            config: test_config(),
        });

        let router = Router::new()
            .route(
                "/access",
                get(whoami).route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    require_access_token,
                )),
            )
            .route(
                "/refresh",
                get(refresh_owner).route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    require_refresh_token,
                )),
            );
        (router, state)
    }

    fn get_with(uri: &str, header: Option<(&str, String)>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().method("GET").uri(uri);
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_extract_bearer_token() {
        let req = HttpRequest::builder()
            .header("authorization", "Bearer abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_bearer_token(&req), Some("abc.def.ghi"));

        let req = HttpRequest::builder()
            .header("authorization", "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_bearer_token(&req), None);

        let req = HttpRequest::builder()
            .header("authorization", "Bearer ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_bearer_token(&req), None);
    }

    #[tokio::test]
    async fn test_access_track_end_to_end() {
        let (router, state) = app().await;
        let pair = token_service::sign_in(
            &state.store.session(),
            &state.config,
            "ada",
            TEST_PASSWORD,
            "test",
        )
        .await
        .unwrap();

        let ok = router
            .clone()
            .oneshot(get_with(
                "/access",
                Some(("authorization", format!("Bearer {}", pair.access_token))),
            ))
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        let missing = router.clone().oneshot(get_with("/access", None)).await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        // Refresh token presented as bearer
        let wrong_kind = router
            .oneshot(get_with(
                "/access",
                Some(("authorization", format!("Bearer {}", pair.refresh_token))),
            ))
            .await
            .unwrap();
        assert_eq!(wrong_kind.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_track_reads_cookie_only() {
        let (router, state) = app().await;
        let pair = token_service::sign_in(
            &state.store.session(),
            &state.config,
            "ada",
            TEST_PASSWORD,
            "test",
        )
        .await
        .unwrap();

        let ok = router
            .clone()
            .oneshot(get_with(
                "/refresh",
                Some(("cookie", format!("{}={}", REFRESH_COOKIE_NAME, pair.refresh_token))),
            ))
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        let as_bearer = router
            .clone()
            .oneshot(get_with(
                "/refresh",
                Some(("authorization", format!("Bearer {}", pair.refresh_token))),
            ))
            .await
            .unwrap();
        assert_eq!(as_bearer.status(), StatusCode::UNAUTHORIZED);

        let access_in_cookie = router
            .oneshot(get_with(
                "/refresh",
                Some(("cookie", format!("{}={}", REFRESH_COOKIE_NAME, pair.access_token))),
            ))
            .await
            .unwrap();
        assert_eq!(access_in_cookie.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_forged_token_rejected() {
        let (router, _state) = app().await;
        let (_, forged) = jwt::issue_token(
            TokenKind::Access,
            uuid::Uuid::new_v4(),
            chrono::Duration::minutes(5),
            b"some-other-secret-that-is-long-enough!!",
        )
        .unwrap();

        let response = router
            .oneshot(get_with(
                "/access",
                Some(("authorization", format!("Bearer {}", forged))),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
