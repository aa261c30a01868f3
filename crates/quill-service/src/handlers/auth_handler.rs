use crate::config::Config;
use crate::errors::AuthError;
use crate::middleware::auth::REFRESH_COOKIE_NAME;
use crate::models::{SignInRequest, SignOutRequest, TokenResponse};
use crate::repositories::{Store, StoreSession};
use crate::services::authentication_service::RefreshContext;
use crate::services::token_service::{self, TokenPair};
use axum::{
    extract::State,
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use secrecy::ExposeSecret;
use std::sync::Arc;

use super::record_failure;

/// The refresh cookie is only sent to the auth endpoints.
pub const REFRESH_COOKIE_PATH: &str = "/api/v1/auth";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Config,
}

fn refresh_cookie(config: &Config, token: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE_NAME, token))
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Strict)
        .path(REFRESH_COOKIE_PATH)
        .max_age(time::Duration::days(config.refresh_token_lifetime_days))
        .build()
}

fn issue_response(
    config: &Config,
    jar: CookieJar,
    pair: TokenPair,
) -> (CookieJar, Json<TokenResponse>) {
    let body = pair.to_response();
    let jar = jar.add(refresh_cookie(config, pair.refresh_token));
    (jar, Json(body))
}

/// Handle sign-in
///
/// POST /api/v1/auth/sign-in
///
/// Returns the access token in the body and sets the refresh cookie.
pub async fn handle_sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(payload): Json<SignInRequest>,
) -> Result<(CookieJar, Json<TokenResponse>), AuthError> {
    let user_agent = headers.get(USER_AGENT).and_then(|v| v.to_str().ok());
    let label =
        token_service::normalize_client_label(payload.client_label.as_deref().or(user_agent));

    let session = state.store.session();
    let pair = token_service::sign_in(
        &session,
        &state.config,
        &payload.login,
        payload.password.expose_secret(),
        &label,
    )
    .await
    .map_err(|e| record_failure("sign_in", e))?;

    Ok(issue_response(&state.config, jar, pair))
}

/// Handle refresh-token rotation
///
/// POST /api/v1/auth/refresh
///
/// Behind `require_refresh_token`. The presented token is revoked and a new
/// pair issued; the cookie is replaced.
pub async fn handle_refresh(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<StoreSession>,
    Extension(ctx): Extension<RefreshContext>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<TokenResponse>), AuthError> {
    let pair = token_service::refresh(&session, &state.config, ctx)
        .await
        .map_err(|e| record_failure("refresh", e))?;

    Ok(issue_response(&state.config, jar, pair))
}

/// Handle sign-out
///
/// POST /api/v1/auth/sign-out
///
/// Behind `require_refresh_token`. An optional JSON body names an access
/// token to revoke as well. Clears the refresh cookie.
pub async fn handle_sign_out(
    Extension(session): Extension<StoreSession>,
    Extension(ctx): Extension<RefreshContext>,
    jar: CookieJar,
    payload: Option<Json<SignOutRequest>>,
) -> Result<(StatusCode, CookieJar), AuthError> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();

    token_service::sign_out(&session, ctx, request.access_token_id.as_deref())
        .await
        .map_err(|e| record_failure("sign_out", e))?;

    let jar = jar.remove(Cookie::build(REFRESH_COOKIE_NAME).path(REFRESH_COOKIE_PATH));
    Ok((StatusCode::NO_CONTENT, jar))
}
