//! Test server harness for E2E testing
//!
//! Provides TestServer for spawning a real Quill server in tests, backed by
//! an in-memory store the test can seed and fault.

use crate::crypto_fixtures::{fixture_identity, test_config};
use quill_service::config::Config;
use quill_service::handlers::auth_handler::AppState;
use quill_service::models::Role;
use quill_service::observability::metrics::init_metrics_recorder;
use quill_service::repositories::{MemoryStore, Store};
use quill_service::routes;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Tokens handed out by sign-in or refresh.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub access_token: String,
    /// Access-token id from the response body.
    pub token_id: String,
    /// Raw refresh token from the `Set-Cookie` header.
    pub refresh_token: String,
}

#[derive(Deserialize)]
struct TokenBody {
    access_token: String,
    token_id: String,
}

/// Pull the refresh token out of a response's `Set-Cookie` headers.
pub fn refresh_cookie_value(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| {
            v.split(';')
                .next()
                .and_then(|pair| pair.trim().strip_prefix("refresh_token="))
                .map(str::to_string)
        })
}

/// Test harness for spawning the Quill server in E2E tests
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_sign_in_e2e() -> Result<()> {
///     let server = TestServer::spawn().await?;
///     server.add_user(TEST_USER_ALICE, "alice", &[Role::Writer]).await;
///
///     let tokens = server.sign_in("alice", TEST_PASSWORD).await?;
///     assert!(!tokens.access_token.is_empty());
///     Ok(())
/// }
/// ```
pub struct TestServer {
    addr: SocketAddr,
    memory: Arc<MemoryStore>,
    config: Config,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Spawn a server on 127.0.0.1:0 with an empty in-memory store.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_config(test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Result<Self, anyhow::Error> {
        let memory = Arc::new(MemoryStore::new());
        let store = Store::new(memory.clone(), config.store_timeout);

        let state = Arc::new(AppState {
            store,
            config: config.clone(),
        });

        // The global recorder can be installed once per process; later servers
        // get a standalone one
        let metrics_handle = match init_metrics_recorder() {
            Ok(handle) => handle,
            Err(_) => {
                use metrics_exporter_prometheus::PrometheusBuilder;
                PrometheusBuilder::new().build_recorder().handle()
            }
        };

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            memory,
            config,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The backing store, for seeding and fault injection.
    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Insert a fixture identity whose password is `TEST_PASSWORD`.
    pub async fn add_user(&self, user_id: Uuid, username: &str, roles: &[Role]) {
        self.memory
            .insert_identity(fixture_identity(user_id, username, roles))
            .await;
    }

    /// POST /api/v1/auth/sign-in and collect both tokens.
    pub async fn sign_in(&self, login: &str, password: &str) -> Result<SignedIn, anyhow::Error> {
        let response = self
            .client
            .post(format!("{}/api/v1/auth/sign-in", self.url()))
            .json(&json!({ "login": login, "password": password }))
            .send()
            .await?;

        Self::signed_in(response).await
    }

    /// POST /api/v1/auth/refresh with the given refresh token as cookie.
    pub async fn refresh(&self, refresh_token: &str) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .client
            .post(format!("{}/api/v1/auth/refresh", self.url()))
            .header(reqwest::header::COOKIE, format!("refresh_token={}", refresh_token))
            .send()
            .await?)
    }

    /// Turn a successful sign-in or refresh response into tokens.
    pub async fn signed_in(response: reqwest::Response) -> Result<SignedIn, anyhow::Error> {
        if !response.status().is_success() {
            anyhow::bail!("token request failed with {}", response.status());
        }
        let refresh_token = refresh_cookie_value(&response)
            .ok_or_else(|| anyhow::anyhow!("response did not set the refresh cookie"))?;
        let body: TokenBody = response.json().await?;

        Ok(SignedIn {
            access_token: body.access_token,
            token_id: body.token_id,
            refresh_token,
        })
    }

    /// GET `path` with an optional bearer token.
    pub async fn get(
        &self,
        path: &str,
        access_token: Option<&str>,
    ) -> Result<reqwest::Response, anyhow::Error> {
        let mut request = self.client.get(format!("{}{}", self.url(), path));
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
