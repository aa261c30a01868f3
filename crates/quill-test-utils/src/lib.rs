//! # Quill Test Utilities
//!
//! Shared test utilities for the Quill authentication service.
//!
//! This crate provides:
//! - Deterministic fixtures (fixed signing secret, low-cost password hashes)
//! - Token builders for hand-crafted tokens (expired, forged, wrong kind)
//! - Server test harness (TestServer for E2E tests over HTTP)
//! - Fixed test IDs
//! - Custom assertions (TokenAssertions trait)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quill_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestServer::spawn().await?;
//!     server.add_user(TEST_USER_ALICE, "alice", &[Role::Writer]).await;
//!
//!     let tokens = server.sign_in("alice", TEST_PASSWORD).await?;
//!     tokens.access_token.assert_valid_jwt().assert_kind("access");
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod crypto_fixtures;
pub mod server_harness;
pub mod test_ids;
pub mod token_builders;

// Re-export commonly used items
pub use assertions::*;
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use test_ids::*;
pub use token_builders::*;
