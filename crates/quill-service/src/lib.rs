//! Quill authentication service library.
//!
//! Authentication and role authorization for the Quill publishing backend:
//! credential sign-in, HS256 access/refresh tokens, single-use refresh
//! rotation, revocation, and role-gated administration routes.
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `crypto` - Password verification, token-id digests, token codec
//! - `errors` - Error types
//! - `handlers` - HTTP request handlers
//! - `middleware` - Access track, refresh track, role gate, HTTP metrics
//! - `models` - Identities, roles and wire types
//! - `observability` - Metrics and log correlation helpers
//! - `repositories` - Store traits and backends
//! - `routes` - Router assembly
//! - `services` - Business logic layer

pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
