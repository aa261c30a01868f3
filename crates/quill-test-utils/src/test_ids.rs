//! Fixed test IDs for deterministic tests
//!
//! Using fixed UUIDs keeps log output and failure messages stable across runs.

use uuid::Uuid;

// User IDs (100-199)
pub const TEST_USER_ALICE: Uuid = Uuid::from_u128(100);
pub const TEST_USER_BOB: Uuid = Uuid::from_u128(101);
pub const TEST_USER_CAROL: Uuid = Uuid::from_u128(102);
pub const TEST_USER_DAVE: Uuid = Uuid::from_u128(103);

// Never inserted into any store
pub const TEST_USER_UNKNOWN: Uuid = Uuid::from_u128(199);

// Client labels
pub const TEST_CLIENT_LABEL: &str = "quill-tests";
