//! Integration tests for rentguy-state
//! These tests exercise contexts, storage and the REST client together
//! through the public API only.

pub mod test_harness;

pub mod context_sync_test;
pub mod persistence_test;
pub mod session_http_test;
