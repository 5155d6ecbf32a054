//! Unit tests for the core stores
//!
//! Scenario-level tests for the store primitive, the bound-store shim and
//! the auth state machine. Module-local tests live beside the code.
