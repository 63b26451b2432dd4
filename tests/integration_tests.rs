//! Integration tests for sqlform.
//!
//! These run against scratch SQLite files and a server bound to an ephemeral port.
//!
//! Run with: `cargo test --test integration_tests`

mod integration;
