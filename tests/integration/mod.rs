//! Integration tests for sqlform.

pub mod common;
pub mod query_test;
pub mod server_test;
