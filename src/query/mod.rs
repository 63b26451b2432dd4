//! Query execution and result caching for sqlform.
//!
//! This module isolates SQL execution from the web layer so it can be tested
//! on its own.

mod cache;
pub mod runner;

pub use cache::QueryCache;
pub use runner::{QueryOutcome, QueryRunner};
