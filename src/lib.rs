//! sqlform - a tiny web form for running SQL.
//!
//! This library exposes the core modules for the binary and integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod query;
pub mod web;
