//! Error types for sqlform.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for sqlform operations.
#[derive(Error, Debug)]
pub enum QueryFormError {
    /// Any database-level failure: connection refused, authentication, bad SQL, missing table.
    #[error("Query execution failed: {0}")]
    Query(String),

    /// Configuration errors (invalid config file, bad connection string, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Web server errors (bind failures, socket IO).
    #[error("Server error: {0}")]
    Server(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueryFormError {
    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a server error with the given message.
    pub fn server(msg: impl Into<String>) -> Self {
        Self::Server(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Query(_) => "Query Error",
            Self::Config(_) => "Configuration Error",
            Self::Server(_) => "Server Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns the bare message without the category prefix.
    ///
    /// This is what the web form shows to the user.
    pub fn message(&self) -> &str {
        match self {
            Self::Query(msg) | Self::Config(msg) | Self::Server(msg) | Self::Internal(msg) => msg,
        }
    }

    /// One-line `category: message` form used when the binary exits on an error.
    pub fn summary(&self) -> String {
        format!("{}: {}", self.category(), self.message())
    }
}

/// Result type alias using QueryFormError.
pub type Result<T> = std::result::Result<T, QueryFormError>;
