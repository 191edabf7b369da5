//! Layered error types for the analysis dispatcher.
//!
//! This module provides a hierarchical error system:
//!
//! - [`DomainError`] - Business logic errors (invalid state, not found, etc.)
//! - [`InfraError`] - Infrastructure errors (database, HTTP clients)
//! - [`AppError`] - Application-level errors combining domain and infra
//!
//! # Error Philosophy
//!
//! - Domain errors are recoverable and surfaced in logs/task rows as-is
//! - Infrastructure errors are logged but details are not exposed past the
//!   dispatcher loop
//! - The `Result` type alias uses `AppError` for application code
//!
//! This crate has no HTTP API surface, so unlike some sibling services there
//! is no `ApiError`/status-code mapping layer here.

use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// DOMAIN ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Domain-level errors representing business logic violations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DomainError {
    /// Match not found for the given id.
    #[error("match not found: {0}")]
    MatchNotFound(String),

    /// Task not found.
    #[error("task not found: match_id={match_id}, move_number={move_number}")]
    TaskNotFound {
        /// The match that was searched.
        match_id: String,
        /// The move number that was searched.
        move_number: u32,
    },

    /// Invalid task state transition.
    #[error("invalid task state transition: {from} -> {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted new state.
        to: String,
    },

    /// Invalid match id.
    #[error("invalid match id: {0}")]
    InvalidMatchId(String),

    /// Invalid coordinate.
    #[error("invalid coordinate: {0}")]
    InvalidCoord(String),

    /// The engine reported an error for a position it could not analyze.
    #[error("engine reported error for position: {0}")]
    EngineAnalysisError(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// INFRASTRUCTURE ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Infrastructure-level errors from external systems.
///
/// These errors are typically logged but their details are hidden from callers
/// further up the stack.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InfraError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Engine HTTP client error.
    #[error("engine client error: {0}")]
    Engine(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Listing API HTTP client error.
    #[error("listing API client error: {0}")]
    ListingApi(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource not found in storage.
    #[error("resource not found")]
    NotFound,

    /// Connection pool exhausted.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Timeout waiting for operation.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Configuration file error.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

// ═══════════════════════════════════════════════════════════════════════════════
// APPLICATION ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Application-level errors combining domain and infrastructure errors.
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    /// Domain logic error.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Infrastructure error.
    #[error(transparent)]
    Infra(#[from] InfraError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Initialization error.
    #[error("initialization error: {0}")]
    Initialization(String),

    /// Graceful shutdown requested.
    #[error("shutdown requested")]
    ShutdownRequested,
}

/// Type alias for application Results.
pub type Result<T> = std::result::Result<T, AppError>;

// ═══════════════════════════════════════════════════════════════════════════════
// CONVENIENCE CONVERSIONS
// ═══════════════════════════════════════════════════════════════════════════════

impl From<crate::types::primitives::InvalidMatchId> for DomainError {
    fn from(err: crate::types::primitives::InvalidMatchId) -> Self {
        Self::InvalidMatchId(err.to_string())
    }
}

impl From<crate::types::primitives::InvalidCoord> for DomainError {
    fn from(err: crate::types::primitives::InvalidCoord) -> Self {
        Self::InvalidCoord(err.to_string())
    }
}

impl From<crate::types::primitives::InvalidMatchId> for AppError {
    fn from(err: crate::types::primitives::InvalidMatchId) -> Self {
        Self::Domain(err.into())
    }
}

impl From<crate::types::primitives::InvalidCoord> for AppError {
    fn from(err: crate::types::primitives::InvalidCoord) -> Self {
        Self::Domain(err.into())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
