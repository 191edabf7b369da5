//! Data persistence layer (adapters for store ports).
//!
//! This module provides the concrete implementation of [`TaskStore`] and
//! [`MatchStore`] (defined in [`crate::ports::store`]) backed by
//! `PostgreSQL`.
//!
//! [`TaskStore`]: crate::ports::TaskStore
//! [`MatchStore`]: crate::ports::MatchStore
//!
//! # Usage
//!
//! ```ignore
//! use igo_dispatch::store::PostgresStore;
//! use sqlx::postgres::PgPoolOptions;
//!
//! let pool = PgPoolOptions::new()
//!     .max_connections(10)
//!     .connect("postgres://localhost/igo_dispatch")
//!     .await?;
//!
//! let store = PostgresStore::new(pool);
//! store.run_migrations().await?;
//! ```
//!
//! # Migrations
//!
//! Migrations are located in `migrations/` and run via
//! [`PostgresStore::run_migrations`] or `sqlx migrate run`. See
//! `migrations/20240101000000_init.sql` for the task/match schema,
//! including the partial pickup index described in §6 of the design.

mod postgres;

#[cfg(any(test, feature = "test-utils"))]
mod fake;

pub use postgres::PostgresStore;

#[cfg(any(test, feature = "test-utils"))]
pub use fake::FakeStore;

// Re-export commonly used types for convenience
pub use sqlx::postgres::PgPool;
