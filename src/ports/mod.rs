//! Port definitions for dependency injection and testability.
//!
//! Ports are trait definitions that describe what the domain layer needs.
//! Following hexagonal architecture, adapters (in the infrastructure layer)
//! implement these traits to provide concrete functionality.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Domain Layer                            │
//! │                                                                 │
//! │  Uses ports (traits) to define what it needs                   │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌────────┐ │
//! │  │  TaskStore  │  │ MatchStore  │  │EngineClient │  │Listing │ │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘  │ApiCli. │ │
//! │         │                │                │          └───┬────┘ │
//! └─────────┼────────────────┼────────────────┼──────────────┼──────┘
//!           │                │                │              │
//!           ▼                ▼                ▼              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Infrastructure Layer                        │
//! │                                                                 │
//! │  ┌─────────────┐  ┌──────────────┐  ┌──────────────────────┐   │
//! │  │PostgresStore│  │ HttpEngine   │  │ HttpListingApiClient │   │
//! │  └─────────────┘  │   Client     │  └──────────────────────┘   │
//! │                   └──────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Port Categories
//!
//! | Category | Ports | Purpose |
//! |----------|-------|---------|
//! | Storage | [`TaskStore`], [`MatchStore`] | Task queue and match persistence |
//! | External | [`EngineClient`], [`ListingApiClient`] | Outbound HTTP collaborators |
//! | Time | [`Clock`] | Testable time operations |
//!
//! # Usage
//!
//! ```ignore
//! use igo_dispatch::ports::{Clock, TaskStore};
//!
//! // Application code depends on traits, not implementations
//! async fn refill<S: TaskStore>(store: &S, limit: usize) -> igo_dispatch::error::Result<usize> {
//!     let tasks = store.fetch_pending(limit).await?;
//!     Ok(tasks.len())
//! }
//!
//! // In production, use real implementations
//! // let store = PostgresStore::new(pool);
//!
//! // In tests, use in-memory fakes (see crate::store::fake)
//! ```

mod clock;
mod engine;
mod listing;
mod store;

// Re-export all port traits
pub use clock::{Clock, SystemClock};
pub use engine::{AnalysisRequest, AnalysisResult, EngineClient, EngineMove};
pub use listing::{ListingApiClient, MatchSituation};
pub use store::{MatchStore, TaskResult, TaskStore};

// Re-export test utilities for tests and downstream crates using test-utils feature
#[cfg(any(test, feature = "test-utils"))]
pub use clock::FakeClock;
