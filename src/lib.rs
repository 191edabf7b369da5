//! Go-Match Analysis Dispatcher
//!
//! A backend service that keeps a bounded window of Go-analysis-engine
//! requests in flight for live and finished matches, prioritizing freshly
//! played moves over backfill and preempting stale work when priority
//! inversion builds up.
//!
//! # Architecture
//!
//! The crate follows a hexagonal architecture: the core loop only ever talks
//! to port traits, and concrete adapters are wired up in [`main`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         CORE LOOP                                │
//! │  ┌──────────────┐     ┌──────────────┐     ┌──────────────┐     │
//! │  │ Move Poller  │────▶│  Task Store  │────▶│  Dispatcher  │     │
//! │  │    (C3)      │     │    (C1)      │     │    (C4)      │     │
//! │  └──────┬───────┘     └──────────────┘     └──────┬───────┘     │
//! │         │                                         │             │
//! │         ▼                                         ▼             │
//! │  ┌──────────────┐                          ┌──────────────┐     │
//! │  │ Match Store  │◀─────────────────────────│  Classifier  │     │
//! │  │    (C2)      │                          │    (C5)      │     │
//! │  └──────────────┘                          └──────────────┘     │
//! │                                                                 │
//! │  Scheduler (C6) drives the poller on an interval and supervises  │
//! │  the dispatcher loop.                                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`types`] - Domain types (enums, entities, primitives)
//! - [`error`] - Layered error types
//! - [`config`] - Configuration loading and validation
//! - [`ports`] - Port traits for storage and external HTTP collaborators
//! - [`store`] - Task/match persistence (`PostgreSQL`, in-memory fake)
//! - [`engine`] - HTTP client and response parser for the analysis engine
//! - [`listing`] - HTTP client and move-list parser for the listing API
//! - [`classifier`] - Delta classification of analyzed moves
//! - [`dispatcher`] - The bounded-window, preemptive analysis dispatcher
//! - [`poller`] - Reconciles tracked matches against the listing API
//! - [`scheduler`] - Periodic driver and dispatcher supervisor
//!
//! # Getting Started
//!
//! ```bash
//! # Set up environment
//! cp .env.example .env
//! # Edit .env with your configuration
//!
//! # Run migrations
//! cargo run -- migrate
//!
//! # Start the dispatcher
//! cargo run -- run
//! ```

#![doc(html_root_url = "https://docs.igo-dispatch.dev")]

pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod listing;
pub mod poller;
pub mod ports;
pub mod scheduler;
pub mod store;
pub mod types;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version string
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}
