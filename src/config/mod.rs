//! Configuration loading and validation for the analysis dispatcher.
//!
//! Configuration is loaded from multiple sources in order of precedence:
//! 1. Environment variables (highest)
//! 2. Environment-specific file (e.g., `development.toml`)
//! 3. Default file (`default.toml`)
//!
//! # Example
//!
//! ```ignore
//! use igo_dispatch::config::Settings;
//!
//! let settings = Settings::load("development")?;
//! println!("Engine URL: {}", settings.engine.base_url);
//! ```

mod settings;

pub use settings::{
    DatabaseSettings, DispatcherSettings, EngineSettings, ListingApiSettings, LoggingSettings,
    PollerSettings, Settings,
};
