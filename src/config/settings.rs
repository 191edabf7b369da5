//! Settings structs and loading logic.
//!
//! All settings have sensible defaults and can be overridden via
//! environment variables or configuration files.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Database configuration.
    pub database: DatabaseSettings,
    /// Analysis engine HTTP client configuration.
    pub engine: EngineSettings,
    /// Match-listing API HTTP client configuration.
    pub listing_api: ListingApiSettings,
    /// Dispatcher flight-window and preemption configuration.
    pub dispatcher: DispatcherSettings,
    /// Move-poller scheduling configuration.
    pub poller: PollerSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from configuration files and environment variables.
    ///
    /// Files are loaded in this order (later overrides earlier):
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (if exists)
    /// 3. Environment variables with `IGO_` prefix
    ///
    /// # Arguments
    /// * `environment` - Environment name (e.g., "development", "production")
    ///
    /// # Errors
    /// Returns `ConfigError` if configuration is invalid or cannot be loaded.
    pub fn load(environment: &str) -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("database.url", "postgres://localhost/igo_dispatch")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout_ms", 5000)?
            .set_default("database.idle_timeout_ms", 600_000)?
            .set_default("engine.base_url", "http://localhost:8080")?
            .set_default("engine.max_visits", 500)?
            .set_default("engine.request_timeout_ms", 60_000)?
            .set_default("engine.health_check_timeout_ms", 5000)?
            .set_default("listing_api.base_url", "https://listing.example.com")?
            .set_default("listing_api.request_timeout_ms", 10_000)?
            .set_default("listing_api.max_retries", 3)?
            .set_default("listing_api.initial_backoff_ms", 1000)?
            .set_default("dispatcher.window_size", 16)?
            .set_default("dispatcher.preempt_threshold", 500)?
            .set_default("dispatcher.task_timeout_ms", 60_000)?
            .set_default("dispatcher.max_retries", 3)?
            .set_default("poller.interval_ms", 3000)?
            .set_default("poller.enabled", true)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("logging.file_path", Option::<String>::None)?
            // Load default configuration file
            .add_source(File::with_name(&format!("{config_dir}/default")).required(false))
            // Load environment-specific file
            .add_source(File::with_name(&format!("{config_dir}/{environment}")).required(false))
            // Override with environment variables (IGO_ prefix)
            .add_source(
                Environment::with_prefix("IGO")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load settings from a specific file path.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }

    /// Validate settings and return any validation errors.
    ///
    /// # Errors
    /// Returns a list of validation error messages.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // Database validation
        if self.database.url.is_empty() {
            errors.push("database.url cannot be empty".into());
        }
        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be non-zero".into());
        }
        if self.database.min_connections > self.database.max_connections {
            errors.push("database.min_connections cannot exceed max_connections".into());
        }

        // Engine validation
        if self.engine.base_url.is_empty() {
            errors.push("engine.base_url cannot be empty".into());
        }
        if self.engine.max_visits == 0 {
            errors.push("engine.max_visits must be non-zero".into());
        }

        // Listing API validation
        if self.listing_api.base_url.is_empty() {
            errors.push("listing_api.base_url cannot be empty".into());
        }

        // Dispatcher validation
        if self.dispatcher.window_size == 0 {
            errors.push("dispatcher.window_size must be non-zero".into());
        }
        if self.dispatcher.preempt_threshold < 0 {
            errors.push("dispatcher.preempt_threshold must be non-negative".into());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// `PostgreSQL` database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum connections in the pool.
    pub max_connections: u32,
    /// Minimum connections to maintain.
    pub min_connections: u32,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Idle connection timeout in milliseconds.
    pub idle_timeout_ms: u64,
}

impl DatabaseSettings {
    /// Get the connection timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Get the idle timeout as a `Duration`.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// Analysis engine HTTP client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Base URL of the engine's HTTP analysis server.
    pub base_url: String,
    /// Default visit cap sent with every analysis request.
    pub max_visits: u32,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Timeout for the lightweight health check endpoint, in milliseconds.
    pub health_check_timeout_ms: u64,
}

impl EngineSettings {
    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Get the health check timeout as a `Duration`.
    #[must_use]
    pub const fn health_check_timeout(&self) -> Duration {
        Duration::from_millis(self.health_check_timeout_ms)
    }
}

/// Match-listing API HTTP client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingApiSettings {
    /// Base URL of the match-listing API.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Maximum retry attempts for a failed request.
    pub max_retries: u32,
    /// Initial backoff before the first retry, in milliseconds.
    pub initial_backoff_ms: u64,
}

impl ListingApiSettings {
    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Get the initial backoff as a `Duration`.
    #[must_use]
    pub const fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

/// Dispatcher flight-window and preemption configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherSettings {
    /// Maximum number of tasks in flight at the engine at once.
    pub window_size: usize,
    /// Priority gap that triggers preemption of the lowest in-flight task.
    pub preempt_threshold: i32,
    /// Hard timeout for a single in-flight analysis task, in milliseconds.
    pub task_timeout_ms: u64,
    /// Maximum retry attempts before a task is marked failed.
    pub max_retries: u32,
}

impl DispatcherSettings {
    /// Get the task timeout as a `Duration`.
    #[must_use]
    pub const fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }
}

/// Move-poller scheduling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PollerSettings {
    /// Interval between poll cycles, in milliseconds.
    pub interval_ms: u64,
    /// Whether the poller job is enabled at all.
    pub enabled: bool,
}

impl PollerSettings {
    /// Get the poll interval as a `Duration`.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log format (json, pretty).
    pub format: String,
    /// Optional file path for log output.
    pub file_path: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
