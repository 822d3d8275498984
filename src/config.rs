//! Application configuration loaded from environment variables.
//!
//! Configuration is loaded once at startup and validated before the server starts.
//! Every variable is optional.
//!
//! ## Variables
//!
//! - `LISTEN` - Bind address (default: `0.0.0.0:3000`)
//! - `RUST_LOG` - Log level (default: `info`)
//! - `LOG_FORMAT` - Log format: `text` or `json` (default: `text`)
//! - `BEHIND_PROXY` - Take the client address from `X-Forwarded-For` / `X-Real-IP` (default: `false`)
//! - `URL_CACHE_CAPACITY` - Cached URL records (default: 10000)
//! - `URL_CACHE_TTL_SECONDS` - Lifetime of a cached record (default: 86400)
//! - `RATE_LIMIT_PER_SECOND` - Token refill rate per client (default: 10)
//! - `RATE_LIMIT_BURST` - Token bucket size per client (default: 20)
//! - `RATE_LIMIT_MAX_CLIENTS` - Tracked clients before eviction (default: 10000)
//! - `CLICK_WORKER_COUNT` - Click workers (default: 3)
//! - `CLICK_QUEUE_CAPACITY` - Pending clicks before new ones are dropped (default: 500)
//! - `REPOSITORY_TIMEOUT_MS` - Bound on a single repository call, `0` disables it (default: 5000)
//! - `SHUTDOWN_TIMEOUT_SECONDS` - Time allowed to drain pending clicks (default: 30)

use anyhow::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub log_level: String,
    pub log_format: String,
    /// When true, the client key is read from X-Forwarded-For / X-Real-IP headers.
    /// Enable only when the service is behind a trusted reverse proxy.
    pub behind_proxy: bool,
    pub cache_capacity: usize,
    pub cache_ttl_seconds: u64,
    pub rate_limit_per_second: f64,
    pub rate_limit_burst: u32,
    pub rate_limit_max_clients: usize,
    pub click_worker_count: usize,
    pub click_queue_capacity: usize,
    /// Zero disables the bound.
    pub repository_timeout_ms: u64,
    pub shutdown_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            behind_proxy: false,
            cache_capacity: 10_000,
            cache_ttl_seconds: 24 * 60 * 60,
            rate_limit_per_second: 10.0,
            rate_limit_burst: 20,
            rate_limit_max_clients: 10_000,
            click_worker_count: 3,
            click_queue_capacity: 500,
            repository_timeout_ms: 5_000,
            shutdown_timeout_seconds: 30,
        }
    }
}

/// Parses `name`, falling back to `default` when unset or malformed.
fn parse_env<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Unset or unparsable numeric variables fall back to their defaults;
    /// range checks happen in [`validate`](Self::validate).
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let listen_addr = env::var("LISTEN").unwrap_or(defaults.listen_addr);
        let log_level = env::var("RUST_LOG").unwrap_or(defaults.log_level);
        let log_format = env::var("LOG_FORMAT").unwrap_or(defaults.log_format);

        let behind_proxy = env::var("BEHIND_PROXY")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(defaults.behind_proxy);

        Ok(Self {
            listen_addr,
            log_level,
            log_format,
            behind_proxy,
            cache_capacity: parse_env("URL_CACHE_CAPACITY", defaults.cache_capacity),
            cache_ttl_seconds: parse_env("URL_CACHE_TTL_SECONDS", defaults.cache_ttl_seconds),
            rate_limit_per_second: parse_env(
                "RATE_LIMIT_PER_SECOND",
                defaults.rate_limit_per_second,
            ),
            rate_limit_burst: parse_env("RATE_LIMIT_BURST", defaults.rate_limit_burst),
            rate_limit_max_clients: parse_env(
                "RATE_LIMIT_MAX_CLIENTS",
                defaults.rate_limit_max_clients,
            ),
            click_worker_count: parse_env("CLICK_WORKER_COUNT", defaults.click_worker_count),
            click_queue_capacity: parse_env("CLICK_QUEUE_CAPACITY", defaults.click_queue_capacity),
            repository_timeout_ms: parse_env(
                "REPOSITORY_TIMEOUT_MS",
                defaults.repository_timeout_ms,
            ),
            shutdown_timeout_seconds: parse_env(
                "SHUTDOWN_TIMEOUT_SECONDS",
                defaults.shutdown_timeout_seconds,
            ),
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `log_format` is not `text` or `json`
    /// - `listen_addr` is not `host:port`
    /// - a capacity, count, rate or timeout is zero or out of range
    pub fn validate(&self) -> Result<()> {
        if self.log_format != "text" && self.log_format != "json" {
            anyhow::bail!(
                "LOG_FORMAT must be 'text' or 'json', got '{}'",
                self.log_format
            );
        }

        if !self.listen_addr.contains(':') {
            anyhow::bail!(
                "LISTEN must be in format 'host:port', got '{}'",
                self.listen_addr
            );
        }

        if self.cache_capacity == 0 {
            anyhow::bail!("URL_CACHE_CAPACITY must be at least 1");
        }

        if self.cache_ttl_seconds == 0 {
            anyhow::bail!("URL_CACHE_TTL_SECONDS must be greater than 0");
        }

        if !(self.rate_limit_per_second.is_finite() && self.rate_limit_per_second > 0.0) {
            anyhow::bail!(
                "RATE_LIMIT_PER_SECOND must be a positive number, got {}",
                self.rate_limit_per_second
            );
        }

        if self.rate_limit_burst == 0 {
            anyhow::bail!("RATE_LIMIT_BURST must be at least 1");
        }

        if self.rate_limit_max_clients == 0 {
            anyhow::bail!("RATE_LIMIT_MAX_CLIENTS must be at least 1");
        }

        if self.click_worker_count == 0 || self.click_worker_count > 256 {
            anyhow::bail!(
                "CLICK_WORKER_COUNT must be between 1 and 256, got {}",
                self.click_worker_count
            );
        }

        if self.click_queue_capacity == 0 || self.click_queue_capacity > 1_000_000 {
            anyhow::bail!(
                "CLICK_QUEUE_CAPACITY must be between 1 and 1000000, got {}",
                self.click_queue_capacity
            );
        }

        if self.shutdown_timeout_seconds == 0 {
            anyhow::bail!("SHUTDOWN_TIMEOUT_SECONDS must be greater than 0");
        }

        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// `None` when the bound is disabled.
    pub fn repository_timeout(&self) -> Option<Duration> {
        (self.repository_timeout_ms > 0).then(|| Duration::from_millis(self.repository_timeout_ms))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    /// Prints configuration summary.
    pub fn print_summary(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  Listen address: {}", self.listen_addr);
        tracing::info!("  Log level: {}", self.log_level);
        tracing::info!("  Log format: {}", self.log_format);
        tracing::info!("  Behind proxy: {}", self.behind_proxy);
        tracing::info!(
            "  URL cache: {} entries, ttl {}s",
            self.cache_capacity,
            self.cache_ttl_seconds
        );
        tracing::info!(
            "  Rate limit: {}/s, burst {}, {} clients",
            self.rate_limit_per_second,
            self.rate_limit_burst,
            self.rate_limit_max_clients
        );
        tracing::info!(
            "  Click workers: {}, queue capacity: {}",
            self.click_worker_count,
            self.click_queue_capacity
        );
        match self.repository_timeout() {
            Some(timeout) => tracing::info!("  Repository timeout: {:?}", timeout),
            None => tracing::info!("  Repository timeout: disabled"),
        }
    }
}

/// Loads and validates configuration from environment variables.
///
/// # Errors
///
/// Returns an error if validation fails.
///
/// # Note
///
/// This function expects environment variables to be already loaded
/// (e.g., via `dotenvy::dotenv()` in `main.rs`).
pub fn load_from_env() -> Result<Config> {
    let config = Config::from_env()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "LISTEN",
        "LOG_FORMAT",
        "BEHIND_PROXY",
        "URL_CACHE_CAPACITY",
        "URL_CACHE_TTL_SECONDS",
        "RATE_LIMIT_PER_SECOND",
        "RATE_LIMIT_BURST",
        "RATE_LIMIT_MAX_CLIENTS",
        "CLICK_WORKER_COUNT",
        "CLICK_QUEUE_CAPACITY",
        "REPOSITORY_TIMEOUT_MS",
        "SHUTDOWN_TIMEOUT_SECONDS",
    ];

    fn clear_env() {
        // SAFETY: Tests touching the environment are run serially
        unsafe {
            for var in VARS {
                env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.click_worker_count, 3);
        assert_eq!(config.click_queue_capacity, 500);
        assert_eq!(config.cache_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.repository_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.log_format = "invalid".to_string();
        assert!(config.validate().is_err());
        config.log_format = "json".to_string();
        assert!(config.validate().is_ok());

        config.listen_addr = "3000".to_string();
        assert!(config.validate().is_err());
        config.listen_addr = "127.0.0.1:3000".to_string();

        config.rate_limit_per_second = 0.0;
        assert!(config.validate().is_err());
        config.rate_limit_per_second = f64::NAN;
        assert!(config.validate().is_err());
        config.rate_limit_per_second = 2.5;

        config.click_worker_count = 0;
        assert!(config.validate().is_err());
        config.click_worker_count = 1;

        config.click_queue_capacity = 0;
        assert!(config.validate().is_err());
        config.click_queue_capacity = 1;

        config.cache_capacity = 0;
        assert!(config.validate().is_err());
        config.cache_capacity = 1;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_repository_timeout_disables_bound() {
        let config = Config {
            repository_timeout_ms: 0,
            ..Config::default()
        };

        assert_eq!(config.repository_timeout(), None);
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();

        let config = Config::from_env().unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.cache_capacity, 10_000);
        assert_eq!(config.rate_limit_per_second, 10.0);
        assert_eq!(config.rate_limit_burst, 20);
        assert!(!config.behind_proxy);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        // SAFETY: Tests are run serially due to #[serial], so no concurrent access
        unsafe {
            env::set_var("LISTEN", "127.0.0.1:8080");
            env::set_var("BEHIND_PROXY", "TRUE");
            env::set_var("RATE_LIMIT_PER_SECOND", "2.5");
            env::set_var("CLICK_WORKER_COUNT", "8");
            env::set_var("REPOSITORY_TIMEOUT_MS", "0");
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        assert!(config.behind_proxy);
        assert_eq!(config.rate_limit_per_second, 2.5);
        assert_eq!(config.click_worker_count, 8);
        assert_eq!(config.repository_timeout(), None);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_malformed_number_falls_back_to_default() {
        clear_env();
        // SAFETY: Tests are run serially
        unsafe {
            env::set_var("CLICK_QUEUE_CAPACITY", "lots");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.click_queue_capacity, 500);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_from_env_rejects_invalid() {
        clear_env();
        // SAFETY: Tests are run serially
        unsafe {
            env::set_var("LOG_FORMAT", "xml");
        }

        assert!(load_from_env().is_err());

        clear_env();
    }
}
