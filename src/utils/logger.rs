//! Logging utilities
//!
//! This module initializes the `log` facade with `env_logger`.
//!
//! # Example
//!
//! ```rust
//! use pizza_reports::utils::Logger;
//!
//! // Initialize logger
//! Logger::init();
//!
//! log::info!("catalog ready");
//! ```

use env_logger::Builder;
use log::LevelFilter;

/// Logger setup
pub struct Logger;

impl Logger {
    /// Initialize the logger at `Info`
    ///
    /// `RUST_LOG` directives take precedence over the level given here.
    pub fn init() {
        Self::init_with_level(LevelFilter::Info);
    }

    /// Initialize the logger with a custom default level
    ///
    /// # Arguments
    /// * `level` - Log level filter
    ///
    /// # Returns
    /// `false` if a logger was already installed
    pub fn init_with_level(level: LevelFilter) -> bool {
        Builder::new()
            .filter_level(level)
            .parse_default_env()
            .try_init()
            .is_ok()
    }

    /// Parse a level name such as `debug`
    pub fn parse_level(name: &str) -> Option<LevelFilter> {
        name.trim().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_init_twice() {
        Logger::init();
        assert!(!Logger::init_with_level(LevelFilter::Debug));
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(Logger::parse_level("DEBUG"), Some(LevelFilter::Debug));
        assert_eq!(Logger::parse_level(" warn "), Some(LevelFilter::Warn));
        assert_eq!(Logger::parse_level("chatty"), None);
    }
}
