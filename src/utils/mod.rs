//! Utilities module
//!
//! This module provides logger initialization.
//!
//! # Example
//!
//! ```rust
//! use pizza_reports::utils::Logger;
//!
//! Logger::init();
//! ```

pub mod logger;

// Re-export main types for convenience
pub use logger::Logger;
