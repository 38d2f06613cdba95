//! PizzaReports: a typed catalog of analytical reports over pizza-sales data
//!
//! Reports are declared once as data (id, tier, parameter schema and a
//! computation shape), validated against a fixed schema of orders, order
//! details, pizzas and pizza categories, and executed against any
//! [`store::DataStore`]. The bundled [`store::MemoryStore`] evaluates
//! requests in memory; [`store::SqlRenderer`] renders the same requests as
//! SQL for a relational store.
//!
//! # Example
//!
//! ```rust
//! use pizza_reports::*;
//!
//! let dataset = database::SampleData::new(7).generate(200);
//! let store = store::MemoryStore::new(&dataset)?;
//!
//! let executor = QueryExecutor::new();
//! let params = Params::new().with("top_n", 3);
//! let result = executor.execute("top_pizzas_by_revenue", &params, &store)?;
//!
//! println!("{}", ResultFormatter::format(&result, OutputStyle::Table));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// PizzaReports version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Main modules
pub mod config;
pub mod error;
pub mod types;

pub mod database;
pub mod format;
pub mod query;
pub mod store;
pub mod utils;

// Re-export main types
pub use error::{ConfigError, DatasetError, ReportError};
pub use format::{OutputStyle, ResultFormatter};
pub use query::{CatalogRegistry, QueryDefinition, QueryExecutor, Tier};
pub use store::{DataStore, MemoryStore};
pub use types::{Params, ReportResult, Value};
