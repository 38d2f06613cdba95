//! Report catalog and execution
//!
//! This module defines the analytical reports and runs them against a data
//! store.
//!
//! The query module consists of:
//! - `definition`: declarative report definitions and parameter schemas
//! - `builtin`: the fifteen built-in pizza-sales reports
//! - `catalog`: registry mapping report ids to definitions
//! - `planner`: turns a definition and parameters into a computation request
//! - `executor`: dispatches requests to a data store and maps results
//!
//! # Workflow
//!
//! 1. **Look up**: Find the definition in the catalog
//! 2. **Validate**: Check bound parameters against the parameter schema
//! 3. **Plan**: Resolve joins and filters against the schema descriptor
//! 4. **Run**: Send the computation request to the data store
//! 5. **Map**: Arrange rows in the declared column order
//!
//! # Example
//!
//! ```rust
//! use pizza_reports::database::SampleData;
//! use pizza_reports::query::{CatalogRegistry, QueryExecutor, Tier};
//! use pizza_reports::store::MemoryStore;
//! use pizza_reports::types::Params;
//!
//! let store = MemoryStore::new(&SampleData::new(8).generate(100))?;
//! let executor = QueryExecutor::new();
//!
//! for definition in CatalogRegistry::global().list(Some(Tier::Basic)) {
//!     if definition.params.iter().any(|p| p.required) {
//!         continue;
//!     }
//!     let result = executor.execute(&definition.id, &Params::new(), &store)?;
//!     println!("{}: {} rows", definition.id, result.num_rows());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builtin;
pub mod catalog;
pub mod definition;
pub mod executor;
pub mod planner;

// Re-export main types for convenience
pub use catalog::CatalogRegistry;
pub use definition::{CatalogEntry, Computation, ParamKind, ParamSpec, QueryDefinition, Tier};
pub use executor::QueryExecutor;
pub use planner::{ComputationRequest, FilterOperation, PostAggregation, QueryPlanner};
