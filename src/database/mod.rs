//! Dataset module
//!
//! This module describes and provides the pizza-sales dataset that reports
//! run against.
//!
//! The dataset module consists of:
//! - `schema`: static schema descriptor (entities, fields, foreign keys)
//! - `dataset`: typed records and integrity checks
//! - `loader`: CSV loading
//! - `storage`: JSON and binary snapshots
//! - `sample`: deterministic sample data
//!
//! # Example
//!
//! ```rust,no_run
//! use pizza_reports::database::{DataLoader, DatasetStorage};
//!
//! // Load the CSV export
//! let dataset = DataLoader::new().load_dir("data/pizza_sales")?;
//!
//! // Save a snapshot
//! DatasetStorage::new().save(&dataset, "pizza_sales.json")?;
//! # Ok::<(), pizza_reports::DatasetError>(())
//! ```

pub mod dataset;
pub mod loader;
pub mod sample;
pub mod schema;
pub mod storage;

// Re-export main types for convenience
pub use dataset::{Dataset, Order, OrderDetail, Pizza, PizzaCategory, PizzaSize};
pub use loader::DataLoader;
pub use sample::SampleData;
pub use schema::{
    Entity, EntityDescriptor, FieldDescriptor, FieldRef, ForeignKey, JoinOperation,
    SchemaDescriptor,
};
pub use storage::DatasetStorage;
