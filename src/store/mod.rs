//! Data stores
//!
//! A data store executes a [`ComputationRequest`] and returns raw rows. The
//! executor treats stores as black boxes: anything implementing
//! [`DataStore`] can back the report catalog.
//!
//! The store module consists of:
//! - `memory`: in-memory engine over a loaded dataset
//! - `window`: post-aggregation steps (shares, running totals, ranks)
//! - `sql`: MySQL rendering of requests, for stores backed by a database
//!
//! # Example
//!
//! ```rust
//! use pizza_reports::database::SampleData;
//! use pizza_reports::query::QueryExecutor;
//! use pizza_reports::store::MemoryStore;
//! use pizza_reports::types::Params;
//!
//! let store = MemoryStore::new(&SampleData::new(3).generate(100))?;
//! let result = QueryExecutor::new().execute("total_orders", &Params::new(), &store)?;
//! assert_eq!(result.rows[0].values[0].as_i64(), Some(100));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod memory;
pub mod sql;
pub mod window;

pub use memory::{MemoryStore, MemoryStoreError};
pub use sql::{RenderError, SqlRenderer};

use crate::query::planner::ComputationRequest;
use crate::types::QueryResult;
use thiserror::Error;

/// Executes computation requests
///
/// Implementations must be safe to share across threads when the executor
/// is used concurrently; the executor itself holds no mutable state.
pub trait DataStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Run one request and return its rows, with the column names they carry
    fn run(&self, request: &ComputationRequest) -> Result<QueryResult, Self::Error>;
}

impl<S: DataStore + ?Sized> DataStore for &S {
    type Error = S::Error;

    fn run(&self, request: &ComputationRequest) -> Result<QueryResult, Self::Error> {
        (**self).run(request)
    }
}

/// Result returned by a store that does not match the request
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreContractError {
    #[error("result is missing column {0}")]
    MissingColumn(String),

    #[error("row {row} has {found} values, expected {expected}")]
    RowWidth {
        row: usize,
        found: usize,
        expected: usize,
    },
}
