//! Report executor
//!
//! This module runs catalog reports: it looks up the definition, validates
//! the bound parameters, plans a computation request, dispatches it to a
//! [`DataStore`] and maps the raw rows into a [`ReportResult`].
//!
//! # Example
//!
//! ```rust
//! use pizza_reports::database::SampleData;
//! use pizza_reports::query::QueryExecutor;
//! use pizza_reports::store::MemoryStore;
//! use pizza_reports::types::Params;
//!
//! let store = MemoryStore::new(&SampleData::new(5).generate(200))?;
//! let executor = QueryExecutor::new();
//!
//! let top = executor.execute("top_pizzas_by_revenue", &Params::new().with("top_n", 3), &store)?;
//! assert_eq!(top.num_rows(), 3);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::ReportError;
use crate::query::catalog::CatalogRegistry;
use crate::query::planner::{ComputationRequest, QueryPlanner};
use crate::store::{DataStore, StoreContractError};
use crate::types::{Params, QueryResult, ReportResult, Row};

/// Report executor
///
/// Holds no mutable state; one executor can serve concurrent callers as
/// long as the data store tolerates concurrent use.
#[derive(Debug, Clone, Copy)]
pub struct QueryExecutor<'c> {
    catalog: &'c CatalogRegistry,
    planner: QueryPlanner,
}

impl QueryExecutor<'static> {
    /// Executor over the built-in catalog
    pub fn new() -> Self {
        Self::with_catalog(CatalogRegistry::global())
    }
}

impl Default for QueryExecutor<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'c> QueryExecutor<'c> {
    /// Executor over a custom catalog
    pub fn with_catalog(catalog: &'c CatalogRegistry) -> Self {
        Self {
            catalog,
            planner: QueryPlanner::new(),
        }
    }

    pub fn catalog(&self) -> &'c CatalogRegistry {
        self.catalog
    }

    /// Build the computation request for a report without running it
    pub fn explain(
        &self,
        query_id: &str,
        params: &Params,
    ) -> Result<ComputationRequest, ReportError> {
        let definition = self.catalog.get(query_id)?;
        self.planner.plan(definition, params)
    }

    /// Execute a report against a data store
    ///
    /// # Arguments
    /// * `query_id` - Catalog identifier of the report
    /// * `params` - Bound parameters
    /// * `store` - Data store that runs the computation request
    ///
    /// # Returns
    /// `Ok(ReportResult)` with columns in declared order. Parameter errors
    /// are raised before the store is contacted; store failures surface as
    /// `DataStoreError` with the cause attached.
    pub fn execute<S>(
        &self,
        query_id: &str,
        params: &Params,
        store: &S,
    ) -> Result<ReportResult, ReportError>
    where
        S: DataStore + ?Sized,
    {
        let definition = self.catalog.get(query_id)?;
        let request = self.planner.plan(definition, params)?;
        log::debug!(
            "dispatching {} as {} ({} joins, {} filters)",
            query_id,
            definition.computation.kind(),
            request.joins.len(),
            request.filters.len()
        );

        let raw = store.run(&request).map_err(|e| {
            log::warn!("data store failed on {}: {}", query_id, e);
            ReportError::data_store(e)
        })?;
        let rows = map_columns(&request.columns, raw).map_err(ReportError::data_store)?;
        log::debug!("{} returned {} rows", query_id, rows.len());

        Ok(ReportResult {
            query_id: query_id.to_string(),
            params: params.clone(),
            columns: request.columns,
            rows,
        })
    }
}

/// Reorder raw rows into the declared column order
fn map_columns(declared: &[String], raw: QueryResult) -> Result<Vec<Row>, StoreContractError> {
    let positions = declared
        .iter()
        .map(|column| {
            raw.column_index(column)
                .ok_or_else(|| StoreContractError::MissingColumn(column.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let width = raw.num_columns();
    raw.rows
        .into_iter()
        .enumerate()
        .map(|(idx, row)| {
            if row.values.len() != width {
                return Err(StoreContractError::RowWidth {
                    row: idx,
                    found: row.values.len(),
                    expected: width,
                });
            }
            let values = positions.iter().map(|p| row.values[*p].clone()).collect();
            Ok(Row::new(values))
        })
        .collect()
}
