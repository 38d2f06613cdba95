//! Computation request planning
//!
//! This module turns a report definition and its bound parameters into a
//! [`ComputationRequest`]: the structured request a data store executes.
//!
//! # Example
//!
//! ```rust
//! use pizza_reports::query::{CatalogRegistry, QueryPlanner};
//! use pizza_reports::types::Params;
//!
//! let definition = CatalogRegistry::global().get("top_pizzas_by_revenue")?;
//! let planner = QueryPlanner::new();
//! let request = planner.plan(definition, &Params::new().with("top_n", 3))?;
//! assert_eq!(request.limit, Some(3));
//! # Ok::<(), pizza_reports::ReportError>(())
//! ```

use crate::database::schema::{Entity, FieldRef, JoinOperation, SchemaDescriptor};
use crate::error::ReportError;
use crate::query::definition::{
    Bound, CompareOp, Computation, Dimension, Limit, Measure, OrderKey, QueryDefinition, Rollup,
};
use crate::types::{DataType, Params, Value};
use serde::{Deserialize, Serialize};

/// Structured request sent to a data store
///
/// Semantics, in order: join `base` along `joins`, keep rows passing every
/// filter, group by `group_by` and compute `aggregations` (one row when
/// there are no grouping keys, even over no input), apply `post`, sort by
/// `sort`, then keep at most `limit` rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationRequest {
    /// Entity whose rows are scanned
    pub base: Entity,

    /// Many-to-one joins reachable from the base entity
    pub joins: Vec<JoinOperation>,

    /// Row filters with bound values
    pub filters: Vec<FilterOperation>,

    /// Grouping keys
    pub group_by: Vec<Dimension>,

    /// Aggregations per group
    pub aggregations: Vec<Measure>,

    /// Step applied to the per-group rows
    pub post: Option<PostAggregation>,

    /// Sort keys over output columns
    pub sort: Vec<OrderKey>,

    /// Maximum number of rows
    pub limit: Option<usize>,

    /// Output columns in report order
    pub columns: Vec<String>,
}

/// Filter with its value bound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOperation {
    pub field: FieldRef,
    pub op: CompareOp,
    pub value: Value,
}

impl FilterOperation {
    /// Evaluate against a field value; NULL never passes
    pub fn matches(&self, value: &Value) -> bool {
        if value.is_null() || self.value.is_null() {
            return false;
        }
        let ordering = value.total_cmp(&self.value);
        match self.op {
            CompareOp::Eq => ordering.is_eq(),
            CompareOp::Lt => ordering.is_lt(),
            CompareOp::Le => ordering.is_le(),
            CompareOp::Gt => ordering.is_gt(),
            CompareOp::Ge => ordering.is_ge(),
        }
    }
}

/// Post-aggregation step over the grouped rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostAggregation {
    /// Collapse to one row: the mean of `measure` over all groups
    AverageOfGroups { measure: String, alias: String },

    /// Add `alias` = `measure` × 100 ÷ (sum of `measure` over all groups)
    ShareOfTotal { measure: String, alias: String },

    /// Add `alias` = running sum of `measure` ordered by `order_column`
    /// ascending; rows with equal keys share the total through the last of them
    RunningTotal {
        order_column: String,
        measure: String,
        alias: String,
    },

    /// Add `alias` = dense rank of each row within its `partition` by
    /// `measure` descending then `item` ascending; keep rank ≤ `keep_top`
    RankWithin {
        partition: String,
        item: String,
        measure: String,
        alias: String,
        keep_top: usize,
    },
}

/// Query planner
///
/// Validates a definition against bound parameters and the schema, and
/// builds the computation request.
#[derive(Debug, Clone, Copy)]
pub struct QueryPlanner {
    schema: &'static SchemaDescriptor,
}

impl QueryPlanner {
    /// Create a planner over the pizza-sales schema
    pub fn new() -> Self {
        Self::with_schema(SchemaDescriptor::pizza_sales())
    }

    pub fn with_schema(schema: &'static SchemaDescriptor) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &'static SchemaDescriptor {
        self.schema
    }

    /// Plan a definition with bound parameters
    ///
    /// Parameters are checked first, so a bad parameter is always reported
    /// as `InvalidParameter`.
    pub fn plan(
        &self,
        definition: &QueryDefinition,
        params: &Params,
    ) -> Result<ComputationRequest, ReportError> {
        definition.validate_params(params)?;

        let grouping = definition.computation.grouping();
        self.check_grouping(definition)?;

        let mut filters = Vec::new();
        for filter in &grouping.filters {
            let value = match &filter.bound {
                Bound::Fixed(value) => value.clone(),
                Bound::Param(name) => match params.get(name) {
                    Some(value) => value.clone(),
                    None => continue,
                },
            };
            filters.push(FilterOperation {
                field: filter.field.clone(),
                op: filter.op,
                value,
            });
        }

        let mut entities: Vec<Entity> = Vec::new();
        let referenced = filters
            .iter()
            .map(|f| &f.field)
            .chain(grouping.dimensions.iter().flat_map(|d| d.expr.fields()))
            .chain(grouping.measures.iter().flat_map(|m| m.expr.fields()));
        for field in referenced {
            if field.entity != grouping.base && !entities.contains(&field.entity) {
                entities.push(field.entity);
            }
        }
        let joins = self.schema.resolve_joins(grouping.base, entities)?;

        let (post, sort, limit) = match &definition.computation {
            Computation::SimpleAggregation { order_by, limit, .. } => {
                let limit = limit.as_ref().map(|l| resolve_limit(l, params)).transpose()?;
                (None, order_by.clone(), limit)
            }
            Computation::TwoLevelAggregation { rollup, order_by, .. } => {
                let post = match rollup {
                    Rollup::AverageOfGroups { measure, alias } => PostAggregation::AverageOfGroups {
                        measure: measure.clone(),
                        alias: alias.clone(),
                    },
                    Rollup::ShareOfTotal { measure, alias } => PostAggregation::ShareOfTotal {
                        measure: measure.clone(),
                        alias: alias.clone(),
                    },
                };
                (Some(post), order_by.clone(), None)
            }
            Computation::RunningTotal {
                order_column,
                measure,
                alias,
                ..
            } => (
                Some(PostAggregation::RunningTotal {
                    order_column: order_column.clone(),
                    measure: measure.clone(),
                    alias: alias.clone(),
                }),
                vec![OrderKey::asc(order_column)],
                None,
            ),
            Computation::PartitionedRank {
                partition,
                item,
                measure,
                alias,
                top,
                ..
            } => (
                Some(PostAggregation::RankWithin {
                    partition: partition.clone(),
                    item: item.clone(),
                    measure: measure.clone(),
                    alias: alias.clone(),
                    keep_top: resolve_limit(top, params)?,
                }),
                vec![OrderKey::asc(partition), OrderKey::asc(alias)],
                None,
            ),
        };

        Ok(ComputationRequest {
            base: grouping.base,
            joins,
            filters,
            group_by: grouping.dimensions.clone(),
            aggregations: grouping.measures.clone(),
            post,
            sort,
            limit,
            columns: definition.columns(),
        })
    }

    /// Check field references, expression types and column references
    fn check_grouping(&self, definition: &QueryDefinition) -> Result<(), ReportError> {
        let computation = &definition.computation;
        let grouping = computation.grouping();
        let mismatch = |message: String| {
            ReportError::SchemaMismatch(format!("{}: {}", definition.id, message))
        };

        for filter in &grouping.filters {
            let field = self.schema.field(&filter.field)?;
            let bound_type = match &filter.bound {
                Bound::Fixed(value) => value.data_type(),
                Bound::Param(name) => match definition.param(name) {
                    Some(spec) => Some(spec.kind.data_type()),
                    None => {
                        return Err(mismatch(format!(
                            "filter on {} uses undeclared parameter {}",
                            filter.field, name
                        )))
                    }
                },
            };
            if bound_type != Some(field.data_type) {
                return Err(mismatch(format!(
                    "filter value for {} is not {}",
                    filter.field, field.data_type
                )));
            }
        }

        let mut column_types: Vec<(String, DataType)> = Vec::new();
        for dimension in &grouping.dimensions {
            column_types.push((dimension.alias.clone(), dimension.expr.data_type(self.schema)?));
        }
        for measure in &grouping.measures {
            let input = measure.expr.data_type(self.schema)?;
            column_types.push((measure.alias.clone(), measure.aggregate.output_type(input)?));
        }
        for (idx, (alias, _)) in column_types.iter().enumerate() {
            if column_types[..idx].iter().any(|(other, _)| other == alias) {
                return Err(mismatch(format!("duplicate column {}", alias)));
            }
        }

        let type_of = |column: &str| -> Result<DataType, ReportError> {
            column_types
                .iter()
                .find(|(alias, _)| alias == column)
                .map(|(_, data_type)| *data_type)
                .ok_or_else(|| mismatch(format!("unknown column {}", column)))
        };
        let numeric = |column: &str| -> Result<(), ReportError> {
            match type_of(column)? {
                t if t.is_numeric() => Ok(()),
                t => Err(mismatch(format!(
                    "column {} is {}, expected a number",
                    column, t
                ))),
            }
        };

        match computation {
            Computation::SimpleAggregation { limit, .. } => {
                if let Some(Limit::Param(name)) = limit {
                    self.check_limit_param(definition, name)?;
                }
            }
            Computation::TwoLevelAggregation { rollup, .. } => match rollup {
                Rollup::AverageOfGroups { measure, .. } | Rollup::ShareOfTotal { measure, .. } => {
                    numeric(measure.as_str())?
                }
            },
            Computation::RunningTotal {
                order_column, measure, ..
            } => {
                type_of(order_column.as_str())?;
                numeric(measure.as_str())?;
            }
            Computation::PartitionedRank {
                partition,
                item,
                measure,
                top,
                ..
            } => {
                type_of(partition.as_str())?;
                type_of(item.as_str())?;
                numeric(measure.as_str())?;
                if let Limit::Param(name) = top {
                    self.check_limit_param(definition, name)?;
                }
            }
        }

        let columns = computation.columns();
        let order_by: &[OrderKey] = match computation {
            Computation::SimpleAggregation { order_by, .. }
            | Computation::TwoLevelAggregation { order_by, .. } => order_by.as_slice(),
            _ => &[],
        };
        for key in order_by {
            if !columns.contains(&key.column) {
                return Err(mismatch(format!(
                    "cannot order by unknown column {}",
                    key.column
                )));
            }
        }

        Ok(())
    }

    fn check_limit_param(
        &self,
        definition: &QueryDefinition,
        name: &str,
    ) -> Result<(), ReportError> {
        match definition.param(name) {
            Some(spec) if spec.required => Ok(()),
            _ => Err(ReportError::SchemaMismatch(format!(
                "{}: limit parameter {} must be declared as required",
                definition.id, name
            ))),
        }
    }
}

impl Default for QueryPlanner {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_limit(limit: &Limit, params: &Params) -> Result<usize, ReportError> {
    let invalid = |name: &str| ReportError::InvalidParameter {
        names: vec![name.to_string()],
        reason: format!("{} must be a positive integer", name),
    };
    match limit {
        Limit::Fixed(n) => Ok(*n),
        Limit::Param(name) => params
            .get(name)
            .and_then(Value::as_i64)
            .filter(|n| *n > 0)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| invalid(name)),
    }
}
