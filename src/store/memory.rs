//! In-memory data store
//!
//! Executes computation requests directly over a validated [`Dataset`]:
//! hash joins along foreign keys, filters, grouping with exact decimal sums,
//! then the post-aggregation step, sort and limit.
//!
//! # Example
//!
//! ```rust
//! use pizza_reports::database::SampleData;
//! use pizza_reports::query::{CatalogRegistry, QueryPlanner};
//! use pizza_reports::store::{DataStore, MemoryStore};
//! use pizza_reports::types::Params;
//!
//! let store = MemoryStore::new(&SampleData::new(1).generate(50))?;
//! let definition = CatalogRegistry::global().get("revenue_by_size")?;
//! let request = QueryPlanner::new().plan(definition, &Params::new())?;
//! let rows = store.run(&request)?;
//! assert_eq!(rows.columns, vec!["pizza_size", "revenue"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::database::dataset::Dataset;
use crate::database::schema::{Entity, FieldRef, SchemaDescriptor};
use crate::error::DatasetError;
use crate::query::definition::{Aggregate, Expr};
use crate::query::planner::ComputationRequest;
use crate::store::{window, DataStore};
use crate::types::{DataType, QueryResult, Row, Table, Value};
use chrono::{NaiveDate, NaiveTime, Timelike};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

static NULL: Value = Value::Null;

/// Errors raised while executing a request in memory
#[derive(Debug, Error, PartialEq)]
pub enum MemoryStoreError {
    #[error("no table for entity {0}")]
    UnknownTable(Entity),

    #[error("unknown column {0}")]
    UnknownColumn(String),

    #[error("column {column} holds {found}, expected a number")]
    NotNumeric { column: String, found: String },

    #[error("arithmetic overflow computing {0}")]
    Overflow(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Data store over an in-memory dataset
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tables: HashMap<Entity, Table>,
}

impl MemoryStore {
    /// Build a store from a dataset, validating it first
    pub fn new(dataset: &Dataset) -> Result<Self, DatasetError> {
        dataset.validate()?;
        let store = Self::from_dataset(dataset);
        log::debug!(
            "memory store ready: {} orders, {} order lines",
            dataset.orders.len(),
            dataset.order_details.len()
        );
        Ok(store)
    }

    /// A store with no rows in any table
    pub fn empty() -> Self {
        Self::from_dataset(&Dataset::new())
    }

    fn from_dataset(dataset: &Dataset) -> Self {
        let tables = Entity::ALL
            .into_iter()
            .map(|entity| (entity, dataset.to_table(entity)))
            .collect();
        Self { tables }
    }

    pub fn table(&self, entity: Entity) -> Result<&Table, MemoryStoreError> {
        self.tables
            .get(&entity)
            .ok_or(MemoryStoreError::UnknownTable(entity))
    }

    fn locate(&self, field: &FieldRef) -> Result<Accessor, MemoryStoreError> {
        let index = self
            .table(field.entity)?
            .column_index(&field.field)
            .ok_or_else(|| MemoryStoreError::UnknownColumn(field.to_string()))?;
        Ok(Accessor {
            slot: slot(field.entity),
            index,
        })
    }

    fn compile(&self, expr: &Expr) -> Result<CompiledExpr, MemoryStoreError> {
        Ok(match expr {
            Expr::Field(f) => CompiledExpr::Field(self.locate(f)?),
            Expr::HourOf(f) => CompiledExpr::HourOf(self.locate(f)?),
            Expr::Product(a, b) => {
                CompiledExpr::Product(self.locate(a)?, self.locate(b)?, expr.to_string())
            }
        })
    }

    /// Base rows joined along the request's foreign keys
    fn join<'a>(
        &'a self,
        request: &ComputationRequest,
    ) -> Result<Vec<Joined<'a>>, MemoryStoreError> {
        let base = self.table(request.base)?;
        let mut rows: Vec<Joined<'a>> = base
            .rows
            .iter()
            .map(|row| {
                let mut joined = [None; 4];
                joined[slot(request.base)] = Some(row);
                joined
            })
            .collect();

        for join in &request.joins {
            let from = self.locate(&FieldRef::new(join.from, join.from_field.as_str()))?;
            let target = self.table(join.to)?;
            let key_field = FieldRef::new(join.to, join.to_field.as_str());
            let key_index = target
                .column_index(&join.to_field)
                .ok_or_else(|| MemoryStoreError::UnknownColumn(key_field.to_string()))?;

            let mut index: HashMap<IndexKey<'a>, &'a Row> =
                HashMap::with_capacity(target.rows.len());
            for row in &target.rows {
                if let Some(key) = row.values.get(key_index).and_then(IndexKey::from_value) {
                    index.entry(key).or_insert(row);
                }
            }

            let to = slot(join.to);
            rows = rows
                .into_iter()
                .filter_map(|mut joined| {
                    let matched = *index.get(&IndexKey::from_value(from.get(&joined))?)?;
                    joined[to] = Some(matched);
                    Some(joined)
                })
                .collect();
            log::trace!("joined {} -> {}: {} rows", join.from, join.to, rows.len());
        }

        Ok(rows)
    }
}

impl DataStore for MemoryStore {
    type Error = MemoryStoreError;

    fn run(&self, request: &ComputationRequest) -> Result<QueryResult, Self::Error> {
        let mut rows = self.join(request)?;

        let filters = request
            .filters
            .iter()
            .map(|f| -> Result<_, MemoryStoreError> { Ok((self.locate(&f.field)?, f)) })
            .collect::<Result<Vec<_>, _>>()?;
        rows.retain(|joined| filters.iter().all(|(accessor, f)| f.matches(accessor.get(joined))));

        let dimensions = request
            .group_by
            .iter()
            .map(|d| self.compile(&d.expr))
            .collect::<Result<Vec<_>, _>>()?;
        let schema = SchemaDescriptor::pizza_sales();
        let measures = request
            .aggregations
            .iter()
            .map(|m| -> Result<_, MemoryStoreError> {
                let output = m
                    .expr
                    .data_type(schema)
                    .and_then(|t| m.aggregate.output_type(t))
                    .map_err(|e| MemoryStoreError::InvalidRequest(e.to_string()))?;
                Ok((self.compile(&m.expr)?, m.aggregate, output, m.alias.as_str()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let fresh = || {
            measures
                .iter()
                .map(|(_, aggregate, output, _)| Accumulator::new(*aggregate, *output))
                .collect::<Vec<_>>()
        };

        // A request without grouping keys yields one row even over no input
        let mut groups: BTreeMap<Vec<GroupKey>, Vec<Accumulator>> = BTreeMap::new();
        if dimensions.is_empty() {
            groups.insert(Vec::new(), fresh());
        }
        for joined in &rows {
            let key = dimensions
                .iter()
                .map(|d| d.eval(joined).map(GroupKey))
                .collect::<Result<Vec<_>, _>>()?;
            let accumulators = groups.entry(key).or_insert_with(fresh);
            for (acc, (expr, _, _, alias)) in accumulators.iter_mut().zip(&measures) {
                acc.update(expr.eval(joined)?, alias)?;
            }
        }

        let columns = request
            .group_by
            .iter()
            .map(|d| d.alias.clone())
            .chain(request.aggregations.iter().map(|m| m.alias.clone()))
            .collect();
        let mut result = QueryResult::new(columns);
        for (key, accumulators) in groups {
            let values = key
                .into_iter()
                .map(|k| k.0)
                .chain(accumulators.into_iter().map(Accumulator::finish))
                .collect();
            result.add_row(Row::new(values));
        }
        log::trace!("{} rows grouped into {}", rows.len(), result.num_rows());

        if let Some(step) = &request.post {
            result = window::apply(result, step)?;
        }
        window::sort_rows(&mut result, &request.sort)?;
        if let Some(limit) = request.limit {
            result.rows.truncate(limit);
        }
        Ok(result)
    }
}

/// One base row with the rows it joined to, indexed by entity slot
type Joined<'a> = [Option<&'a Row>; 4];

fn slot(entity: Entity) -> usize {
    match entity {
        Entity::Orders => 0,
        Entity::OrderDetails => 1,
        Entity::Pizzas => 2,
        Entity::PizzaCategories => 3,
    }
}

#[derive(Debug, Clone, Copy)]
struct Accessor {
    slot: usize,
    index: usize,
}

impl Accessor {
    fn get<'a>(&self, joined: &Joined<'a>) -> &'a Value {
        joined[self.slot]
            .and_then(|row| row.values.get(self.index))
            .unwrap_or(&NULL)
    }
}

#[derive(Debug)]
enum CompiledExpr {
    Field(Accessor),
    HourOf(Accessor),
    Product(Accessor, Accessor, String),
}

impl CompiledExpr {
    fn eval(&self, joined: &Joined<'_>) -> Result<Value, MemoryStoreError> {
        match self {
            CompiledExpr::Field(a) => Ok(a.get(joined).clone()),
            CompiledExpr::HourOf(a) => match a.get(joined) {
                Value::Time(t) => Ok(Value::Integer(i64::from(t.hour()))),
                Value::Null => Ok(Value::Null),
                other => Err(MemoryStoreError::InvalidRequest(format!(
                    "hour of non-time value {}",
                    other
                ))),
            },
            CompiledExpr::Product(a, b, label) => a
                .get(joined)
                .checked_mul(b.get(joined))
                .ok_or_else(|| MemoryStoreError::Overflow(label.clone())),
        }
    }
}

/// Hashable join key borrowed from a table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IndexKey<'a> {
    Integer(i64),
    Decimal(i64),
    Text(&'a str),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl<'a> IndexKey<'a> {
    fn from_value(value: &'a Value) -> Option<Self> {
        match value {
            Value::Integer(v) => Some(IndexKey::Integer(*v)),
            Value::Decimal(v) => Some(IndexKey::Decimal(*v)),
            Value::Text(s) => Some(IndexKey::Text(s)),
            Value::Date(d) => Some(IndexKey::Date(*d)),
            Value::Time(t) => Some(IndexKey::Time(*t)),
            Value::Float(_) | Value::Null => None,
        }
    }
}

/// Value ordered by [`Value::total_cmp`], usable as a map key
#[derive(Debug, Clone)]
struct GroupKey(Value);

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GroupKey {}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Running state of one aggregate; NULL inputs are ignored
#[derive(Debug)]
enum Accumulator {
    Count(i64),
    CountDistinct(BTreeSet<GroupKey>),
    Sum(Value),
    Avg { sum: f64, count: u64 },
    Max(Value),
}

impl Accumulator {
    fn new(aggregate: Aggregate, output: DataType) -> Self {
        match aggregate {
            Aggregate::Count => Accumulator::Count(0),
            Aggregate::CountDistinct => Accumulator::CountDistinct(BTreeSet::new()),
            Aggregate::Sum => Accumulator::Sum(Value::zero(output)),
            Aggregate::Avg => Accumulator::Avg { sum: 0.0, count: 0 },
            Aggregate::Max => Accumulator::Max(Value::Null),
        }
    }

    fn update(&mut self, value: Value, alias: &str) -> Result<(), MemoryStoreError> {
        if value.is_null() {
            return Ok(());
        }
        let not_numeric = |value: &Value| MemoryStoreError::NotNumeric {
            column: alias.to_string(),
            found: value.to_string(),
        };
        match self {
            Accumulator::Count(n) => *n += 1,
            Accumulator::CountDistinct(seen) => {
                seen.insert(GroupKey(value));
            }
            Accumulator::Sum(total) => {
                if !value.data_type().map_or(false, |t| t.is_numeric()) {
                    return Err(not_numeric(&value));
                }
                *total = total
                    .checked_add(&value)
                    .ok_or_else(|| MemoryStoreError::Overflow(alias.to_string()))?;
            }
            Accumulator::Avg { sum, count } => {
                *sum += value.as_f64().ok_or_else(|| not_numeric(&value))?;
                *count += 1;
            }
            Accumulator::Max(max) => {
                if max.is_null() || value.total_cmp(max) == Ordering::Greater {
                    *max = value;
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self {
            Accumulator::Count(n) => Value::Integer(n),
            Accumulator::CountDistinct(seen) => Value::Integer(seen.len() as i64),
            Accumulator::Sum(total) => total,
            Accumulator::Avg { count: 0, .. } => Value::Null,
            Accumulator::Avg { sum, count } => Value::Float(sum / count as f64),
            Accumulator::Max(max) => max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::dataset::fixtures;
    use crate::database::schema::JoinOperation;
    use crate::query::definition::{CompareOp, Dimension, Measure, OrderKey};
    use crate::query::planner::FilterOperation;

    fn request(base: Entity) -> ComputationRequest {
        ComputationRequest {
            base,
            joins: vec![],
            filters: vec![],
            group_by: vec![],
            aggregations: vec![],
            post: None,
            sort: vec![],
            limit: None,
            columns: vec![],
        }
    }

    fn measure(alias: &str, aggregate: Aggregate, expr: Expr) -> Measure {
        Measure {
            alias: alias.to_string(),
            aggregate,
            expr,
        }
    }

    fn to_pizzas() -> JoinOperation {
        JoinOperation {
            from: Entity::OrderDetails,
            from_field: "pizza_id".to_string(),
            to: Entity::Pizzas,
            to_field: "pizza_id".to_string(),
        }
    }

    #[test]
    fn test_join_and_sum_revenue() {
        let store = MemoryStore::new(&fixtures::scenario()).unwrap();
        let mut req = request(Entity::OrderDetails);
        req.joins.push(to_pizzas());
        req.group_by.push(Dimension {
            alias: "pizza_name".to_string(),
            expr: Expr::field(Entity::Pizzas, "name"),
        });
        req.aggregations.push(measure(
            "revenue",
            Aggregate::Sum,
            Expr::product(
                FieldRef::new(Entity::OrderDetails, "quantity"),
                FieldRef::new(Entity::Pizzas, "price"),
            ),
        ));
        req.sort.push(OrderKey::desc("revenue"));

        let result = store.run(&req).unwrap();
        assert_eq!(result.columns, vec!["pizza_name", "revenue"]);
        assert_eq!(
            result.rows[0].values,
            vec![Value::Text("PizzaA".to_string()), Value::Decimal(3000)]
        );
        assert_eq!(
            result.rows[1].values,
            vec![Value::Text("PizzaB".to_string()), Value::Decimal(2000)]
        );
    }

    #[test]
    fn test_ungrouped_aggregates_over_no_rows() {
        let store = MemoryStore::new(&fixtures::menu_only()).unwrap();
        let mut req = request(Entity::OrderDetails);
        req.joins.push(to_pizzas());
        req.aggregations = vec![
            measure(
                "lines",
                Aggregate::Count,
                Expr::field(Entity::OrderDetails, "order_details_id"),
            ),
            measure(
                "qty",
                Aggregate::Sum,
                Expr::field(Entity::OrderDetails, "quantity"),
            ),
            measure(
                "price",
                Aggregate::Sum,
                Expr::field(Entity::Pizzas, "price"),
            ),
            measure(
                "avg_qty",
                Aggregate::Avg,
                Expr::field(Entity::OrderDetails, "quantity"),
            ),
            measure(
                "max_qty",
                Aggregate::Max,
                Expr::field(Entity::OrderDetails, "quantity"),
            ),
        ];

        let result = store.run(&req).unwrap();
        assert_eq!(result.num_rows(), 1);
        assert_eq!(
            result.rows[0].values,
            vec![
                Value::Integer(0),
                Value::Integer(0),
                Value::Decimal(0),
                Value::Null,
                Value::Null
            ]
        );
    }

    #[test]
    fn test_grouped_over_no_rows_is_empty() {
        let store = MemoryStore::empty();
        let mut req = request(Entity::Orders);
        req.group_by.push(Dimension {
            alias: "order_hour".to_string(),
            expr: Expr::hour_of(Entity::Orders, "order_time"),
        });
        req.aggregations
            .push(measure(
                "orders",
                Aggregate::Count,
                Expr::field(Entity::Orders, "order_id"),
            ));
        assert_eq!(store.run(&req).unwrap().num_rows(), 0);
    }

    #[test]
    fn test_filters_and_hour_grouping() {
        let store = MemoryStore::new(&fixtures::scenario()).unwrap();
        let mut req = request(Entity::Orders);
        req.filters.push(FilterOperation {
            field: FieldRef::new(Entity::Orders, "order_id"),
            op: CompareOp::Ge,
            value: Value::Integer(2),
        });
        req.group_by.push(Dimension {
            alias: "order_hour".to_string(),
            expr: Expr::hour_of(Entity::Orders, "order_time"),
        });
        req.aggregations
            .push(measure(
                "orders",
                Aggregate::Count,
                Expr::field(Entity::Orders, "order_id"),
            ));

        let result = store.run(&req).unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(
            result.rows[0].values,
            vec![Value::Integer(18), Value::Integer(1)]
        );
    }

    #[test]
    fn test_count_distinct_and_limit() {
        let store = MemoryStore::new(&fixtures::scenario()).unwrap();
        let mut req = request(Entity::OrderDetails);
        req.aggregations.push(measure(
            "orders",
            Aggregate::CountDistinct,
            Expr::field(Entity::OrderDetails, "order_id"),
        ));
        req.limit = Some(0);
        assert_eq!(store.run(&req).unwrap().num_rows(), 0);

        req.limit = None;
        let result = store.run(&req).unwrap();
        assert_eq!(result.rows[0].values, vec![Value::Integer(2)]);
    }

    #[test]
    fn test_unknown_field() {
        let store = MemoryStore::empty();
        let mut req = request(Entity::Pizzas);
        req.aggregations
            .push(measure(
                "x",
                Aggregate::Count,
                Expr::field(Entity::Pizzas, "topping"),
            ));
        assert!(matches!(store.run(&req), Err(MemoryStoreError::UnknownColumn(_))));
    }

    #[test]
    fn test_rejects_invalid_dataset() {
        let mut dataset = fixtures::scenario();
        dataset.order_details[0].pizza_id = "ghost".to_string();
        assert!(MemoryStore::new(&dataset).is_err());
    }
}
