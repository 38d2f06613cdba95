//! Report definitions
//!
//! A [`QueryDefinition`] names one analytical report: its tier, its
//! parameter schema and a declarative [`Computation`]. Definitions are data;
//! the planner turns them into computation requests for a data store.
//!
//! # Example
//!
//! ```rust
//! use pizza_reports::database::{Entity, FieldRef};
//! use pizza_reports::query::definition::*;
//!
//! let definition = QueryDefinition::new(
//!     "quantity_by_size",
//!     Tier::Intermediate,
//!     "Pizzas sold per size",
//!     Computation::SimpleAggregation {
//!         grouping: Grouping::new(Entity::OrderDetails)
//!             .dimension("pizza_size", Expr::field(Entity::Pizzas, "size"))
//!             .measure(
//!                 "total_quantity",
//!                 Aggregate::Sum,
//!                 Expr::field(Entity::OrderDetails, "quantity"),
//!             ),
//!         order_by: vec![OrderKey::desc("total_quantity")],
//!         limit: None,
//!     },
//! );
//! assert_eq!(definition.columns(), vec!["pizza_size", "total_quantity"]);
//! ```

use crate::database::schema::{Entity, FieldRef, SchemaDescriptor};
use crate::error::ReportError;
use crate::types::{DataType, Params, Value};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Complexity classification of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Basic,
    Intermediate,
    Advanced,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Basic, Tier::Intermediate, Tier::Advanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic => "basic",
            Tier::Intermediate => "intermediate",
            Tier::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown tier {} (expected basic, intermediate or advanced)", s))
    }
}

/// Expected kind of a parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Integer greater than zero
    PositiveInteger,
    /// Calendar date
    Date,
}

impl ParamKind {
    /// Whether a bound value has this kind
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::PositiveInteger => matches!(value, Value::Integer(v) if *v > 0),
            ParamKind::Date => matches!(value, Value::Date(_)),
        }
    }

    /// Data type of the values this kind binds
    pub fn data_type(&self) -> DataType {
        match self {
            ParamKind::PositiveInteger => DataType::Integer,
            ParamKind::Date => DataType::Date,
        }
    }

    /// Parse a textual value, e.g. from a command line
    pub fn parse(&self, raw: &str) -> Option<Value> {
        let value = match self {
            ParamKind::PositiveInteger => Value::Integer(raw.trim().parse().ok()?),
            ParamKind::Date => Value::Date(NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()?),
        };
        self.accepts(&value).then_some(value)
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::PositiveInteger => f.write_str("positive integer"),
            ParamKind::Date => f.write_str("date (YYYY-MM-DD)"),
        }
    }
}

/// One entry of a parameter schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub description: String,
}

impl ParamSpec {
    pub fn required(
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: description.into(),
        }
    }

    pub fn optional(
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

/// Row-level expression over the joined entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// A field as stored
    Field(FieldRef),
    /// Hour of day (0-23) of a time field
    HourOf(FieldRef),
    /// Product of two numeric fields, e.g. quantity × price
    Product(FieldRef, FieldRef),
}

impl Expr {
    pub fn field(entity: Entity, field: &str) -> Self {
        Expr::Field(FieldRef::new(entity, field))
    }

    pub fn hour_of(entity: Entity, field: &str) -> Self {
        Expr::HourOf(FieldRef::new(entity, field))
    }

    pub fn product(left: FieldRef, right: FieldRef) -> Self {
        Expr::Product(left, right)
    }

    /// Fields this expression reads
    pub fn fields(&self) -> Vec<&FieldRef> {
        match self {
            Expr::Field(f) | Expr::HourOf(f) => vec![f],
            Expr::Product(a, b) => vec![a, b],
        }
    }

    /// Result type, checking field existence and operand types
    pub fn data_type(&self, schema: &SchemaDescriptor) -> Result<DataType, ReportError> {
        match self {
            Expr::Field(f) => Ok(schema.field(f)?.data_type),
            Expr::HourOf(f) => match schema.field(f)?.data_type {
                DataType::Time => Ok(DataType::Integer),
                other => Err(ReportError::SchemaMismatch(format!(
                    "hour of {} requires a time field, found {}",
                    f, other
                ))),
            },
            Expr::Product(a, b) => {
                let left = schema.field(a)?.data_type;
                let right = schema.field(b)?.data_type;
                match (left, right) {
                    (DataType::Integer, DataType::Integer) => Ok(DataType::Integer),
                    (DataType::Float, t) | (t, DataType::Float) if t.is_numeric() => {
                        Ok(DataType::Float)
                    }
                    (l, r) if l.is_numeric() && r.is_numeric() => Ok(DataType::Decimal),
                    (l, r) => Err(ReportError::SchemaMismatch(format!(
                        "cannot multiply {} ({}) by {} ({})",
                        a, l, b, r
                    ))),
                }
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Field(field) => write!(f, "{}", field),
            Expr::HourOf(field) => write!(f, "hour({})", field),
            Expr::Product(a, b) => write!(f, "{} * {}", a, b),
        }
    }
}

/// Aggregation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    Count,
    CountDistinct,
    Sum,
    Avg,
    Max,
}

impl Aggregate {
    /// Result type for an input of type `input`
    pub fn output_type(&self, input: DataType) -> Result<DataType, ReportError> {
        match self {
            Aggregate::Count | Aggregate::CountDistinct => Ok(DataType::Integer),
            Aggregate::Max => Ok(input),
            Aggregate::Sum if input.is_numeric() => Ok(input),
            Aggregate::Avg if input.is_numeric() => Ok(DataType::Float),
            _ => Err(ReportError::SchemaMismatch(format!(
                "{:?} is not defined for {} values",
                self, input
            ))),
        }
    }
}

/// Grouping key of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub alias: String,
    pub expr: Expr,
}

/// Aggregated value of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    pub alias: String,
    pub aggregate: Aggregate,
    pub expr: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// Sort key over an output column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderKey {
    pub column: String,
    pub direction: Direction,
}

impl OrderKey {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: Direction::Desc,
        }
    }
}

/// Row count limit, fixed or taken from a parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Limit {
    Fixed(usize),
    Param(String),
}

/// Right-hand side of a filter, fixed or taken from a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    Fixed(Value),
    Param(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Row filter; a filter bound to an absent optional parameter is skipped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDef {
    pub field: FieldRef,
    pub op: CompareOp,
    pub bound: Bound,
}

/// Base entity, filters, grouping keys and measures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grouping {
    pub base: Entity,
    pub filters: Vec<FilterDef>,
    pub dimensions: Vec<Dimension>,
    pub measures: Vec<Measure>,
}

impl Grouping {
    pub fn new(base: Entity) -> Self {
        Self {
            base,
            filters: Vec::new(),
            dimensions: Vec::new(),
            measures: Vec::new(),
        }
    }

    pub fn filter(mut self, field: FieldRef, op: CompareOp, bound: Bound) -> Self {
        self.filters.push(FilterDef { field, op, bound });
        self
    }

    pub fn dimension(mut self, alias: &str, expr: Expr) -> Self {
        self.dimensions.push(Dimension {
            alias: alias.to_string(),
            expr,
        });
        self
    }

    pub fn measure(mut self, alias: &str, aggregate: Aggregate, expr: Expr) -> Self {
        self.measures.push(Measure {
            alias: alias.to_string(),
            aggregate,
            expr,
        });
        self
    }

    /// Output columns of the grouping step: dimensions, then measures
    pub fn columns(&self) -> Vec<String> {
        self.dimensions
            .iter()
            .map(|d| d.alias.clone())
            .chain(self.measures.iter().map(|m| m.alias.clone()))
            .collect()
    }
}

/// Second aggregation level over the per-group results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rollup {
    /// Mean of `measure` across all groups; a single row
    AverageOfGroups { measure: String, alias: String },
    /// Each group's `measure` as a percentage of the sum over all groups
    ShareOfTotal { measure: String, alias: String },
}

/// Declarative description of what a report computes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Computation {
    /// Group, aggregate, order and optionally limit
    SimpleAggregation {
        grouping: Grouping,
        order_by: Vec<OrderKey>,
        limit: Option<Limit>,
    },
    /// Group and aggregate, then aggregate the groups again
    TwoLevelAggregation {
        grouping: Grouping,
        rollup: Rollup,
        order_by: Vec<OrderKey>,
    },
    /// Running sum of `measure` ordered by the `order_column` dimension
    RunningTotal {
        grouping: Grouping,
        order_column: String,
        measure: String,
        alias: String,
    },
    /// Top items by `measure` within each `partition`
    PartitionedRank {
        grouping: Grouping,
        partition: String,
        item: String,
        measure: String,
        alias: String,
        top: Limit,
    },
}

impl Computation {
    pub fn grouping(&self) -> &Grouping {
        match self {
            Computation::SimpleAggregation { grouping, .. }
            | Computation::TwoLevelAggregation { grouping, .. }
            | Computation::RunningTotal { grouping, .. }
            | Computation::PartitionedRank { grouping, .. } => grouping,
        }
    }

    /// Short name of the computation variant
    pub fn kind(&self) -> &'static str {
        match self {
            Computation::SimpleAggregation { .. } => "simple_aggregation",
            Computation::TwoLevelAggregation { .. } => "two_level_aggregation",
            Computation::RunningTotal { .. } => "running_total",
            Computation::PartitionedRank { .. } => "partitioned_rank",
        }
    }

    /// Output columns in declared order
    pub fn columns(&self) -> Vec<String> {
        let mut columns = self.grouping().columns();
        match self {
            Computation::SimpleAggregation { .. } => {}
            Computation::TwoLevelAggregation { rollup, .. } => match rollup {
                Rollup::AverageOfGroups { alias, .. } => columns = vec![alias.clone()],
                Rollup::ShareOfTotal { alias, .. } => columns.push(alias.clone()),
            },
            Computation::RunningTotal { alias, .. }
            | Computation::PartitionedRank { alias, .. } => columns.push(alias.clone()),
        }
        columns
    }
}

/// One named analytical report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDefinition {
    pub id: String,
    pub tier: Tier,
    pub description: String,
    pub params: Vec<ParamSpec>,
    pub computation: Computation,
}

impl QueryDefinition {
    pub fn new(id: &str, tier: Tier, description: &str, computation: Computation) -> Self {
        Self {
            id: id.to_string(),
            tier,
            description: description.to_string(),
            params: Vec::new(),
            computation,
        }
    }

    /// Declare a parameter
    pub fn with_param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Output columns in declared order
    pub fn columns(&self) -> Vec<String> {
        self.computation.columns()
    }

    /// Check bound parameters against the parameter schema
    ///
    /// Every offending name is reported, not just the first.
    pub fn validate_params(&self, params: &Params) -> Result<(), ReportError> {
        let mut missing = Vec::new();
        let mut mistyped = Vec::new();
        let mut unknown = Vec::new();

        for spec in &self.params {
            match params.get(&spec.name) {
                None if spec.required => missing.push(spec.name.clone()),
                None => {}
                Some(value) if !spec.kind.accepts(value) => mistyped.push(spec.name.clone()),
                Some(_) => {}
            }
        }
        for (name, _) in params.iter() {
            if self.param(name).is_none() {
                unknown.push(name.clone());
            }
        }

        let mut reasons = Vec::new();
        if !missing.is_empty() {
            reasons.push(format!("missing required {}", missing.join(", ")));
        }
        if !mistyped.is_empty() {
            let expected: Vec<String> = mistyped
                .iter()
                .filter_map(|name| self.param(name))
                .map(|spec| format!("{} must be a {}", spec.name, spec.kind))
                .collect();
            reasons.push(expected.join(", "));
        }
        if !unknown.is_empty() {
            reasons.push(format!(
                "not accepted by {}: {}",
                self.id,
                unknown.join(", ")
            ));
        }
        if reasons.is_empty() {
            return Ok(());
        }

        let names = missing.into_iter().chain(mistyped).chain(unknown).collect();
        Err(ReportError::InvalidParameter {
            names,
            reason: reasons.join("; "),
        })
    }

    /// Parse textual `name=value` assignments using the parameter schema
    pub fn parse_params<I, K, V>(&self, assignments: I) -> Result<Params, ReportError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Params::new();
        let mut bad = Vec::new();
        for (name, raw) in assignments {
            let name = name.as_ref();
            match self.param(name).and_then(|spec| spec.kind.parse(raw.as_ref())) {
                Some(value) => params.insert(name, value),
                None => bad.push(name.to_string()),
            }
        }
        if !bad.is_empty() {
            return Err(ReportError::InvalidParameter {
                reason: format!("unknown or malformed for {}", self.id),
                names: bad,
            });
        }
        Ok(params)
    }

    /// Serializable listing record
    pub fn summary(&self) -> CatalogEntry {
        CatalogEntry {
            id: self.id.clone(),
            tier: self.tier,
            description: self.description.clone(),
            parameter_schema: self.params.clone(),
        }
    }
}

/// Catalog listing record: `{id, tier, description, parameter_schema}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub tier: Tier,
    pub description: String,
    pub parameter_schema: Vec<ParamSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn top_sizes() -> QueryDefinition {
        QueryDefinition::new(
            "top_sizes",
            Tier::Basic,
            "Most ordered sizes",
            Computation::SimpleAggregation {
                grouping: Grouping::new(Entity::OrderDetails)
                    .dimension("pizza_size", Expr::field(Entity::Pizzas, "size"))
                    .measure(
                        "line_count",
                        Aggregate::Count,
                        Expr::field(Entity::OrderDetails, "order_details_id"),
                    ),
                order_by: vec![OrderKey::desc("line_count")],
                limit: Some(Limit::Param("top_n".to_string())),
            },
        )
        .with_param(ParamSpec::required(
            "top_n",
            ParamKind::PositiveInteger,
            "rows to keep",
        ))
        .with_param(ParamSpec::optional(
            "from_date",
            ParamKind::Date,
            "first day",
        ))
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!("Advanced".parse::<Tier>(), Ok(Tier::Advanced));
        assert!("expert".parse::<Tier>().is_err());
    }

    #[test]
    fn test_param_kind_parse() {
        assert_eq!(
            ParamKind::PositiveInteger.parse("3"),
            Some(Value::Integer(3))
        );
        assert_eq!(ParamKind::PositiveInteger.parse("0"), None);
        assert_eq!(ParamKind::PositiveInteger.parse("-2"), None);
        assert!(ParamKind::Date.parse("2015-02-28").is_some());
        assert_eq!(ParamKind::Date.parse("2015-02-30"), None);
    }

    #[test]
    fn test_validate_params_ok() {
        let definition = top_sizes();
        assert!(definition.validate_params(&Params::new().with("top_n", 2)).is_ok());
    }

    #[test]
    fn test_validate_params_missing() {
        let err = top_sizes().validate_params(&Params::new()).unwrap_err();
        match err {
            ReportError::InvalidParameter { names, .. } => assert_eq!(names, vec!["top_n"]),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_validate_params_collects_every_offender() {
        let params = Params::new()
            .with("top_n", 0)
            .with("from_date", "yesterday")
            .with("colour", "red");
        let err = top_sizes().validate_params(&params).unwrap_err();
        match err {
            ReportError::InvalidParameter { names, reason } => {
                assert_eq!(names, vec!["top_n", "from_date", "colour"]);
                assert!(reason.contains("top_n must be a positive integer"));
                assert!(reason.contains("not accepted by top_sizes: colour"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_parse_params() {
        let definition = top_sizes();
        let params = definition
            .parse_params([("top_n", "4"), ("from_date", "2015-03-01")])
            .unwrap();
        assert_eq!(params.get("top_n"), Some(&Value::Integer(4)));

        let err = definition.parse_params([("top_n", "four")]).unwrap_err();
        assert_eq!(err.kind(), "InvalidParameter");
    }

    #[test]
    fn test_expr_types() {
        let schema = SchemaDescriptor::pizza_sales();
        let revenue = Expr::product(
            FieldRef::new(Entity::OrderDetails, "quantity"),
            FieldRef::new(Entity::Pizzas, "price"),
        );
        assert_eq!(revenue.data_type(schema).unwrap(), DataType::Decimal);
        assert_eq!(
            Expr::hour_of(Entity::Orders, "order_time").data_type(schema).unwrap(),
            DataType::Integer
        );
        assert!(Expr::hour_of(Entity::Orders, "order_date").data_type(schema).is_err());
        assert!(Expr::product(
            FieldRef::new(Entity::Pizzas, "name"),
            FieldRef::new(Entity::Pizzas, "price"),
        )
        .data_type(schema)
        .is_err());
    }

    #[test]
    fn test_aggregate_output_types() {
        assert_eq!(
            Aggregate::Sum.output_type(DataType::Decimal).unwrap(),
            DataType::Decimal
        );
        assert_eq!(
            Aggregate::Avg.output_type(DataType::Integer).unwrap(),
            DataType::Float
        );
        assert_eq!(
            Aggregate::CountDistinct.output_type(DataType::Text).unwrap(),
            DataType::Integer
        );
        assert!(Aggregate::Sum.output_type(DataType::Text).is_err());
    }

    #[test]
    fn test_columns_per_computation() {
        let grouping = Grouping::new(Entity::OrderDetails)
            .dimension("order_date", Expr::field(Entity::Orders, "order_date"))
            .measure(
                "pizzas",
                Aggregate::Sum,
                Expr::field(Entity::OrderDetails, "quantity"),
            );

        let average = Computation::TwoLevelAggregation {
            grouping: grouping.clone(),
            rollup: Rollup::AverageOfGroups {
                measure: "pizzas".to_string(),
                alias: "avg_pizzas".to_string(),
            },
            order_by: vec![],
        };
        assert_eq!(average.columns(), vec!["avg_pizzas"]);
        assert_eq!(average.kind(), "two_level_aggregation");

        let running = Computation::RunningTotal {
            grouping,
            order_column: "order_date".to_string(),
            measure: "pizzas".to_string(),
            alias: "cum_pizzas".to_string(),
        };
        assert_eq!(
            running.columns(),
            vec!["order_date", "pizzas", "cum_pizzas"]
        );
        assert_eq!(running.kind(), "running_total");
    }
}
