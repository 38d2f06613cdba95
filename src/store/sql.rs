//! SQL rendering
//!
//! Renders a [`ComputationRequest`] as one MySQL `SELECT` statement, for
//! data stores backed by a relational database. Post-aggregation steps
//! become window functions over a per-group subquery.
//!
//! # Example
//!
//! ```rust
//! use pizza_reports::query::{CatalogRegistry, QueryPlanner};
//! use pizza_reports::store::SqlRenderer;
//! use pizza_reports::types::Params;
//!
//! let definition = CatalogRegistry::global().get("total_revenue")?;
//! let request = QueryPlanner::new().plan(definition, &Params::new())?;
//! let sql = SqlRenderer::new().render_checked(&request)?;
//! assert!(sql.starts_with("SELECT COALESCE(SUM("));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::database::schema::FieldRef;
use crate::query::definition::{Aggregate, Direction, Expr, OrderKey};
use crate::query::planner::{ComputationRequest, PostAggregation};
use crate::types::Value;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::{Parser, ParserError};
use thiserror::Error;

/// Rendered SQL that fails to parse back
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("rendered SQL does not parse: {0}")]
    Parse(#[from] ParserError),

    #[error("expected exactly one SQL statement, found {0}")]
    StatementCount(usize),
}

/// MySQL renderer for computation requests
#[derive(Debug)]
pub struct SqlRenderer {
    /// Dialect used to check rendered statements
    dialect: MySqlDialect,
}

impl SqlRenderer {
    pub fn new() -> Self {
        Self {
            dialect: MySqlDialect {},
        }
    }

    /// Render a request as a single `SELECT` statement
    pub fn render(&self, request: &ComputationRequest) -> String {
        let grouped = grouped_select(request);
        let per_group = |extra: String| {
            let mut items: Vec<String> = request
                .group_by
                .iter()
                .map(|d| quote(&d.alias))
                .chain(request.aggregations.iter().map(|m| quote(&m.alias)))
                .collect();
            items.push(extra);
            format!(
                "SELECT {} FROM ({}) AS per_group",
                items.join(", "),
                grouped
            )
        };

        let mut sql = match &request.post {
            None => grouped.clone(),
            Some(PostAggregation::AverageOfGroups { measure, alias }) => format!(
                "SELECT AVG({}) AS {} FROM ({}) AS per_group",
                quote(measure),
                quote(alias),
                grouped
            ),
            Some(PostAggregation::ShareOfTotal { measure, alias }) => per_group(format!(
                "{m} * 100 / SUM({m}) OVER () AS {}",
                quote(alias),
                m = quote(measure)
            )),
            Some(PostAggregation::RunningTotal {
                order_column,
                measure,
                alias,
            }) => per_group(format!(
                "SUM({}) OVER (ORDER BY {}) AS {}",
                quote(measure),
                quote(order_column),
                quote(alias)
            )),
            Some(PostAggregation::RankWithin {
                partition,
                item,
                measure,
                alias,
                keep_top,
            }) => format!(
                "SELECT * FROM ({}) AS ranked WHERE {} <= {}",
                per_group(format!(
                    "DENSE_RANK() OVER (PARTITION BY {} ORDER BY {} DESC, {} ASC) AS {}",
                    quote(partition),
                    quote(measure),
                    quote(item),
                    quote(alias)
                )),
                quote(alias),
                keep_top
            ),
        };

        if !request.sort.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_by(&request.sort));
        }
        if let Some(limit) = request.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        sql
    }

    /// Render and parse the statement back with the MySQL dialect
    pub fn render_checked(&self, request: &ComputationRequest) -> Result<String, RenderError> {
        let sql = self.render(request);
        let statements = Parser::parse_sql(&self.dialect, &sql)?;
        if statements.len() != 1 {
            return Err(RenderError::StatementCount(statements.len()));
        }
        Ok(sql)
    }
}

impl Default for SqlRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Joins, filters, grouping and aggregation, without ordering
fn grouped_select(request: &ComputationRequest) -> String {
    let mut items: Vec<String> = request
        .group_by
        .iter()
        .map(|d| format!("{} AS {}", expr(&d.expr), quote(&d.alias)))
        .collect();
    for measure in &request.aggregations {
        let inner = expr(&measure.expr);
        let call = match measure.aggregate {
            Aggregate::Count => format!("COUNT({})", inner),
            Aggregate::CountDistinct => format!("COUNT(DISTINCT {})", inner),
            // SUM over no rows is NULL in SQL; ungrouped totals read as zero
            Aggregate::Sum if request.group_by.is_empty() => format!("COALESCE(SUM({}), 0)", inner),
            Aggregate::Sum => format!("SUM({})", inner),
            Aggregate::Avg => format!("AVG({})", inner),
            Aggregate::Max => format!("MAX({})", inner),
        };
        items.push(format!("{} AS {}", call, quote(&measure.alias)));
    }

    let mut sql = format!(
        "SELECT {} FROM {}",
        items.join(", "),
        quote(request.base.table_name())
    );
    for join in &request.joins {
        sql.push_str(&format!(
            " JOIN {to} ON {}.{} = {to}.{}",
            quote(join.from.table_name()),
            quote(&join.from_field),
            quote(&join.to_field),
            to = quote(join.to.table_name()),
        ));
    }
    if !request.filters.is_empty() {
        let conditions: Vec<String> = request
            .filters
            .iter()
            .map(|f| format!("{} {} {}", field(&f.field), f.op.symbol(), literal(&f.value)))
            .collect();
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    if !request.group_by.is_empty() {
        let keys: Vec<String> = request.group_by.iter().map(|d| expr(&d.expr)).collect();
        sql.push_str(" GROUP BY ");
        sql.push_str(&keys.join(", "));
    }
    sql
}

fn order_by(keys: &[OrderKey]) -> String {
    keys.iter()
        .map(|key| {
            let direction = match key.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            format!("{} {}", quote(&key.column), direction)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn expr(expr: &Expr) -> String {
    match expr {
        Expr::Field(f) => field(f),
        Expr::HourOf(f) => format!("HOUR({})", field(f)),
        Expr::Product(a, b) => format!("{} * {}", field(a), field(b)),
    }
}

fn field(field: &FieldRef) -> String {
    format!(
        "{}.{}",
        quote(field.entity.table_name()),
        quote(&field.field)
    )
}

fn quote(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

fn literal(value: &Value) -> String {
    match value {
        Value::Integer(_) | Value::Decimal(_) => value.to_string(),
        Value::Float(v) => format!("{:?}", v),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Date(_) | Value::Time(_) => format!("'{}'", value),
        Value::Null => "NULL".to_string(),
    }
}
