//! Built-in reports
//!
//! The fifteen pizza-sales reports, grouped by tier. Ties on a ranking
//! measure are broken by the grouping key ascending, so every report has a
//! deterministic row order.

use crate::database::schema::{Entity, FieldRef};
use crate::query::definition::{
    Aggregate, Bound, CompareOp, Computation, Expr, Grouping, Limit, OrderKey, ParamKind,
    ParamSpec, QueryDefinition, Rollup, Tier,
};

const TOP_N: &str = "top_n";
const FROM_DATE: &str = "from_date";
const TO_DATE: &str = "to_date";

/// All built-in definitions in catalog order
pub fn definitions() -> Vec<QueryDefinition> {
    vec![
        total_orders(),
        total_revenue(),
        highest_priced_pizza(),
        most_common_size(),
        top_pizzas_by_quantity(),
        quantity_by_category(),
        orders_by_hour(),
        pizzas_per_category(),
        avg_pizzas_per_day(),
        top_pizzas_by_revenue(),
        revenue_by_size(),
        category_revenue_share(),
        pizza_revenue_share(),
        cumulative_revenue(),
        top_pizzas_per_category(),
    ]
}

fn revenue() -> Expr {
    Expr::product(
        FieldRef::new(Entity::OrderDetails, "quantity"),
        FieldRef::new(Entity::Pizzas, "price"),
    )
}

fn quantity() -> Expr {
    Expr::field(Entity::OrderDetails, "quantity")
}

fn pizza_name() -> Expr {
    Expr::field(Entity::Pizzas, "name")
}

fn category_name() -> Expr {
    Expr::field(Entity::PizzaCategories, "name")
}

/// Restrict to orders placed within `[from_date, to_date]`, both optional
fn within_dates(grouping: Grouping) -> Grouping {
    let order_date = FieldRef::new(Entity::Orders, "order_date");
    grouping
        .filter(
            order_date.clone(),
            CompareOp::Ge,
            Bound::Param(FROM_DATE.to_string()),
        )
        .filter(order_date, CompareOp::Le, Bound::Param(TO_DATE.to_string()))
}

fn with_date_range(definition: QueryDefinition) -> QueryDefinition {
    definition
        .with_param(ParamSpec::optional(
            FROM_DATE,
            ParamKind::Date,
            "first order date, inclusive",
        ))
        .with_param(ParamSpec::optional(
            TO_DATE,
            ParamKind::Date,
            "last order date, inclusive",
        ))
}

fn with_top_n(definition: QueryDefinition) -> QueryDefinition {
    definition.with_param(ParamSpec::required(
        TOP_N,
        ParamKind::PositiveInteger,
        "number of rows to keep",
    ))
}

// Basic

fn total_orders() -> QueryDefinition {
    with_date_range(QueryDefinition::new(
        "total_orders",
        Tier::Basic,
        "Total number of orders placed",
        Computation::SimpleAggregation {
            grouping: within_dates(Grouping::new(Entity::Orders)).measure(
                "total_orders",
                Aggregate::Count,
                Expr::field(Entity::Orders, "order_id"),
            ),
            order_by: vec![],
            limit: None,
        },
    ))
}

fn total_revenue() -> QueryDefinition {
    with_date_range(QueryDefinition::new(
        "total_revenue",
        Tier::Basic,
        "Total revenue from pizza sales",
        Computation::SimpleAggregation {
            grouping: within_dates(Grouping::new(Entity::OrderDetails)).measure(
                "total_revenue",
                Aggregate::Sum,
                revenue(),
            ),
            order_by: vec![],
            limit: None,
        },
    ))
}

fn highest_priced_pizza() -> QueryDefinition {
    QueryDefinition::new(
        "highest_priced_pizza",
        Tier::Basic,
        "Highest-priced pizza on the menu",
        Computation::SimpleAggregation {
            grouping: Grouping::new(Entity::Pizzas)
                .dimension("pizza_name", pizza_name())
                .measure(
                    "price",
                    Aggregate::Max,
                    Expr::field(Entity::Pizzas, "price"),
                ),
            order_by: vec![OrderKey::desc("price"), OrderKey::asc("pizza_name")],
            limit: Some(Limit::Fixed(1)),
        },
    )
}

fn most_common_size() -> QueryDefinition {
    QueryDefinition::new(
        "most_common_size",
        Tier::Basic,
        "Pizza size ordered most often",
        Computation::SimpleAggregation {
            grouping: Grouping::new(Entity::OrderDetails)
                .dimension("pizza_size", Expr::field(Entity::Pizzas, "size"))
                .measure(
                    "order_count",
                    Aggregate::Count,
                    Expr::field(Entity::OrderDetails, "order_details_id"),
                ),
            order_by: vec![OrderKey::desc("order_count"), OrderKey::asc("pizza_size")],
            limit: Some(Limit::Fixed(1)),
        },
    )
}

fn top_pizzas_by_quantity() -> QueryDefinition {
    with_top_n(QueryDefinition::new(
        "top_pizzas_by_quantity",
        Tier::Basic,
        "Most ordered pizzas by quantity",
        Computation::SimpleAggregation {
            grouping: Grouping::new(Entity::OrderDetails)
                .dimension("pizza_name", pizza_name())
                .measure("total_quantity", Aggregate::Sum, quantity()),
            order_by: vec![OrderKey::desc("total_quantity"), OrderKey::asc("pizza_name")],
            limit: Some(Limit::Param(TOP_N.to_string())),
        },
    ))
}

// Intermediate

fn quantity_by_category() -> QueryDefinition {
    QueryDefinition::new(
        "quantity_by_category",
        Tier::Intermediate,
        "Total quantity ordered per pizza category",
        Computation::SimpleAggregation {
            grouping: Grouping::new(Entity::OrderDetails)
                .dimension("category", category_name())
                .measure("total_quantity", Aggregate::Sum, quantity()),
            order_by: vec![OrderKey::desc("total_quantity"), OrderKey::asc("category")],
            limit: None,
        },
    )
}

fn orders_by_hour() -> QueryDefinition {
    QueryDefinition::new(
        "orders_by_hour",
        Tier::Intermediate,
        "Number of orders per hour of day",
        Computation::SimpleAggregation {
            grouping: Grouping::new(Entity::Orders)
                .dimension("order_hour", Expr::hour_of(Entity::Orders, "order_time"))
                .measure(
                    "order_count",
                    Aggregate::Count,
                    Expr::field(Entity::Orders, "order_id"),
                ),
            order_by: vec![OrderKey::asc("order_hour")],
            limit: None,
        },
    )
}

fn pizzas_per_category() -> QueryDefinition {
    QueryDefinition::new(
        "pizzas_per_category",
        Tier::Intermediate,
        "Number of distinct pizzas in each category",
        Computation::SimpleAggregation {
            grouping: Grouping::new(Entity::Pizzas)
                .dimension("category", category_name())
                .measure("pizza_count", Aggregate::CountDistinct, pizza_name()),
            order_by: vec![OrderKey::asc("category")],
            limit: None,
        },
    )
}

fn avg_pizzas_per_day() -> QueryDefinition {
    QueryDefinition::new(
        "avg_pizzas_per_day",
        Tier::Intermediate,
        "Average number of pizzas ordered per day",
        Computation::TwoLevelAggregation {
            grouping: Grouping::new(Entity::OrderDetails)
                .dimension("order_date", Expr::field(Entity::Orders, "order_date"))
                .measure("total_quantity", Aggregate::Sum, quantity()),
            rollup: Rollup::AverageOfGroups {
                measure: "total_quantity".to_string(),
                alias: "avg_pizzas_per_day".to_string(),
            },
            order_by: vec![],
        },
    )
}

fn top_pizzas_by_revenue() -> QueryDefinition {
    with_top_n(QueryDefinition::new(
        "top_pizzas_by_revenue",
        Tier::Intermediate,
        "Pizzas bringing in the most revenue",
        Computation::SimpleAggregation {
            grouping: Grouping::new(Entity::OrderDetails)
                .dimension("pizza_name", pizza_name())
                .measure("revenue", Aggregate::Sum, revenue()),
            order_by: vec![OrderKey::desc("revenue"), OrderKey::asc("pizza_name")],
            limit: Some(Limit::Param(TOP_N.to_string())),
        },
    ))
}

fn revenue_by_size() -> QueryDefinition {
    QueryDefinition::new(
        "revenue_by_size",
        Tier::Intermediate,
        "Revenue per pizza size",
        Computation::SimpleAggregation {
            grouping: Grouping::new(Entity::OrderDetails)
                .dimension("pizza_size", Expr::field(Entity::Pizzas, "size"))
                .measure("revenue", Aggregate::Sum, revenue()),
            order_by: vec![OrderKey::desc("revenue"), OrderKey::asc("pizza_size")],
            limit: None,
        },
    )
}

// Advanced

fn category_revenue_share() -> QueryDefinition {
    QueryDefinition::new(
        "category_revenue_share",
        Tier::Advanced,
        "Percentage of total revenue per pizza category",
        Computation::TwoLevelAggregation {
            grouping: Grouping::new(Entity::OrderDetails)
                .dimension("category", category_name())
                .measure("revenue", Aggregate::Sum, revenue()),
            rollup: Rollup::ShareOfTotal {
                measure: "revenue".to_string(),
                alias: "revenue_share".to_string(),
            },
            order_by: vec![OrderKey::desc("revenue"), OrderKey::asc("category")],
        },
    )
}

fn pizza_revenue_share() -> QueryDefinition {
    QueryDefinition::new(
        "pizza_revenue_share",
        Tier::Advanced,
        "Percentage of total revenue per pizza",
        Computation::TwoLevelAggregation {
            grouping: Grouping::new(Entity::OrderDetails)
                .dimension("pizza_name", pizza_name())
                .measure("revenue", Aggregate::Sum, revenue()),
            rollup: Rollup::ShareOfTotal {
                measure: "revenue".to_string(),
                alias: "revenue_share".to_string(),
            },
            order_by: vec![OrderKey::desc("revenue"), OrderKey::asc("pizza_name")],
        },
    )
}

fn cumulative_revenue() -> QueryDefinition {
    with_date_range(QueryDefinition::new(
        "cumulative_revenue",
        Tier::Advanced,
        "Revenue accumulated over time, by order date",
        Computation::RunningTotal {
            grouping: within_dates(Grouping::new(Entity::OrderDetails))
                .dimension("order_date", Expr::field(Entity::Orders, "order_date"))
                .measure("revenue", Aggregate::Sum, revenue()),
            order_column: "order_date".to_string(),
            measure: "revenue".to_string(),
            alias: "cum_revenue".to_string(),
        },
    ))
}

fn top_pizzas_per_category() -> QueryDefinition {
    with_top_n(QueryDefinition::new(
        "top_pizzas_per_category",
        Tier::Advanced,
        "Top pizzas by revenue within each category",
        Computation::PartitionedRank {
            grouping: Grouping::new(Entity::OrderDetails)
                .dimension("category", category_name())
                .dimension("pizza_name", pizza_name())
                .measure("revenue", Aggregate::Sum, revenue()),
            partition: "category".to_string(),
            item: "pizza_name".to_string(),
            measure: "revenue".to_string(),
            alias: "revenue_rank".to_string(),
            top: Limit::Param(TOP_N.to_string()),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_unique() {
        let defs = definitions();
        let ids: HashSet<&str> = defs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids.len(), defs.len());
        assert_eq!(defs.len(), 15);
    }

    #[test]
    fn test_top_n_reports_require_parameter() {
        for def in definitions() {
            let takes_top_n = def.param(TOP_N).is_some();
            let limited_by_param = matches!(
                &def.computation,
                Computation::SimpleAggregation { limit: Some(Limit::Param(_)), .. }
                    | Computation::PartitionedRank { top: Limit::Param(_), .. }
            );
            assert_eq!(takes_top_n, limited_by_param, "{}", def.id);
            if let Some(spec) = def.param(TOP_N) {
                assert!(spec.required, "{}", def.id);
            }
        }
    }

    #[test]
    fn test_ranked_reports_break_ties() {
        for def in definitions() {
            if let Computation::SimpleAggregation { order_by, grouping, .. } = &def.computation {
                let first_key = order_by.first().map(|k| k.column.as_str());
                if first_key == grouping.measures.first().map(|m| m.alias.as_str()) {
                    assert_eq!(order_by.len(), grouping.dimensions.len() + 1, "{}", def.id);
                }
            }
        }
    }

    #[test]
    fn test_date_filtered_reports() {
        let dated: Vec<String> = definitions()
            .into_iter()
            .filter(|d| d.param(FROM_DATE).is_some())
            .map(|d| d.id)
            .collect();
        assert_eq!(
            dated,
            vec!["total_orders", "total_revenue", "cumulative_revenue"]
        );
    }
}
