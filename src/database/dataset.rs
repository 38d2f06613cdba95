//! Typed pizza-sales dataset
//!
//! Holds the four entities as typed records. A dataset is read-only input
//! for reports; `validate` checks the referential and value invariants the
//! reports rely on.
//!
//! # Example
//!
//! ```rust
//! use pizza_reports::database::{Dataset, Order, OrderDetail, Pizza, PizzaCategory, PizzaSize};
//! use chrono::{NaiveDate, NaiveTime};
//!
//! let mut dataset = Dataset::new();
//! dataset.categories.push(PizzaCategory::new("classic", "Classic"));
//! dataset.pizzas.push(Pizza::new(
//!     "margherita_m",
//!     "The Margherita Pizza",
//!     "classic",
//!     PizzaSize::M,
//!     1650,
//! ));
//! dataset.orders.push(Order::new(
//!     1,
//!     NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
//!     NaiveTime::from_hms_opt(11, 38, 36).unwrap(),
//! ));
//! dataset.order_details.push(OrderDetail::new(1, 1, "margherita_m", 2));
//! dataset.validate()?;
//! # Ok::<(), pizza_reports::DatasetError>(())
//! ```

use crate::database::schema::{Entity, SchemaDescriptor};
use crate::error::DatasetError;
use crate::types::{Row, Table, Value};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// One customer order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: i64,
    pub order_date: NaiveDate,
    pub order_time: NaiveTime,
}

impl Order {
    pub fn new(order_id: i64, order_date: NaiveDate, order_time: NaiveTime) -> Self {
        Self {
            order_id,
            order_date,
            order_time,
        }
    }
}

/// One line of an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order_details_id: i64,
    pub order_id: i64,
    pub pizza_id: String,
    pub quantity: i64,
}

impl OrderDetail {
    pub fn new(
        order_details_id: i64,
        order_id: i64,
        pizza_id: impl Into<String>,
        quantity: i64,
    ) -> Self {
        Self {
            order_details_id,
            order_id,
            pizza_id: pizza_id.into(),
            quantity,
        }
    }
}

/// Pizza sizes on the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PizzaSize {
    S,
    M,
    L,
    XL,
    XXL,
}

impl PizzaSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            PizzaSize::S => "S",
            PizzaSize::M => "M",
            PizzaSize::L => "L",
            PizzaSize::XL => "XL",
            PizzaSize::XXL => "XXL",
        }
    }
}

impl fmt::Display for PizzaSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PizzaSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "S" => Ok(PizzaSize::S),
            "M" => Ok(PizzaSize::M),
            "L" => Ok(PizzaSize::L),
            "XL" => Ok(PizzaSize::XL),
            "XXL" => Ok(PizzaSize::XXL),
            other => Err(format!("unknown pizza size {}", other)),
        }
    }
}

/// A sellable pizza: one name in one size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pizza {
    pub pizza_id: String,
    pub name: String,
    pub category_id: String,
    pub size: PizzaSize,
    /// Price in hundredths
    pub price: i64,
}

impl Pizza {
    pub fn new(
        pizza_id: impl Into<String>,
        name: impl Into<String>,
        category_id: impl Into<String>,
        size: PizzaSize,
        price: i64,
    ) -> Self {
        Self {
            pizza_id: pizza_id.into(),
            name: name.into(),
            category_id: category_id.into(),
            size,
            price,
        }
    }
}

/// Menu category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PizzaCategory {
    pub category_id: String,
    pub name: String,
}

impl PizzaCategory {
    pub fn new(category_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category_id: category_id.into(),
            name: name.into(),
        }
    }
}

/// Snapshot of the four entities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub orders: Vec<Order>,
    pub order_details: Vec<OrderDetail>,
    pub pizzas: Vec<Pizza>,
    pub categories: Vec<PizzaCategory>,
}

impl Dataset {
    /// Create an empty dataset
    pub fn new() -> Self {
        Self::default()
    }

    /// True when there are no orders
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Check keys, references and value ranges
    pub fn validate(&self) -> Result<(), DatasetError> {
        let category_ids = unique_keys(
            "pizza_categories",
            self.categories.iter().map(|c| c.category_id.as_str()),
        )?;
        let pizza_ids = unique_keys("pizzas", self.pizzas.iter().map(|p| p.pizza_id.as_str()))?;
        let order_ids = unique_keys("orders", self.orders.iter().map(|o| o.order_id))?;
        unique_keys(
            "order_details",
            self.order_details.iter().map(|d| d.order_details_id),
        )?;

        for pizza in &self.pizzas {
            if !category_ids.contains(pizza.category_id.as_str()) {
                return Err(DatasetError::Integrity(format!(
                    "pizza {} references unknown category {}",
                    pizza.pizza_id, pizza.category_id
                )));
            }
            if pizza.price < 0 {
                return Err(DatasetError::Integrity(format!(
                    "pizza {} has a negative price",
                    pizza.pizza_id
                )));
            }
        }

        for detail in &self.order_details {
            if !order_ids.contains(&detail.order_id) {
                return Err(DatasetError::Integrity(format!(
                    "order detail {} references unknown order {}",
                    detail.order_details_id, detail.order_id
                )));
            }
            if !pizza_ids.contains(detail.pizza_id.as_str()) {
                return Err(DatasetError::Integrity(format!(
                    "order detail {} references unknown pizza {}",
                    detail.order_details_id, detail.pizza_id
                )));
            }
            if detail.quantity <= 0 {
                return Err(DatasetError::Integrity(format!(
                    "order detail {} has non-positive quantity {}",
                    detail.order_details_id, detail.quantity
                )));
            }
        }

        Ok(())
    }

    /// Materialize one entity as a table laid out by the schema
    pub fn to_table(&self, entity: Entity) -> Table {
        let mut table = match SchemaDescriptor::pizza_sales().entity(entity) {
            Ok(descriptor) => descriptor.empty_table(),
            Err(_) => Table::new(entity.table_name().to_string(), Vec::new()),
        };

        table.rows = match entity {
            Entity::Orders => self
                .orders
                .iter()
                .map(|o| {
                    Row::new(vec![
                        Value::Integer(o.order_id),
                        Value::Date(o.order_date),
                        Value::Time(o.order_time),
                    ])
                })
                .collect(),
            Entity::OrderDetails => self
                .order_details
                .iter()
                .map(|d| {
                    Row::new(vec![
                        Value::Integer(d.order_details_id),
                        Value::Integer(d.order_id),
                        Value::Text(d.pizza_id.clone()),
                        Value::Integer(d.quantity),
                    ])
                })
                .collect(),
            Entity::Pizzas => self
                .pizzas
                .iter()
                .map(|p| {
                    Row::new(vec![
                        Value::Text(p.pizza_id.clone()),
                        Value::Text(p.name.clone()),
                        Value::Text(p.category_id.clone()),
                        Value::Text(p.size.to_string()),
                        Value::Decimal(p.price),
                    ])
                })
                .collect(),
            Entity::PizzaCategories => self
                .categories
                .iter()
                .map(|c| {
                    Row::new(vec![
                        Value::Text(c.category_id.clone()),
                        Value::Text(c.name.clone()),
                    ])
                })
                .collect(),
        };

        table
    }
}

fn unique_keys<K, I>(table: &str, keys: I) -> Result<HashSet<K>, DatasetError>
where
    K: std::hash::Hash + Eq + fmt::Display,
    I: IntoIterator<Item = K>,
{
    let mut seen = HashSet::new();
    for key in keys {
        if seen.contains(&key) {
            return Err(DatasetError::Integrity(format!(
                "duplicate key {} in {}",
                key, table
            )));
        }
        seen.insert(key);
    }
    Ok(seen)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2015, 1, day).unwrap()
    }

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    }

    fn small_dataset() -> Dataset {
        let mut dataset = Dataset::new();
        dataset.categories.push(PizzaCategory::new("classic", "Classic"));
        dataset
            .pizzas
            .push(Pizza::new(
                "pep_m",
                "The Pepperoni Pizza",
                "classic",
                PizzaSize::M,
                1250,
            ));
        dataset.orders.push(Order::new(1, date(1), noon()));
        dataset.order_details.push(OrderDetail::new(1, 1, "pep_m", 2));
        dataset
    }

    #[test]
    fn test_validate_ok() {
        assert!(small_dataset().validate().is_ok());
        assert!(Dataset::new().validate().is_ok());
    }

    #[test]
    fn test_validate_unknown_pizza() {
        let mut dataset = small_dataset();
        dataset.order_details.push(OrderDetail::new(2, 1, "ghost_l", 1));
        let err = dataset.validate().unwrap_err();
        assert!(err.to_string().contains("unknown pizza ghost_l"));
    }

    #[test]
    fn test_validate_duplicate_order() {
        let mut dataset = small_dataset();
        dataset.orders.push(Order::new(1, date(2), noon()));
        assert!(matches!(
            dataset.validate(),
            Err(DatasetError::Integrity(_))
        ));
    }

    #[test]
    fn test_validate_quantity_and_price() {
        let mut dataset = small_dataset();
        dataset.order_details[0].quantity = 0;
        assert!(dataset.validate().is_err());

        let mut dataset = small_dataset();
        dataset.pizzas[0].price = -1;
        assert!(dataset.validate().is_err());
    }

    #[test]
    fn test_to_table_matches_schema() {
        let dataset = small_dataset();
        let pizzas = dataset.to_table(Entity::Pizzas);
        assert_eq!(pizzas.num_rows(), 1);
        assert_eq!(
            pizzas.rows[0].get_value_by_name(&pizzas, "price"),
            Some(&Value::Decimal(1250))
        );
        assert_eq!(
            pizzas.rows[0].get_value_by_name(&pizzas, "size"),
            Some(&Value::Text("M".to_string()))
        );
    }

    #[test]
    fn test_pizza_size_parse() {
        assert_eq!("xl".parse::<PizzaSize>(), Ok(PizzaSize::XL));
        assert!("huge".parse::<PizzaSize>().is_err());
    }
}
