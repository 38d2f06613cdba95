//! Sample pizza-sales data
//!
//! Generates a deterministic synthetic dataset shaped like the public
//! pizza-sales data: a fixed menu of pizzas in four categories, and orders
//! spread over a year of opening hours.
//!
//! # Example
//!
//! ```rust
//! use pizza_reports::database::SampleData;
//!
//! let dataset = SampleData::new(42).generate(500);
//! assert_eq!(dataset.orders.len(), 500);
//! assert!(dataset.validate().is_ok());
//! ```

use crate::database::dataset::{Dataset, Order, OrderDetail, Pizza, PizzaCategory, PizzaSize};
use chrono::{Duration, NaiveDate, NaiveTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// (type id, name, category id, [(size, price in hundredths)])
type MenuEntry = (&'static str, &'static str, &'static str, &'static [(PizzaSize, i64)]);

const CATEGORIES: [(&str, &str); 4] = [
    ("classic", "Classic"),
    ("chicken", "Chicken"),
    ("supreme", "Supreme"),
    ("veggie", "Veggie"),
];

const MENU: [MenuEntry; 12] = [
    (
        "classic_dlx",
        "The Classic Deluxe Pizza",
        "classic",
        &[(PizzaSize::S, 1200), (PizzaSize::M, 1600), (PizzaSize::L, 2050)],
    ),
    (
        "hawaiian",
        "The Hawaiian Pizza",
        "classic",
        &[(PizzaSize::S, 1050), (PizzaSize::M, 1325), (PizzaSize::L, 1650)],
    ),
    (
        "pepperoni",
        "The Pepperoni Pizza",
        "classic",
        &[(PizzaSize::S, 950), (PizzaSize::M, 1250), (PizzaSize::L, 1550)],
    ),
    (
        "the_greek",
        "The Greek Pizza",
        "classic",
        &[
            (PizzaSize::S, 1200),
            (PizzaSize::M, 1600),
            (PizzaSize::L, 2050),
            (PizzaSize::XL, 2550),
            (PizzaSize::XXL, 3595),
        ],
    ),
    (
        "bbq_ckn",
        "The Barbecue Chicken Pizza",
        "chicken",
        &[(PizzaSize::S, 1275), (PizzaSize::M, 1675), (PizzaSize::L, 2075)],
    ),
    (
        "thai_ckn",
        "The Thai Chicken Pizza",
        "chicken",
        &[(PizzaSize::S, 1275), (PizzaSize::M, 1675), (PizzaSize::L, 2075)],
    ),
    (
        "cali_ckn",
        "The California Chicken Pizza",
        "chicken",
        &[(PizzaSize::S, 1275), (PizzaSize::M, 1675), (PizzaSize::L, 2075)],
    ),
    (
        "spicy_ital",
        "The Spicy Italian Pizza",
        "supreme",
        &[(PizzaSize::S, 1250), (PizzaSize::M, 1650), (PizzaSize::L, 2075)],
    ),
    (
        "sicilian",
        "The Sicilian Pizza",
        "supreme",
        &[(PizzaSize::S, 1225), (PizzaSize::M, 1625), (PizzaSize::L, 2025)],
    ),
    (
        "four_cheese",
        "The Four Cheese Pizza",
        "veggie",
        &[(PizzaSize::M, 1450), (PizzaSize::L, 1795)],
    ),
    (
        "mexicana",
        "The Mexicana Pizza",
        "veggie",
        &[(PizzaSize::S, 1200), (PizzaSize::M, 1600), (PizzaSize::L, 2025)],
    ),
    (
        "veggie_veg",
        "The Vegetables + Vegetables Pizza",
        "veggie",
        &[(PizzaSize::S, 1200), (PizzaSize::M, 1600), (PizzaSize::L, 2025)],
    ),
];

/// Deterministic sample data generator
#[derive(Debug, Clone)]
pub struct SampleData {
    seed: u64,
    start: NaiveDate,
    days: i64,
}

impl SampleData {
    /// Create a generator; equal seeds produce equal datasets
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            start: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or(NaiveDate::MIN),
            days: 365,
        }
    }

    /// Spread orders over `days` days starting at `start`
    pub fn with_period(mut self, start: NaiveDate, days: i64) -> Self {
        self.start = start;
        self.days = days.max(1);
        self
    }

    /// The fixed menu: categories and pizzas
    pub fn menu(&self) -> (Vec<PizzaCategory>, Vec<Pizza>) {
        let categories = CATEGORIES
            .iter()
            .map(|(id, name)| PizzaCategory::new(*id, *name))
            .collect();

        let pizzas = MENU
            .iter()
            .flat_map(|(type_id, name, category, sizes)| {
                sizes.iter().map(move |(size, price)| {
                    Pizza::new(
                        format!("{}_{}", type_id, size.as_str().to_ascii_lowercase()),
                        *name,
                        *category,
                        *size,
                        *price,
                    )
                })
            })
            .collect();

        (categories, pizzas)
    }

    /// Generate a dataset with `num_orders` orders
    pub fn generate(&self, num_orders: usize) -> Dataset {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let (categories, pizzas) = self.menu();

        let mut orders = Vec::with_capacity(num_orders);
        let mut order_details = Vec::new();
        let mut detail_id = 0i64;

        // Order ids follow chronological order, as in the source data
        let mut slots: Vec<(i64, u32)> = (0..num_orders)
            .map(|_| {
                let day = rng.random_range(0..self.days);
                let second = rng.random_range(11 * 3600..23 * 3600);
                (day, second)
            })
            .collect();
        slots.sort_unstable();

        for (idx, (day, second)) in slots.into_iter().enumerate() {
            let order_id = idx as i64 + 1;
            let order_date = self.start + Duration::days(day);
            let order_time =
                NaiveTime::from_num_seconds_from_midnight_opt(second, 0).unwrap_or(NaiveTime::MIN);
            orders.push(Order::new(order_id, order_date, order_time));

            let lines = rng.random_range(1..=4);
            for _ in 0..lines {
                detail_id += 1;
                let pizza = &pizzas[rng.random_range(0..pizzas.len())];
                let quantity = if rng.random_bool(0.9) { 1 } else { rng.random_range(2..=3) };
                order_details.push(OrderDetail::new(
                    detail_id,
                    order_id,
                    pizza.pizza_id.clone(),
                    quantity,
                ));
            }
        }

        log::debug!(
            "generated {} orders with {} lines (seed {})",
            orders.len(),
            order_details.len(),
            self.seed
        );

        Dataset {
            orders,
            order_details,
            pizzas,
            categories,
        }
    }
}

impl Default for SampleData {
    fn default() -> Self {
        Self::new(0)
    }
}
