//! Data loader
//!
//! Loads the public pizza-sales CSV layout into a [`Dataset`]:
//!
//! - `orders.csv`: `order_id,date,time`
//! - `order_details.csv`: `order_details_id,order_id,pizza_id,quantity`
//! - `pizzas.csv`: `pizza_id,pizza_type_id,size,price`
//! - `pizza_types.csv`: `pizza_type_id,name,category,ingredients`
//!
//! Pizza names and categories come from `pizza_types.csv`; categories are
//! derived from the distinct category names. Columns are located by header
//! name, so extra columns are ignored.
//!
//! # Example
//!
//! ```rust,no_run
//! use pizza_reports::database::DataLoader;
//!
//! let loader = DataLoader::new();
//! let dataset = loader.load_dir("data/pizza_sales")?;
//! println!("{} orders", dataset.orders.len());
//! # Ok::<(), pizza_reports::DatasetError>(())
//! ```

use crate::database::dataset::{Dataset, Order, OrderDetail, Pizza, PizzaCategory, PizzaSize};
use crate::error::DatasetError;
use crate::types::Value;
use chrono::{NaiveDate, NaiveTime};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const ORDERS_FILE: &str = "orders.csv";
pub const ORDER_DETAILS_FILE: &str = "order_details.csv";
pub const PIZZAS_FILE: &str = "pizzas.csv";
pub const PIZZA_TYPES_FILE: &str = "pizza_types.csv";

/// Data loader
///
/// Provides methods for loading the dataset from CSV files.
#[derive(Debug, Clone, Default)]
pub struct DataLoader;

/// Parsed CSV file: header plus records, with line numbers for errors
struct CsvFile {
    name: String,
    headers: Vec<String>,
    records: Vec<(usize, Vec<String>)>,
}

impl CsvFile {
    fn column(&self, header: &str) -> Result<usize, DatasetError> {
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(header))
            .ok_or_else(|| DatasetError::Parse {
                file: self.name.clone(),
                line: 1,
                message: format!("missing column {}", header),
            })
    }

    fn error(&self, line: usize, message: String) -> DatasetError {
        DatasetError::Parse {
            file: self.name.clone(),
            line,
            message,
        }
    }

    fn field<'a>(
        &self,
        line: usize,
        record: &'a [String],
        index: usize,
    ) -> Result<&'a str, DatasetError> {
        record
            .get(index)
            .map(|s| s.as_str())
            .ok_or_else(|| self.error(line, format!("expected at least {} fields", index + 1)))
    }

    fn integer(&self, line: usize, record: &[String], index: usize) -> Result<i64, DatasetError> {
        let raw = self.field(line, record, index)?;
        raw.parse()
            .map_err(|_| self.error(line, format!("invalid integer {:?}", raw)))
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self
    }

    /// Load all four files from a directory and validate the result
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> Result<Dataset, DatasetError> {
        let dir = dir.as_ref();
        let (categories, pizza_types) = self.load_pizza_types(dir.join(PIZZA_TYPES_FILE))?;
        let pizzas = self.load_pizzas(dir.join(PIZZAS_FILE), &pizza_types)?;
        let orders = self.load_orders(dir.join(ORDERS_FILE))?;
        let order_details = self.load_order_details(dir.join(ORDER_DETAILS_FILE))?;

        let dataset = Dataset {
            orders,
            order_details,
            pizzas,
            categories,
        };
        dataset.validate()?;

        log::info!(
            "loaded {} orders, {} order lines, {} pizzas in {} categories from {}",
            dataset.orders.len(),
            dataset.order_details.len(),
            dataset.pizzas.len(),
            dataset.categories.len(),
            dir.display()
        );
        Ok(dataset)
    }

    /// Load `orders.csv`
    pub fn load_orders(&self, path: impl AsRef<Path>) -> Result<Vec<Order>, DatasetError> {
        let csv = read_csv(path.as_ref())?;
        let id_col = csv.column("order_id")?;
        let date_col = csv.column("date")?;
        let time_col = csv.column("time")?;

        let mut orders = Vec::with_capacity(csv.records.len());
        for (line, record) in &csv.records {
            let order_id = csv.integer(*line, record, id_col)?;
            let raw_date = csv.field(*line, record, date_col)?;
            let order_date = parse_date(raw_date)
                .ok_or_else(|| csv.error(*line, format!("invalid date {:?}", raw_date)))?;
            let raw_time = csv.field(*line, record, time_col)?;
            let order_time = NaiveTime::parse_from_str(raw_time, "%H:%M:%S")
                .map_err(|_| csv.error(*line, format!("invalid time {:?}", raw_time)))?;
            orders.push(Order::new(order_id, order_date, order_time));
        }
        Ok(orders)
    }

    /// Load `order_details.csv`
    pub fn load_order_details(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Vec<OrderDetail>, DatasetError> {
        let csv = read_csv(path.as_ref())?;
        let id_col = csv.column("order_details_id")?;
        let order_col = csv.column("order_id")?;
        let pizza_col = csv.column("pizza_id")?;
        let quantity_col = csv.column("quantity")?;

        let mut details = Vec::with_capacity(csv.records.len());
        for (line, record) in &csv.records {
            details.push(OrderDetail::new(
                csv.integer(*line, record, id_col)?,
                csv.integer(*line, record, order_col)?,
                csv.field(*line, record, pizza_col)?,
                csv.integer(*line, record, quantity_col)?,
            ));
        }
        Ok(details)
    }

    /// Load `pizza_types.csv`, returning the derived categories and a map
    /// from pizza type id to (name, category id)
    pub fn load_pizza_types(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<(Vec<PizzaCategory>, HashMap<String, (String, String)>), DatasetError> {
        let csv = read_csv(path.as_ref())?;
        let type_col = csv.column("pizza_type_id")?;
        let name_col = csv.column("name")?;
        let category_col = csv.column("category")?;

        let mut categories: Vec<PizzaCategory> = Vec::new();
        let mut types = HashMap::new();
        for (line, record) in &csv.records {
            let category_name = csv.field(*line, record, category_col)?;
            let category_id = category_slug(category_name);
            if !categories.iter().any(|c| c.category_id == category_id) {
                categories.push(PizzaCategory::new(category_id.clone(), category_name));
            }
            types.insert(
                csv.field(*line, record, type_col)?.to_string(),
                (csv.field(*line, record, name_col)?.to_string(), category_id),
            );
        }
        Ok((categories, types))
    }

    /// Load `pizzas.csv`, resolving names and categories through the pizza types
    pub fn load_pizzas(
        &self,
        path: impl AsRef<Path>,
        pizza_types: &HashMap<String, (String, String)>,
    ) -> Result<Vec<Pizza>, DatasetError> {
        let csv = read_csv(path.as_ref())?;
        let id_col = csv.column("pizza_id")?;
        let type_col = csv.column("pizza_type_id")?;
        let size_col = csv.column("size")?;
        let price_col = csv.column("price")?;

        let mut pizzas = Vec::with_capacity(csv.records.len());
        for (line, record) in &csv.records {
            let type_id = csv.field(*line, record, type_col)?;
            let (name, category_id) = pizza_types
                .get(type_id)
                .ok_or_else(|| csv.error(*line, format!("unknown pizza type {}", type_id)))?;
            let size: PizzaSize = csv
                .field(*line, record, size_col)?
                .parse()
                .map_err(|e: String| csv.error(*line, e))?;
            let raw_price = csv.field(*line, record, price_col)?;
            let price = Value::parse_decimal(raw_price)
                .ok_or_else(|| csv.error(*line, format!("invalid price {:?}", raw_price)))?;
            pizzas.push(Pizza::new(
                csv.field(*line, record, id_col)?,
                name.clone(),
                category_id.clone(),
                size,
                price,
            ));
        }
        Ok(pizzas)
    }
}

/// Read a whole CSV file; invalid UTF-8 is replaced rather than rejected
fn read_csv(path: &Path) -> Result<CsvFile, DatasetError> {
    let bytes = fs::read(path).map_err(|e| DatasetError::io(path, e))?;
    let contents = String::from_utf8_lossy(&bytes);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut lines = contents
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty());

    let (_, header) = lines.next().ok_or_else(|| DatasetError::Parse {
        file: name.clone(),
        line: 1,
        message: "file is empty".to_string(),
    })?;
    let headers = split_record(header.trim_start_matches('\u{feff}'))
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    let records = lines
        .map(|(line, text)| (line, split_record(text)))
        .collect();

    Ok(CsvFile {
        name,
        headers,
        records,
    })
}

/// Split one CSV record, honouring double-quoted fields and `""` escapes
pub fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// Dates appear as `2015-01-01` and, in some exports, `01/01/2015`
fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .ok()
}

fn category_slug(name: &str) -> String {
    name.trim()
        .to_ascii_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) {
        let mut file = fs::File::create(dir.path().join(name)).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            PIZZA_TYPES_FILE,
            "pizza_type_id,name,category,ingredients\n\
             bbq_ckn,The Barbecue Chicken Pizza,Chicken,\"Barbecued Chicken, Red Peppers\"\n\
             hawaiian,The Hawaiian Pizza,Classic,\"Sliced Ham, Pineapple, Mozzarella Cheese\"\n",
        );
        write(
            &dir,
            PIZZAS_FILE,
            "pizza_id,pizza_type_id,size,price\n\
             bbq_ckn_l,bbq_ckn,L,20.75\n\
             hawaiian_m,hawaiian,M,13.25\n",
        );
        write(
            &dir,
            ORDERS_FILE,
            "order_id,date,time\r\n1,2015-01-01,11:38:36\r\n2,2015-01-02,19:04:10\r\n",
        );
        write(
            &dir,
            ORDER_DETAILS_FILE,
            "order_details_id,order_id,pizza_id,quantity\n\
             1,1,hawaiian_m,1\n\
             2,1,bbq_ckn_l,2\n\
             3,2,bbq_ckn_l,1\n",
        );
        dir
    }

    #[test]
    fn test_split_record_quotes() {
        let fields = split_record(r#"bbq,"Chicken, Peppers","say ""hi""",x"#);
        assert_eq!(fields, vec!["bbq", "Chicken, Peppers", "say \"hi\"", "x"]);
        assert_eq!(split_record("a,,b"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_load_dir() {
        let dir = fixture();
        let dataset = DataLoader::new().load_dir(dir.path()).unwrap();

        assert_eq!(dataset.orders.len(), 2);
        assert_eq!(dataset.order_details.len(), 3);
        assert_eq!(dataset.categories.len(), 2);
        assert_eq!(dataset.categories[0].category_id, "chicken");

        let bbq = dataset
            .pizzas
            .iter()
            .find(|p| p.pizza_id == "bbq_ckn_l")
            .unwrap();
        assert_eq!(bbq.name, "The Barbecue Chicken Pizza");
        assert_eq!(bbq.price, 2075);
        assert_eq!(bbq.size, PizzaSize::L);
        assert_eq!(
            dataset.orders[0].order_time,
            NaiveTime::from_hms_opt(11, 38, 36).unwrap()
        );
    }

    #[test]
    fn test_load_reports_line_numbers() {
        let dir = fixture();
        write(
            &dir,
            ORDERS_FILE,
            "order_id,date,time\n1,2015-01-01,11:38:36\nx,2015-01-02,12:00:00\n",
        );
        let err = DataLoader::new().load_dir(dir.path()).unwrap_err();
        assert_eq!(err.to_string(), "orders.csv:3: invalid integer \"x\"");
    }

    #[test]
    fn test_load_missing_column() {
        let dir = fixture();
        write(&dir, ORDERS_FILE, "order_id,date\n1,2015-01-01\n");
        let err = DataLoader::new().load_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("missing column time"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = DataLoader::new().load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2015, 3, 9);
        assert_eq!(parse_date("2015-03-09"), expected);
        assert_eq!(parse_date("03/09/2015"), expected);
        assert_eq!(parse_date("9th March"), None);
    }
}
