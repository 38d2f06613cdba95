//! Result formatting
//!
//! Renders report results for people (bordered tables) or for programs
//! (ordered JSON records). Formatting never mutates the result.
//!
//! # Example
//!
//! ```rust
//! use pizza_reports::database::SampleData;
//! use pizza_reports::format::{OutputStyle, ResultFormatter};
//! use pizza_reports::query::QueryExecutor;
//! use pizza_reports::store::MemoryStore;
//! use pizza_reports::types::Params;
//!
//! let store = MemoryStore::new(&SampleData::new(2).generate(40))?;
//! let result = QueryExecutor::new().execute("revenue_by_size", &Params::new(), &store)?;
//! println!("{}", ResultFormatter::format(&result, OutputStyle::Table));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::config::OutputFormat;
use crate::query::CatalogEntry;
use crate::types::{ReportResult, Value};
use serde_json::Map;
use tabled::builder::Builder;
use tabled::settings::{object::Rows, Alignment, Modify, Style};
use tabled::Table;

/// Output style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStyle {
    /// Aligned columns with a header row
    Table,
    /// JSON array of ordered records
    Structured,
}

impl From<OutputFormat> for OutputStyle {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Table => OutputStyle::Table,
            OutputFormat::Json => OutputStyle::Structured,
        }
    }
}

/// Formatter for report results and catalog listings
pub struct ResultFormatter;

impl ResultFormatter {
    /// Render a result in the given style
    pub fn format(report: &ReportResult, style: OutputStyle) -> String {
        match style {
            OutputStyle::Table => Self::table(report),
            OutputStyle::Structured => format!("{:#}", Self::to_json(report)),
        }
    }

    /// Bordered table with the declared columns as header
    pub fn table(report: &ReportResult) -> String {
        let mut builder = Builder::default();
        builder.push_record(report.columns.iter().cloned());
        for row in &report.rows {
            builder.push_record(row.values.iter().map(cell));
        }
        styled(builder.build())
    }

    /// One ordered mapping per row, keyed by column name
    pub fn structured(report: &ReportResult) -> Vec<Map<String, serde_json::Value>> {
        report
            .records()
            .map(|record| {
                record
                    .into_iter()
                    .map(|(column, value)| (column.to_string(), value.to_json()))
                    .collect()
            })
            .collect()
    }

    /// Structured rows as a JSON array
    pub fn to_json(report: &ReportResult) -> serde_json::Value {
        serde_json::Value::Array(
            Self::structured(report)
                .into_iter()
                .map(serde_json::Value::Object)
                .collect(),
        )
    }

    /// Catalog listing as a table: id, tier, parameters, description
    pub fn catalog_table(entries: &[CatalogEntry]) -> String {
        let mut builder = Builder::default();
        builder.push_record(["id", "tier", "parameters", "description"]);
        for entry in entries {
            let params: Vec<String> = entry
                .parameter_schema
                .iter()
                .map(|p| {
                    if p.required {
                        p.name.clone()
                    } else {
                        format!("[{}]", p.name)
                    }
                })
                .collect();
            builder.push_record([
                entry.id.clone(),
                entry.tier.to_string(),
                params.join(" "),
                entry.description.clone(),
            ]);
        }
        styled(builder.build())
    }
}

fn styled(mut table: Table) -> String {
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
    table.to_string()
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::CatalogRegistry;
    use crate::query::Tier;
    use crate::types::{Params, Row};

    fn report() -> ReportResult {
        ReportResult {
            query_id: "top_pizzas_by_quantity".to_string(),
            params: Params::new().with("top_n", 2),
            columns: vec!["pizza_name".to_string(), "total_quantity".to_string()],
            rows: vec![
                Row::new(vec![Value::Text("PizzaA".to_string()), Value::Integer(3)]),
                Row::new(vec![Value::Text("PizzaB".to_string()), Value::Integer(1)]),
            ],
        }
    }

    #[test]
    fn test_table_has_header_and_rows() {
        let rendered = ResultFormatter::format(&report(), OutputStyle::Table);
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[1].contains("pizza_name"));
        assert!(lines[1].contains("total_quantity"));
        assert!(rendered.contains("PizzaA"));
        assert!(rendered.contains('╭'));
        // Every line is the same width
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|l| l.chars().count() == width));
    }

    #[test]
    fn test_structured_keeps_column_order() {
        let records = ResultFormatter::structured(&report());
        assert_eq!(records.len(), 2);
        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, vec!["pizza_name", "total_quantity"]);
        assert_eq!(records[0]["total_quantity"], serde_json::json!(3));
    }

    #[test]
    fn test_structured_json_text() {
        let text = ResultFormatter::format(&report(), OutputStyle::Structured);
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[1]["pizza_name"], "PizzaB");
    }

    #[test]
    fn test_decimals_and_nulls() {
        let mut result = report();
        result.columns = vec!["revenue".to_string(), "share".to_string()];
        result.rows = vec![Row::new(vec![Value::Decimal(5000), Value::Null])];
        let json = ResultFormatter::to_json(&result);
        assert_eq!(json[0]["revenue"], serde_json::json!(50.0));
        assert!(json[0]["share"].is_null());
        assert!(ResultFormatter::table(&result).contains("50.00"));
    }

    #[test]
    fn test_format_does_not_mutate() {
        let result = report();
        let before = result.clone();
        ResultFormatter::format(&result, OutputStyle::Table);
        ResultFormatter::format(&result, OutputStyle::Structured);
        assert_eq!(result, before);
    }

    #[test]
    fn test_catalog_table() {
        let entries = CatalogRegistry::global().entries(Some(Tier::Advanced));
        let rendered = ResultFormatter::catalog_table(&entries);
        assert!(rendered.contains("top_pizzas_per_category"));
        assert!(rendered.contains("[from_date]"));
    }
}
