//! PizzaReports CLI
//!
//! Command-line interface for listing and running the pizza-sales reports.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use pizza_reports::config::{Config, OutputFormat};
use pizza_reports::database::{DataLoader, Dataset, DatasetStorage, SampleData};
use pizza_reports::format::{OutputStyle, ResultFormatter};
use pizza_reports::query::{CatalogRegistry, QueryExecutor, Tier};
use pizza_reports::store::{MemoryStore, SqlRenderer};
use pizza_reports::utils::Logger;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pizza_reports")]
#[command(about = "Analytical reports over pizza-sales data", long_about = None)]
#[command(version = pizza_reports::VERSION)]
struct Cli {
    /// Config file path (default: ~/.pizza_reports/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level, overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the report catalog
    List {
        /// Only reports of this tier
        #[arg(short, long)]
        tier: Option<Tier>,
    },

    /// Run a report
    Run {
        /// Report id
        id: String,

        /// Parameter assignment, e.g. `-p top_n=5`
        #[arg(short, long = "param", value_parser = parse_assignment)]
        params: Vec<(String, String)>,

        /// CSV directory or dataset snapshot (.json / .bin)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Output format, overrides the config file
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Show the computation request and SQL for a report
    Explain {
        /// Report id
        id: String,

        /// Parameter assignment, e.g. `-p top_n=5`
        #[arg(short, long = "param", value_parser = parse_assignment)]
        params: Vec<(String, String)>,
    },

    /// Write a generated sample dataset
    Sample {
        /// Output file path (.json or .bin)
        #[arg(short, long)]
        output: PathBuf,

        /// Number of orders
        #[arg(long, default_value = "1000")]
        orders: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected name=value, got `{}`", raw)),
    }
}

fn load_dataset(path: &Path) -> Result<Dataset> {
    let dataset = if path.is_dir() {
        DataLoader::new().load_dir(path)
    } else {
        DatasetStorage::new().load_auto(path)
    };
    dataset.with_context(|| format!("failed to load dataset from {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    let level = match &cli.log_level {
        Some(name) => Logger::parse_level(name)
            .ok_or_else(|| anyhow!("unknown log level `{}`", name))?,
        None => config.log_filter(),
    };
    Logger::init_with_level(level);

    let catalog = CatalogRegistry::global();

    match cli.command {
        Commands::List { tier } => {
            println!("{}", ResultFormatter::catalog_table(&catalog.entries(tier)));
        }
        Commands::Run {
            id,
            params,
            data,
            format,
        } => {
            let definition = catalog.get(&id)?;
            let params = definition.parse_params(params)?;

            let Some(path) = data.or_else(|| config.data_dir.clone()) else {
                bail!("no dataset given: pass --data or set data_dir in the config file");
            };
            let dataset = load_dataset(&path)?;
            let store = MemoryStore::new(&dataset)?;

            let result = QueryExecutor::with_catalog(catalog).execute(&id, &params, &store)?;
            let style = OutputStyle::from(format.unwrap_or(config.output_format));
            println!("{}", ResultFormatter::format(&result, style));
        }
        Commands::Explain { id, params } => {
            let definition = catalog.get(&id)?;
            let params = definition.parse_params(params)?;
            let request = QueryExecutor::with_catalog(catalog).explain(&id, &params)?;

            println!("📋 {}: {}", definition.id, definition.description);
            println!("{}", serde_json::to_string_pretty(&request)?);
            println!();
            println!("{}", SqlRenderer::new().render_checked(&request)?);
        }
        Commands::Sample {
            output,
            orders,
            seed,
        } => {
            let dataset = SampleData::new(seed).generate(orders);
            DatasetStorage::new()
                .save_auto(&dataset, &output)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!(
                "✅ Wrote {} orders ({} line items) to {}",
                dataset.orders.len(),
                dataset.order_details.len(),
                output.display()
            );
        }
    }

    Ok(())
}
