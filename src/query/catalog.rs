//! Catalog registry
//!
//! Maps report identifiers to definitions. A registry is filled through
//! `register` while owned; the process-wide registry returned by
//! [`CatalogRegistry::global`] is built once from the built-in reports and
//! is only reachable through shared references afterwards, so concurrent
//! lookups need no locking.
//!
//! # Example
//!
//! ```rust
//! use pizza_reports::query::{CatalogRegistry, Tier};
//!
//! let catalog = CatalogRegistry::global();
//! let advanced: Vec<&str> = catalog
//!     .list(Some(Tier::Advanced))
//!     .map(|d| d.id.as_str())
//!     .collect();
//! assert!(advanced.contains(&"cumulative_revenue"));
//! ```

use crate::error::ReportError;
use crate::query::builtin;
use crate::query::definition::{CatalogEntry, QueryDefinition, Tier};
use std::collections::HashMap;
use std::sync::OnceLock;

static GLOBAL: OnceLock<CatalogRegistry> = OnceLock::new();

/// Registry of report definitions, in registration order
#[derive(Debug, Clone, Default)]
pub struct CatalogRegistry {
    definitions: Vec<QueryDefinition>,
    index: HashMap<String, usize>,
}

impl CatalogRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from definitions, failing on the first duplicate id
    pub fn from_definitions<I>(definitions: I) -> Result<Self, ReportError>
    where
        I: IntoIterator<Item = QueryDefinition>,
    {
        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition)?;
        }
        Ok(registry)
    }

    /// Create a registry holding the built-in reports
    pub fn with_builtins() -> Result<Self, ReportError> {
        Self::from_definitions(builtin::definitions())
    }

    /// Process-wide registry of built-in reports, initialized on first use
    ///
    /// A rejected built-in leaves the registry empty, so every lookup fails
    /// with `UnknownQuery` instead of silently missing one report.
    pub fn global() -> &'static CatalogRegistry {
        GLOBAL.get_or_init(|| match Self::with_builtins() {
            Ok(registry) => {
                log::info!("report catalog initialized with {} reports", registry.len());
                registry
            }
            Err(err) => {
                log::error!("built-in reports rejected: {}", err);
                Self::new()
            }
        })
    }

    /// Add a definition
    pub fn register(&mut self, definition: QueryDefinition) -> Result<(), ReportError> {
        if self.index.contains_key(&definition.id) {
            return Err(ReportError::DuplicateQueryId(definition.id));
        }
        self.index.insert(definition.id.clone(), self.definitions.len());
        self.definitions.push(definition);
        Ok(())
    }

    /// Look up a definition by identifier
    pub fn get(&self, id: &str) -> Result<&QueryDefinition, ReportError> {
        self.index
            .get(id)
            .and_then(|idx| self.definitions.get(*idx))
            .ok_or_else(|| ReportError::UnknownQuery(id.to_string()))
    }

    /// Definitions in registration order, optionally restricted to one tier
    ///
    /// The iterator is cloneable, so the sequence can be walked again.
    pub fn list(&self, tier: Option<Tier>) -> impl Iterator<Item = &QueryDefinition> + Clone + '_ {
        self.definitions
            .iter()
            .filter(move |d| tier.map_or(true, |t| d.tier == t))
    }

    /// Listing records for display or serialization
    pub fn entries(&self, tier: Option<Tier>) -> Vec<CatalogEntry> {
        self.list(tier).map(QueryDefinition::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Entity;
    use crate::query::definition::{Aggregate, Computation, Expr, Grouping};
    use crate::query::QueryPlanner;
    use crate::types::Params;
    use proptest::prelude::*;

    fn definition(id: &str, tier: Tier) -> QueryDefinition {
        QueryDefinition::new(
            id,
            tier,
            "test report",
            Computation::SimpleAggregation {
                grouping: Grouping::new(Entity::Orders).measure(
                    "order_count",
                    Aggregate::Count,
                    Expr::field(Entity::Orders, "order_id"),
                ),
                order_by: vec![],
                limit: None,
            },
        )
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = CatalogRegistry::new();
        let def = definition("orders", Tier::Basic);
        registry.register(def.clone()).unwrap();
        assert_eq!(registry.get("orders").unwrap(), &def);
    }

    #[test]
    fn test_register_duplicate() {
        let mut registry = CatalogRegistry::new();
        registry.register(definition("orders", Tier::Basic)).unwrap();
        let err = registry
            .register(definition("orders", Tier::Advanced))
            .unwrap_err();
        assert!(matches!(err, ReportError::DuplicateQueryId(id) if id == "orders"));
        assert_eq!(registry.get("orders").unwrap().tier, Tier::Basic);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_unknown() {
        let registry = CatalogRegistry::new();
        assert!(matches!(
            registry.get("nope"),
            Err(ReportError::UnknownQuery(_))
        ));
    }

    #[test]
    fn test_list_filters_and_restarts() {
        let mut registry = CatalogRegistry::new();
        registry.register(definition("a", Tier::Basic)).unwrap();
        registry.register(definition("b", Tier::Advanced)).unwrap();
        registry.register(definition("c", Tier::Basic)).unwrap();

        let basic = registry.list(Some(Tier::Basic));
        let first: Vec<&str> = basic.clone().map(|d| d.id.as_str()).collect();
        let second: Vec<&str> = basic.map(|d| d.id.as_str()).collect();
        assert_eq!(first, vec!["a", "c"]);
        assert_eq!(first, second);
        assert_eq!(registry.list(None).count(), 3);
        assert_eq!(registry.list(Some(Tier::Intermediate)).count(), 0);
    }

    #[test]
    fn test_every_builtin_registers() {
        let registry = CatalogRegistry::with_builtins().unwrap();
        assert_eq!(registry.len(), builtin::definitions().len());
    }

    #[test]
    fn test_from_definitions_rejects_duplicates() {
        let err = CatalogRegistry::from_definitions(vec![
            definition("orders", Tier::Basic),
            definition("sizes", Tier::Basic),
            definition("orders", Tier::Advanced),
        ])
        .unwrap_err();
        assert!(matches!(err, ReportError::DuplicateQueryId(id) if id == "orders"));
    }

    #[test]
    fn test_global_catalog_contents() {
        let catalog = CatalogRegistry::global();
        assert_eq!(catalog.len(), 15);
        assert_eq!(catalog.list(Some(Tier::Basic)).count(), 5);
        assert_eq!(catalog.list(Some(Tier::Intermediate)).count(), 6);
        assert_eq!(catalog.list(Some(Tier::Advanced)).count(), 4);
        assert!(std::ptr::eq(catalog, CatalogRegistry::global()));
    }

    #[test]
    fn test_builtins_pass_schema_checks() {
        let planner = QueryPlanner::new();
        for definition in CatalogRegistry::global().list(None) {
            let mut params = Params::new();
            for spec in definition.params.iter().filter(|p| p.required) {
                params.insert(spec.name.clone(), 2);
            }
            planner
                .plan(definition, &params)
                .unwrap_or_else(|e| panic!("{} failed to plan: {}", definition.id, e));
        }
    }

    #[test]
    fn test_entries_serialize() {
        let entries = CatalogRegistry::global().entries(Some(Tier::Advanced));
        let json = serde_json::to_value(&entries).unwrap();
        assert_eq!(json[0]["tier"], "advanced");
        assert!(json[0]["parameter_schema"].is_array());
    }

    proptest! {
        #[test]
        fn prop_register_then_get_round_trips(
            ids in proptest::collection::hash_set("[a-z_]{1,12}", 1..20),
            tiers in proptest::collection::vec(0usize..3, 20),
        ) {
            let mut registry = CatalogRegistry::new();
            let mut registered = Vec::new();
            for (id, tier) in ids.iter().zip(tiers.iter()) {
                let def = definition(id, Tier::ALL[*tier]);
                registry.register(def.clone()).unwrap();
                registered.push(def);
            }
            for def in &registered {
                prop_assert_eq!(registry.get(&def.id).unwrap(), def);
            }
            for tier in Tier::ALL {
                let listed: Vec<&QueryDefinition> = registry.list(Some(tier)).collect();
                let expected: Vec<&QueryDefinition> =
                    registered.iter().filter(|d| d.tier == tier).collect();
                prop_assert_eq!(listed, expected);
            }
        }
    }
}
