//! Schema descriptor for the pizza-sales dataset
//!
//! Describes the four entities (orders, order details, pizzas, pizza
//! categories), their fields and their foreign keys. Report definitions are
//! checked against it before dispatch, and join paths are resolved from it.
//!
//! # Example
//!
//! ```rust
//! use pizza_reports::database::{Entity, FieldRef, SchemaDescriptor};
//!
//! let schema = SchemaDescriptor::pizza_sales();
//! let price = schema.field(&FieldRef::new(Entity::Pizzas, "price"))?;
//! let joins = schema.join_path(Entity::OrderDetails, Entity::PizzaCategories)?;
//! assert_eq!(joins.len(), 2);
//! # Ok::<(), pizza_reports::ReportError>(())
//! ```

use crate::error::ReportError;
use crate::types::{Column, DataType, Table};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Entities of the pizza-sales dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Orders,
    OrderDetails,
    Pizzas,
    PizzaCategories,
}

impl Entity {
    pub const ALL: [Entity; 4] = [
        Entity::Orders,
        Entity::OrderDetails,
        Entity::Pizzas,
        Entity::PizzaCategories,
    ];

    /// Table name as used by data stores
    pub fn table_name(&self) -> &'static str {
        match self {
            Entity::Orders => "orders",
            Entity::OrderDetails => "order_details",
            Entity::Pizzas => "pizzas",
            Entity::PizzaCategories => "pizza_categories",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for Entity {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Entity::ALL
            .into_iter()
            .find(|e| e.table_name() == s)
            .ok_or_else(|| ReportError::SchemaMismatch(format!("unknown entity {}", s)))
    }
}

/// Reference to one field of one entity, e.g. `pizzas.price`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub entity: Entity,
    pub field: String,
}

impl FieldRef {
    pub fn new(entity: Entity, field: impl Into<String>) -> Self {
        Self {
            entity,
            field: field.into(),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.field)
    }
}

/// Field of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub data_type: DataType,
}

/// Many-to-one relationship from a field to another entity's key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub field: &'static str,
    pub references: Entity,
    pub target_field: &'static str,
}

/// One entity of the schema
#[derive(Debug, Clone, Copy)]
pub struct EntityDescriptor {
    pub entity: Entity,
    pub primary_key: &'static str,
    pub fields: &'static [FieldDescriptor],
    pub foreign_keys: &'static [ForeignKey],
}

impl EntityDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Empty table with this entity's columns, in declared order
    pub fn empty_table(&self) -> Table {
        let columns = self
            .fields
            .iter()
            .map(|f| Column::new(f.name.to_string(), f.data_type))
            .collect();
        Table::new(self.entity.table_name().to_string(), columns)
    }
}

/// Join along a foreign key: `from.field = to.target_field`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOperation {
    pub from: Entity,
    pub from_field: String,
    pub to: Entity,
    pub to_field: String,
}

const fn field(name: &'static str, data_type: DataType) -> FieldDescriptor {
    FieldDescriptor { name, data_type }
}

static ENTITIES: [EntityDescriptor; 4] = [
    EntityDescriptor {
        entity: Entity::Orders,
        primary_key: "order_id",
        fields: &[
            field("order_id", DataType::Integer),
            field("order_date", DataType::Date),
            field("order_time", DataType::Time),
        ],
        foreign_keys: &[],
    },
    EntityDescriptor {
        entity: Entity::OrderDetails,
        primary_key: "order_details_id",
        fields: &[
            field("order_details_id", DataType::Integer),
            field("order_id", DataType::Integer),
            field("pizza_id", DataType::Text),
            field("quantity", DataType::Integer),
        ],
        foreign_keys: &[
            ForeignKey {
                field: "order_id",
                references: Entity::Orders,
                target_field: "order_id",
            },
            ForeignKey {
                field: "pizza_id",
                references: Entity::Pizzas,
                target_field: "pizza_id",
            },
        ],
    },
    EntityDescriptor {
        entity: Entity::Pizzas,
        primary_key: "pizza_id",
        fields: &[
            field("pizza_id", DataType::Text),
            field("name", DataType::Text),
            field("category_id", DataType::Text),
            field("size", DataType::Text),
            field("price", DataType::Decimal),
        ],
        foreign_keys: &[ForeignKey {
            field: "category_id",
            references: Entity::PizzaCategories,
            target_field: "category_id",
        }],
    },
    EntityDescriptor {
        entity: Entity::PizzaCategories,
        primary_key: "category_id",
        fields: &[
            field("category_id", DataType::Text),
            field("name", DataType::Text),
        ],
        foreign_keys: &[],
    },
];

static PIZZA_SALES: SchemaDescriptor = SchemaDescriptor {
    entities: &ENTITIES,
};

/// Static description of the dataset's entities and relationships
#[derive(Debug)]
pub struct SchemaDescriptor {
    entities: &'static [EntityDescriptor],
}

impl SchemaDescriptor {
    /// The pizza-sales schema
    pub fn pizza_sales() -> &'static SchemaDescriptor {
        &PIZZA_SALES
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.entities.iter()
    }

    pub fn entity(&self, entity: Entity) -> Result<&EntityDescriptor, ReportError> {
        self.entities
            .iter()
            .find(|e| e.entity == entity)
            .ok_or_else(|| {
                ReportError::SchemaMismatch(format!("entity {} is not described", entity))
            })
    }

    /// Look up a referenced field
    pub fn field(&self, field_ref: &FieldRef) -> Result<&FieldDescriptor, ReportError> {
        self.entity(field_ref.entity)?
            .field(&field_ref.field)
            .ok_or_else(|| ReportError::SchemaMismatch(format!("unknown field {}", field_ref)))
    }

    /// Shortest chain of many-to-one joins leading from `base` to `target`
    ///
    /// Only foreign keys are followed, so joining never multiplies base rows.
    pub fn join_path(
        &self,
        base: Entity,
        target: Entity,
    ) -> Result<Vec<JoinOperation>, ReportError> {
        let mut queue = VecDeque::from([(base, Vec::<JoinOperation>::new())]);
        let mut seen = vec![base];

        while let Some((entity, path)) = queue.pop_front() {
            if entity == target {
                return Ok(path);
            }
            for fk in self.entity(entity)?.foreign_keys {
                if seen.contains(&fk.references) {
                    continue;
                }
                seen.push(fk.references);
                let mut next = path.clone();
                next.push(JoinOperation {
                    from: entity,
                    from_field: fk.field.to_string(),
                    to: fk.references,
                    to_field: fk.target_field.to_string(),
                });
                queue.push_back((fk.references, next));
            }
        }

        Err(ReportError::SchemaMismatch(format!(
            "{} is not reachable from {} through foreign keys",
            target, base
        )))
    }

    /// Joins needed to reach every entity in `targets` from `base`
    ///
    /// Shared prefixes are emitted once, in the order first needed.
    pub fn resolve_joins<I>(
        &self,
        base: Entity,
        targets: I,
    ) -> Result<Vec<JoinOperation>, ReportError>
    where
        I: IntoIterator<Item = Entity>,
    {
        let mut joins: Vec<JoinOperation> = Vec::new();
        for target in targets {
            for join in self.join_path(base, target)? {
                if !joins.iter().any(|j| j.to == join.to) {
                    joins.push(join);
                }
            }
        }
        Ok(joins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_names_round_trip() {
        for entity in Entity::ALL {
            assert_eq!(entity.table_name().parse::<Entity>().unwrap(), entity);
        }
        assert!(matches!(
            "customers".parse::<Entity>(),
            Err(ReportError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_field_lookup() {
        let schema = SchemaDescriptor::pizza_sales();
        let price = schema.field(&FieldRef::new(Entity::Pizzas, "price")).unwrap();
        assert_eq!(price.data_type, DataType::Decimal);

        let err = schema
            .field(&FieldRef::new(Entity::Pizzas, "ingredients"))
            .unwrap_err();
        assert!(err.to_string().contains("pizzas.ingredients"));
    }

    #[test]
    fn test_join_path_follows_foreign_keys() {
        let schema = SchemaDescriptor::pizza_sales();
        let path = schema
            .join_path(Entity::OrderDetails, Entity::PizzaCategories)
            .unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].to, Entity::Pizzas);
        assert_eq!(path[1].from_field, "category_id");

        assert!(schema
            .join_path(Entity::OrderDetails, Entity::OrderDetails)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_join_path_rejects_one_to_many() {
        let schema = SchemaDescriptor::pizza_sales();
        let err = schema
            .join_path(Entity::Orders, Entity::OrderDetails)
            .unwrap_err();
        assert!(matches!(err, ReportError::SchemaMismatch(_)));
    }

    #[test]
    fn test_resolve_joins_deduplicates() {
        let schema = SchemaDescriptor::pizza_sales();
        let joins = schema
            .resolve_joins(
                Entity::OrderDetails,
                [Entity::Pizzas, Entity::PizzaCategories, Entity::Orders],
            )
            .unwrap();
        let targets: Vec<Entity> = joins.iter().map(|j| j.to).collect();
        assert_eq!(
            targets,
            vec![Entity::Pizzas, Entity::PizzaCategories, Entity::Orders]
        );
    }

    #[test]
    fn test_empty_table_columns() {
        let schema = SchemaDescriptor::pizza_sales();
        let table = schema.entity(Entity::OrderDetails).unwrap().empty_table();
        assert_eq!(table.name, "order_details");
        assert_eq!(table.num_columns(), 4);
    }
}
