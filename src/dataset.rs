//! Dataset files.
//!
//! A dataset declares entity types with their id generation and a list of
//! rows. Rows are either written as inserts or stand for entities that exist
//! in the database already (references). Links between rows are rendered
//! through the id expressions of the linked rows.
//!
//! ```yaml
//! entities:
//!   - name: Author
//!     id: { column: id, generator: { strategy: sequence, name: author_seq } }
//!     natural_key: [name]
//!   - name: Book
//! rows:
//!   - { entity: Author, key: tolkien, reference: unknown, values: { name: Tolkien } }
//!   - { entity: Book, key: hobbit, values: { title: The Hobbit }, links: { author_id: tolkien } }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::context::GenerationContext;
use crate::entity::{EntityClass, IdType};
use crate::error::GeneratorError;
use crate::generator::GenerationStrategy;
use crate::property::{IdState, IdentifierProperty};
use crate::statements::{ColumnExpression, TableStatement};
use crate::writer::StatementsWriter;

/// Entity types and rows of one generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub entities: Vec<EntityDef>,

    #[serde(default)]
    pub rows: Vec<RowDef>,
}

/// An entity type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,

    /// Table name, defaults to the snake case entity name.
    #[serde(default)]
    pub table: Option<String>,

    #[serde(default)]
    pub id: IdDef,

    /// Columns that identify a row that is referenced with unknown id.
    #[serde(default)]
    pub natural_key: Vec<String>,
}

impl EntityDef {
    pub fn entity_class(&self) -> EntityClass {
        let class = EntityClass::new(self.name.as_str());
        match &self.table {
            Some(table) => class.with_table(table.as_str()),
            None => class,
        }
    }
}

/// Id column of an entity type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdDef {
    #[serde(default = "default_id_column")]
    pub column: String,

    #[serde(default, rename = "type")]
    pub id_type: IdType,

    /// Ids that can't be NULL in the entity model.
    #[serde(default)]
    pub primitive: bool,

    #[serde(default = "default_generator")]
    pub generator: GenerationStrategy,
}

fn default_id_column() -> String {
    "id".to_string()
}

fn default_generator() -> GenerationStrategy {
    GenerationStrategy::Identity
}

impl Default for IdDef {
    fn default() -> Self {
        IdDef {
            column: default_id_column(),
            id_type: IdType::default(),
            primitive: false,
            generator: default_generator(),
        }
    }
}

/// A row of the dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowDef {
    pub entity: String,

    /// Identifies the row inside the dataset, used by links.
    pub key: String,

    /// Marks a row that exists in the database already.
    #[serde(default)]
    pub reference: Option<ReferenceDef>,

    #[serde(default)]
    pub values: IndexMap<String, serde_yaml::Value>,

    /// Column name -> key of the linked row.
    #[serde(default)]
    pub links: IndexMap<String, String>,
}

/// An existing row, with or without its id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReferenceDef {
    Known { id: i64 },
    Unknown(UnknownId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownId {
    Unknown,
}

impl Dataset {
    /// Load a dataset from a YAML file, or from JSON if the file ends with `.json`.
    ///
    /// # Example
    /// ```ignore
    /// let dataset = Dataset::load_from_file("data/library.yaml")?;
    /// println!("{} rows", dataset.rows.len());
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, GeneratorError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            GeneratorError::Dataset(format!("Failed to read dataset {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&contents)
                .map_err(|e| GeneratorError::Dataset(format!("Failed to parse JSON: {}", e)))
        } else {
            Self::from_yaml(&contents)
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, GeneratorError> {
        serde_yaml::from_str(contents)
            .map_err(|e| GeneratorError::Dataset(format!("Failed to parse YAML: {}", e)))
    }
}

struct PlannedEntity<'d> {
    def: &'d EntityDef,
    class: EntityClass,
    property: IdentifierProperty<String>,
}

/// A dataset whose entity types are registered in a generation context.
pub struct DatasetPlan<'d> {
    dataset: &'d Dataset,
    entities: IndexMap<&'d str, PlannedEntity<'d>>,
    rows_by_key: HashMap<&'d str, &'d RowDef>,
}

impl<'d> DatasetPlan<'d> {
    /// Registers all entity types and their generators in `context`.
    ///
    /// Needs to happen before a connected writer is created, so the writer
    /// can synchronize all generators.
    pub fn prepare(
        dataset: &'d Dataset,
        context: &mut GenerationContext,
    ) -> Result<Self, GeneratorError> {
        let mut entities = IndexMap::new();
        for def in &dataset.entities {
            let class = def.entity_class();
            let property = IdentifierProperty::new(
                context,
                &class,
                &def.id.column,
                def.id.id_type,
                &def.id.generator,
            )?
            .with_primitive(def.id.primitive);
            let planned = PlannedEntity {
                def,
                class,
                property,
            };
            if entities.insert(def.name.as_str(), planned).is_some() {
                return Err(GeneratorError::Dataset(format!(
                    "Entity declared twice: {}",
                    def.name
                )));
            }
        }

        let mut rows_by_key = HashMap::new();
        for row in &dataset.rows {
            if !entities.contains_key(row.entity.as_str()) {
                return Err(GeneratorError::Dataset(format!(
                    "Row {} has undeclared entity {}",
                    row.key, row.entity
                )));
            }
            if rows_by_key.insert(row.key.as_str(), row).is_some() {
                return Err(GeneratorError::Dataset(format!(
                    "Row key used twice: {}",
                    row.key
                )));
            }
        }
        for row in &dataset.rows {
            for target in row.links.values() {
                if !rows_by_key.contains_key(target.as_str()) {
                    return Err(GeneratorError::Dataset(format!(
                        "Row {} links to unknown row {}",
                        row.key, target
                    )));
                }
            }
        }

        debug!(
            entities = entities.len(),
            rows = rows_by_key.len(),
            "prepared dataset"
        );
        Ok(Self {
            dataset,
            entities,
            rows_by_key,
        })
    }

    /// Writes all rows in file order and returns the count of inserted rows.
    pub fn write_rows(&mut self, writer: &mut dyn StatementsWriter) -> Result<u64, GeneratorError> {
        let dataset = self.dataset;
        let mut inserted = 0;
        let mut current_entity: Option<&str> = None;

        for row in &dataset.rows {
            if current_entity != Some(row.entity.as_str()) {
                if current_entity.is_some() {
                    writer.write_section_separator()?;
                }
                writer.write_comment(&row.entity)?;
                current_entity = Some(row.entity.as_str());
            }

            match &row.reference {
                Some(ReferenceDef::Unknown(_)) => {
                    self.entity_mut(&row.entity)?.property.mark_reference(&row.key);
                }
                Some(ReferenceDef::Known { id }) => {
                    self.entity_mut(&row.entity)?
                        .property
                        .mark_reference_with_id(&row.key, *id)?;
                }
                None => {
                    self.insert_row(row, writer)?;
                    inserted += 1;
                }
            }
        }

        info!("{} rows inserted", inserted);
        Ok(inserted)
    }

    fn insert_row(
        &mut self,
        row: &'d RowDef,
        writer: &mut dyn StatementsWriter,
    ) -> Result<(), GeneratorError> {
        // The id goes first: links to rows of the same counter are rendered
        // relative to the position after this insert.
        let entity = self.entity_mut(&row.entity)?;
        let mut statement = TableStatement::insert(entity.class.table());
        entity.property.create_pre_insert_statements(writer, &row.key)?;
        entity.property.add_insert_expression(&mut statement, &row.key)?;

        for (column, value) in &row.values {
            statement.set_column_value(column.as_str(), convert_value(value, row, column)?);
        }
        for (column, target) in &row.links {
            let link = self.link_expression(row, target)?;
            statement.set_column_value(column.as_str(), link);
        }
        writer.write_statement(&statement.into())?;
        self.entity_mut(&row.entity)?.property.post_insert(&row.key)
    }

    /// Renders the id of the row with key `target`.
    fn link_expression(&self, row: &RowDef, target: &str) -> Result<ColumnExpression, GeneratorError> {
        let target_row = self.rows_by_key.get(target).copied().ok_or_else(|| {
            GeneratorError::Dataset(format!("Row {} links to unknown row {}", row.key, target))
        })?;
        let target_key = target_row.key.clone();
        let entity = self.entity(&target_row.entity)?;

        if entity.property.state(&target_key) == IdState::UnknownReference {
            return self.natural_key_expression(entity, target_row);
        }
        entity
            .property
            .get_expression(&target_key, false)?
            .ok_or_else(|| {
                GeneratorError::Dataset(format!(
                    "Row {} links to row {} before it is written",
                    row.key, target
                ))
            })
    }

    /// Selects the id of an existing row by its natural key.
    fn natural_key_expression(
        &self,
        entity: &PlannedEntity<'d>,
        row: &RowDef,
    ) -> Result<ColumnExpression, GeneratorError> {
        if entity.def.natural_key.is_empty() {
            return Err(GeneratorError::Dataset(format!(
                "Row {} is referenced without id, but {} has no natural key",
                row.key, entity.def.name
            )));
        }
        let dialect = entity.property.dialect();
        let mut conditions = Vec::with_capacity(entity.def.natural_key.len());
        for column in &entity.def.natural_key {
            let value = row.values.get(column).ok_or_else(|| {
                GeneratorError::Dataset(format!(
                    "Row {} has no value for natural key column {}",
                    row.key, column
                ))
            })?;
            let value = convert_value(value, row, column)?;
            conditions.push(format!("{} = {}", column, value.to_sql(dialect)));
        }
        Ok(ColumnExpression::formula(format!(
            "(SELECT {} FROM {} WHERE {})",
            entity.property.column().name,
            entity.class.table(),
            conditions.join(" AND ")
        )))
    }

    fn entity(&self, name: &str) -> Result<&PlannedEntity<'d>, GeneratorError> {
        self.entities
            .get(name)
            .ok_or_else(|| GeneratorError::Dataset(format!("Undeclared entity {}", name)))
    }

    fn entity_mut(&mut self, name: &str) -> Result<&mut PlannedEntity<'d>, GeneratorError> {
        self.entities
            .get_mut(name)
            .ok_or_else(|| GeneratorError::Dataset(format!("Undeclared entity {}", name)))
    }

    /// The id property of an entity type, for inspection after a run.
    pub fn property(&self, entity: &str) -> Option<&IdentifierProperty<String>> {
        self.entities.get(entity).map(|e| &e.property)
    }
}

fn convert_value(
    value: &serde_yaml::Value,
    row: &RowDef,
    column: &str,
) -> Result<ColumnExpression, GeneratorError> {
    use serde_yaml::Value;
    match value {
        Value::Null => Ok(ColumnExpression::Null),
        Value::Bool(b) => Ok(ColumnExpression::Bool(*b)),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(ColumnExpression::Number(i)),
            (None, Some(f)) => Ok(ColumnExpression::Decimal(f)),
            _ => Err(unsupported_value(row, column)),
        },
        Value::String(s) => Ok(ColumnExpression::text(s.as_str())),
        _ => Err(unsupported_value(row, column)),
    }
}

fn unsupported_value(row: &RowDef, column: &str) -> GeneratorError {
    GeneratorError::Dataset(format!(
        "Unsupported value for {}.{} in row {}",
        row.entity, column, row.key
    ))
}
