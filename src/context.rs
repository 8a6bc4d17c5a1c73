//! Generation context.
//!
//! Holds the configuration of one generation run, the dialect and the
//! registry of generators. Entity classes and generators are collected in
//! discovery order; initializing generators against a database is a separate
//! step done by the [`ConnectedWriter`](crate::writer::ConnectedWriter).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

use crate::dialect::{Dialect, DialectKind};
use crate::entity::EntityClass;
use crate::error::GeneratorError;
use crate::generator::{
    GenerationStrategy, GeneratorKey, IdentityGenerator, SequenceGenerator, SharedGenerator,
    TableGenerator,
};
use crate::writer::StatementsWriter;

/// Settings of a generation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Write ids relative to the current counter values (portable scripts).
    #[serde(default = "default_true")]
    pub write_relative_ids: bool,

    #[serde(default)]
    pub dialect: DialectKind,

    /// Fail if a generator can't be read from the database instead of keeping
    /// its current value.
    #[serde(default)]
    pub strict_generator_sync: bool,

    /// Seconds between two progress messages of a connected run.
    #[serde(default = "default_progress_interval")]
    pub progress_interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_progress_interval() -> u64 {
    60
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            write_relative_ids: true,
            dialect: DialectKind::default(),
            strict_generator_sync: false,
            progress_interval_secs: default_progress_interval(),
        }
    }
}

impl GenerationConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }
}

/// Notified about every entity class and generator found during a run.
pub trait ContextModelListener {
    fn found_entity_class(&mut self, entity_class: &EntityClass) {
        let _ = entity_class;
    }

    fn found_generator(&mut self, key: &GeneratorKey, generator: &SharedGenerator) {
        let _ = (key, generator);
    }
}

/// State of one generation run
pub struct GenerationContext {
    config: GenerationConfig,
    dialect: Rc<dyn Dialect>,
    entity_classes: IndexMap<String, EntityClass>,
    generators: IndexMap<GeneratorKey, SharedGenerator>,
    /// Strategy that created each generator.
    strategies: HashMap<GeneratorKey, GenerationStrategy>,
    listeners: Vec<Box<dyn ContextModelListener>>,
}

impl GenerationContext {
    /// Creates a context with the dialect named in the configuration.
    pub fn new(config: GenerationConfig) -> Self {
        let dialect = config.dialect.create();
        Self::with_dialect(config, dialect)
    }

    pub fn with_dialect(config: GenerationConfig, dialect: Rc<dyn Dialect>) -> Self {
        Self {
            config,
            dialect,
            entity_classes: IndexMap::new(),
            generators: IndexMap::new(),
            strategies: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn write_relative_ids(&self) -> bool {
        self.config.write_relative_ids
    }

    pub fn dialect(&self) -> Rc<dyn Dialect> {
        Rc::clone(&self.dialect)
    }

    pub fn add_listener(&mut self, listener: Box<dyn ContextModelListener>) {
        self.listeners.push(listener);
    }

    /// Registers an entity class, notifying listeners the first time it is seen.
    pub fn discover_entity_class(&mut self, entity_class: &EntityClass) {
        if self.entity_classes.contains_key(entity_class.name()) {
            return;
        }
        debug!(entity = entity_class.name(), table = entity_class.table(), "found entity class");
        self.entity_classes
            .insert(entity_class.name().to_string(), entity_class.clone());
        for listener in &mut self.listeners {
            listener.found_entity_class(entity_class);
        }
    }

    /// Entity classes in discovery order.
    pub fn entity_classes(&self) -> impl Iterator<Item = &EntityClass> {
        self.entity_classes.values()
    }

    /// Returns the generator of the physical counter used for `table`.`column`,
    /// creating it on first use.
    pub fn get_generator(
        &mut self,
        strategy: &GenerationStrategy,
        table: &str,
        column: &str,
    ) -> Result<SharedGenerator, GeneratorError> {
        let key = strategy.key(table, column);
        if let Some(generator) = self.generators.get(&key) {
            if let Some(existing) = self.strategies.get(&key) {
                if let Some(conflict) = strategy_conflict(existing, strategy) {
                    return Err(GeneratorError::Configuration(format!(
                        "{} is used with different {} ({}.{})",
                        key, conflict, table, column
                    )));
                }
            }
            return Ok(Rc::clone(generator));
        }

        let relative_ids = self.write_relative_ids();
        let dialect = self.dialect();
        let generator: SharedGenerator = match strategy {
            GenerationStrategy::Sequence { name, increment } => {
                if *increment < 1 {
                    return Err(GeneratorError::Configuration(format!(
                        "Sequence {} for {}.{} needs a positive increment, got {}",
                        name, table, column, increment
                    )));
                }
                if !dialect.is_sequence_supported() {
                    return Err(GeneratorError::Configuration(format!(
                        "{} does not support sequences (sequence {} for {}.{})",
                        dialect.name(),
                        name,
                        table,
                        column
                    )));
                }
                Rc::new(RefCell::new(SequenceGenerator::new(
                    dialect,
                    name.as_str(),
                    *increment,
                    relative_ids,
                )))
            }
            GenerationStrategy::Table {
                table: counter_table,
                key_column,
                value_column,
                allocation_size,
                ..
            } => {
                let row_key = match &key {
                    GeneratorKey::Table { key, .. } => key.clone(),
                    _ => table.to_string(),
                };
                Rc::new(RefCell::new(TableGenerator::new(
                    dialect,
                    counter_table.as_str(),
                    key_column.as_str(),
                    value_column.as_str(),
                    row_key,
                    *allocation_size,
                )))
            }
            GenerationStrategy::Identity => Rc::new(RefCell::new(IdentityGenerator::new(
                dialect,
                table,
                column,
                relative_ids,
            ))),
        };

        debug!(generator = %key, "found generator");
        self.generators.insert(key.clone(), Rc::clone(&generator));
        self.strategies.insert(key.clone(), strategy.clone());
        for listener in &mut self.listeners {
            listener.found_generator(&key, &generator);
        }
        Ok(generator)
    }

    /// Generators in discovery order.
    pub fn generators(&self) -> impl Iterator<Item = (&GeneratorKey, &SharedGenerator)> {
        self.generators.iter()
    }

    /// Lets every generator write the statements that make its database counter
    /// continue after the values created in this run.
    pub fn write_alignment_statements(
        &self,
        writer: &mut dyn StatementsWriter,
    ) -> Result<(), GeneratorError> {
        for generator in self.generators.values() {
            generator.borrow_mut().align_next_value(writer)?;
        }
        Ok(())
    }
}

/// Names the setting in which two strategies for the same counter differ.
fn strategy_conflict(
    existing: &GenerationStrategy,
    requested: &GenerationStrategy,
) -> Option<&'static str> {
    match (existing, requested) {
        (
            GenerationStrategy::Sequence { increment: a, .. },
            GenerationStrategy::Sequence { increment: b, .. },
        ) if a != b => Some("increments"),
        (
            GenerationStrategy::Table {
                allocation_size: a,
                ..
            },
            GenerationStrategy::Table {
                allocation_size: b,
                ..
            },
        ) if a != b => Some("allocation sizes"),
        (
            GenerationStrategy::Table {
                value_column: a, ..
            },
            GenerationStrategy::Table {
                value_column: b, ..
            },
        ) if a != b => Some("value columns"),
        _ => None,
    }
}
