//! Identifier properties.
//!
//! An [`IdentifierProperty`] binds the numeric id column of one entity type to
//! its generator and tracks, for every entity instance of that type, which
//! identifier has to be written for the entity itself and for every reference
//! to it.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use crate::context::GenerationContext;
use crate::dialect::Dialect;
use crate::entity::{ColumnDescriptor, EntityClass, IdType};
use crate::error::GeneratorError;
use crate::generator::{GenerationStrategy, SharedGenerator};
use crate::statements::{ColumnExpression, TableStatement};
use crate::writer::StatementsWriter;

/// Identifier state of one entity instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdState {
    /// Neither written nor referenced up to now.
    #[default]
    Unassigned,
    /// Exists in the database, but its id is unknown. Must be referenced by
    /// its unique properties.
    UnknownReference,
    /// Exists in the database with the given id.
    KnownReference(i64),
    /// Written in this run with the given (possibly relative) id.
    Assigned(i64),
}

impl IdState {
    /// Stored value that marks an unknown reference in the numeric encoding.
    pub const UNKNOWN_ID_MARKER: i64 = -1;

    /// Encodes this state into a single numeric id field.
    ///
    /// Known references are stored as `-2 - id`, so they never collide with
    /// [`Self::UNKNOWN_ID_MARKER`] or with generated (non-negative) ids.
    pub fn encode(self, primitive: bool) -> Option<i64> {
        match self {
            IdState::Unassigned => primitive.then_some(0),
            IdState::UnknownReference => Some(Self::UNKNOWN_ID_MARKER),
            IdState::KnownReference(id) => Some(encode_reference(id)),
            IdState::Assigned(id) => Some(id),
        }
    }

    /// Decodes a value written by [`Self::encode`].
    pub fn decode(stored: Option<i64>, primitive: bool) -> Self {
        match stored {
            None => IdState::Unassigned,
            Some(0) if primitive => IdState::Unassigned,
            Some(Self::UNKNOWN_ID_MARKER) => IdState::UnknownReference,
            Some(value) if value < 0 => IdState::KnownReference(decode_reference(value)),
            Some(value) => IdState::Assigned(value),
        }
    }
}

/// Largest id that a known reference can hold in the numeric encoding.
pub const MAX_REFERENCE_ID: i64 = i64::MAX - 1;

pub fn encode_reference(id: i64) -> i64 {
    -2 - id
}

pub fn decode_reference(stored: i64) -> i64 {
    -2 - stored
}

/// The generated id property of one entity type.
///
/// `K` identifies entity instances (a row key, a pointer, an index).
pub struct IdentifierProperty<K> {
    entity_class: EntityClass,
    column: ColumnDescriptor,
    id_type: IdType,
    primitive: bool,
    /// Write concrete ids instead of expressions relative to the generator.
    absolute_ids: bool,
    generator: SharedGenerator,
    dialect: Rc<dyn Dialect>,
    states: HashMap<K, IdState>,
}

impl<K> fmt::Debug for IdentifierProperty<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifierProperty")
            .field("entity_class", &self.entity_class)
            .field("column", &self.column)
            .field("id_type", &self.id_type)
            .field("absolute_ids", &self.absolute_ids)
            .field("generator", &self.generator.borrow().describe())
            .finish()
    }
}

impl<K: Eq + Hash + Clone + fmt::Debug> IdentifierProperty<K> {
    /// Creates the id property of `entity_class` and registers the entity class
    /// and its generator in the context.
    pub fn new(
        context: &mut GenerationContext,
        entity_class: &EntityClass,
        column: &str,
        id_type: IdType,
        strategy: &GenerationStrategy,
    ) -> Result<Self, GeneratorError> {
        context.discover_entity_class(entity_class);
        let dialect = context.dialect();
        let auto_generated =
            context.write_relative_ids() || !dialect.is_setting_identity_allowed();
        let generator = context.get_generator(strategy, entity_class.table(), column)?;
        Ok(Self {
            entity_class: entity_class.clone(),
            column: ColumnDescriptor::new(column, auto_generated),
            id_type,
            primitive: false,
            absolute_ids: !auto_generated,
            generator,
            dialect,
            states: HashMap::new(),
        })
    }

    /// Treats zero as "unset" in the numeric encoding, as for ids that can't be null.
    pub fn with_primitive(mut self, primitive: bool) -> Self {
        self.primitive = primitive;
        self
    }

    pub fn entity_class(&self) -> &EntityClass {
        &self.entity_class
    }

    pub fn column(&self) -> &ColumnDescriptor {
        &self.column
    }

    pub fn id_type(&self) -> IdType {
        self.id_type
    }

    pub fn is_absolute_ids(&self) -> bool {
        self.absolute_ids
    }

    pub fn is_primitive(&self) -> bool {
        self.primitive
    }

    pub fn generator(&self) -> &SharedGenerator {
        &self.generator
    }

    pub fn state(&self, entity: &K) -> IdState {
        self.states.get(entity).copied().unwrap_or_default()
    }

    fn set_state(&mut self, entity: &K, state: IdState) {
        self.states.insert(entity.clone(), state);
    }

    /// Adds the id of a new entity to its insert statement.
    ///
    /// Post-increment generators leave the column out, the id is assigned in
    /// [`Self::post_insert`].
    pub fn add_insert_expression(
        &mut self,
        statement: &mut TableStatement,
        entity: &K,
    ) -> Result<(), GeneratorError> {
        self.ensure_is_new(entity)?;
        if self.absolute_ids {
            let id = self.generator.borrow_mut().create_next_value(self.id_type)?;
            self.set_state(entity, IdState::Assigned(id));
            statement.set_column_value(self.column.name.as_str(), ColumnExpression::literal(id));
        } else if !self.generator.borrow().is_post_increment() {
            let id = self.generator.borrow_mut().create_next_value(self.id_type)?;
            self.set_state(entity, IdState::Assigned(id));
            self.generator
                .borrow()
                .add_next_value(statement, &self.column.name, id);
        }
        Ok(())
    }

    /// Writes the statements the generator needs before the insert of `entity`.
    pub fn create_pre_insert_statements(
        &self,
        writer: &mut dyn StatementsWriter,
        entity: &K,
    ) -> Result<(), GeneratorError> {
        let _ = entity;
        if !self.absolute_ids {
            self.generator
                .borrow_mut()
                .create_pre_insert_statements(writer)?;
        }
        Ok(())
    }

    fn ensure_is_new(&self, entity: &K) -> Result<(), GeneratorError> {
        if !self.is_new(entity) {
            return Err(GeneratorError::precondition(format!(
                "Tried to create entity twice: {} {:?}",
                self.entity_class.name(),
                entity
            )));
        }
        Ok(())
    }

    /// Renders a reference to `entity`.
    ///
    /// Returns `None` if the entity was neither written nor marked as reference.
    /// Fails for references with unknown id, those have to be resolved by their
    /// unique properties.
    pub fn get_expression(
        &self,
        entity: &K,
        in_where: bool,
    ) -> Result<Option<ColumnExpression>, GeneratorError> {
        match self.state(entity) {
            IdState::Unassigned => Ok(None),
            IdState::UnknownReference => Err(GeneratorError::precondition(format!(
                "Entity must be referenced by an unique property: {} {:?}",
                self.entity_class.name(),
                entity
            ))),
            IdState::KnownReference(id) => Ok(Some(ColumnExpression::literal(id))),
            IdState::Assigned(id) if self.absolute_ids => Ok(Some(ColumnExpression::literal(id))),
            IdState::Assigned(id) => {
                let sql = self.generator.borrow().get_expression(
                    Some(self.entity_class.table()),
                    Some(&self.column.name),
                    id,
                    in_where,
                );
                Ok(Some(ColumnExpression::formula(sql)))
            }
        }
    }

    /// Indicates that `entity` was neither written nor referenced up to now.
    pub fn is_new(&self, entity: &K) -> bool {
        self.state(entity) == IdState::Unassigned
    }

    /// Indicates that `entity` exists in the database already.
    pub fn is_reference(&self, entity: &K) -> bool {
        matches!(
            self.state(entity),
            IdState::UnknownReference | IdState::KnownReference(_)
        )
    }

    /// Marks a new entity as existing in the database with unknown id.
    pub fn mark_reference(&mut self, entity: &K) {
        if self.is_new(entity) {
            self.set_state(entity, IdState::UnknownReference);
        }
    }

    /// Marks a new entity as existing in the database with the given id.
    pub fn mark_reference_with_id(&mut self, entity: &K, id: i64) -> Result<(), GeneratorError> {
        if id < 0 {
            return Err(GeneratorError::precondition(format!(
                "Referenced id must not be negative: {} {:?} -> {}",
                self.entity_class.name(),
                entity,
                id
            )));
        }
        if id > MAX_REFERENCE_ID {
            return Err(GeneratorError::Overflow {
                value: id,
                id_type: self.id_type,
            });
        }
        self.id_type.check(id)?;
        if self.is_new(entity) {
            self.set_state(entity, IdState::KnownReference(id));
        }
        Ok(())
    }

    /// Called after the insert of `entity` was written.
    pub fn post_insert(&mut self, entity: &K) -> Result<(), GeneratorError> {
        if !self.absolute_ids && self.generator.borrow().is_post_increment() {
            let id = self.generator.borrow_mut().create_next_value(self.id_type)?;
            self.set_state(entity, IdState::Assigned(id));
        }
        Ok(())
    }

    /// The id of `entity`, if it is known at generation time.
    pub fn id(&self, entity: &K) -> Option<i64> {
        match self.state(entity) {
            IdState::KnownReference(id) => Some(id),
            IdState::Assigned(id) if self.absolute_ids => Some(id),
            _ => None,
        }
    }

    /// The state of `entity` in the single-field numeric encoding.
    pub fn stored_value(&self, entity: &K) -> Option<i64> {
        self.state(entity).encode(self.primitive)
    }

    /// Restores the state of `entity` from the single-field numeric encoding.
    pub fn import_stored_value(&mut self, entity: &K, stored: Option<i64>) {
        match IdState::decode(stored, self.primitive) {
            IdState::Unassigned => {
                self.states.remove(entity);
            }
            state => self.set_state(entity, state),
        }
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GenerationConfig;
    use crate::dialect::DialectKind;
    use crate::writer::testing::RecordingWriter;

    const SEQ: &str =
        "(SELECT CASE WHEN is_called THEN last_value ELSE last_value - 1 END FROM book_seq)";

    fn property(relative: bool, strategy: GenerationStrategy) -> IdentifierProperty<&'static str> {
        let config = GenerationConfig {
            write_relative_ids: relative,
            dialect: DialectKind::Postgres,
            ..GenerationConfig::default()
        };
        let mut ctx = GenerationContext::new(config);
        IdentifierProperty::new(&mut ctx, &EntityClass::new("Book"), "id", IdType::BigInt, &strategy)
            .unwrap()
    }

    fn insert(prop: &mut IdentifierProperty<&'static str>, entity: &'static str) -> TableStatement {
        let mut stmt = TableStatement::insert("book");
        prop.add_insert_expression(&mut stmt, &entity).unwrap();
        stmt
    }

    #[test]
    fn test_encoding_round_trip() {
        for id in [0, 1, 41, MAX_REFERENCE_ID] {
            assert_eq!(decode_reference(encode_reference(id)), id);
            assert_ne!(encode_reference(id), IdState::UNKNOWN_ID_MARKER);
            let state = IdState::KnownReference(id);
            assert_eq!(IdState::decode(state.encode(false), false), state);
        }
        assert_eq!(IdState::decode(Some(0), true), IdState::Unassigned);
        assert_eq!(IdState::decode(Some(0), false), IdState::Assigned(0));
        assert_eq!(IdState::decode(Some(-1), false), IdState::UnknownReference);
        assert_eq!(IdState::Unassigned.encode(false), None);
        assert_eq!(IdState::Unassigned.encode(true), Some(0));
    }

    #[test]
    fn test_relative_sequence_ids() {
        let mut prop = property(true, GenerationStrategy::sequence("book_seq"));
        assert!(!prop.is_absolute_ids());
        assert!(prop.column().auto_generated);

        let first = insert(&mut prop, "dune");
        let _second = insert(&mut prop, "emma");

        assert_eq!(prop.state(&"dune"), IdState::Assigned(1));
        assert_eq!(prop.state(&"emma"), IdState::Assigned(2));
        assert_eq!(
            first.column_value("id"),
            Some(&ColumnExpression::formula("nextval('book_seq')"))
        );
        assert_eq!(
            prop.get_expression(&"dune", false).unwrap(),
            Some(ColumnExpression::formula(format!("({} - 1)", SEQ)))
        );
        assert_eq!(
            prop.get_expression(&"emma", false).unwrap(),
            Some(ColumnExpression::formula(SEQ))
        );
        assert_eq!(prop.id(&"dune"), None);
    }

    #[test]
    fn test_absolute_ids_are_literals() {
        let mut prop = property(false, GenerationStrategy::sequence("book_seq"));
        assert!(prop.is_absolute_ids());

        let stmt = insert(&mut prop, "dune");
        assert_eq!(stmt.column_value("id"), Some(&ColumnExpression::literal(1)));
        assert_eq!(
            prop.get_expression(&"dune", true).unwrap(),
            Some(ColumnExpression::literal(1))
        );
        assert_eq!(prop.id(&"dune"), Some(1));
    }

    #[test]
    fn test_insert_twice_fails() {
        let mut prop = property(true, GenerationStrategy::sequence("book_seq"));
        insert(&mut prop, "dune");

        let mut stmt = TableStatement::insert("book");
        let result = prop.add_insert_expression(&mut stmt, &"dune");
        assert!(matches!(result, Err(GeneratorError::Precondition(_))));
        assert_eq!(prop.state(&"dune"), IdState::Assigned(1));
    }

    #[test]
    fn test_insert_of_reference_fails() {
        let mut prop = property(true, GenerationStrategy::sequence("book_seq"));
        prop.mark_reference(&"dune");
        let mut stmt = TableStatement::insert("book");
        assert!(prop.add_insert_expression(&mut stmt, &"dune").is_err());
    }

    #[test]
    fn test_new_until_assigned() {
        let mut prop = property(true, GenerationStrategy::sequence("book_seq"));
        assert!(prop.is_new(&"dune"));
        assert_eq!(prop.get_expression(&"dune", false).unwrap(), None);

        insert(&mut prop, "dune");
        assert!(!prop.is_new(&"dune"));
        assert!(!prop.is_reference(&"dune"));
        assert!(prop.get_expression(&"dune", false).unwrap().is_some());
    }

    #[test]
    fn test_known_reference() {
        let mut prop = property(true, GenerationStrategy::sequence("book_seq"));
        prop.mark_reference_with_id(&"dune", 41).unwrap();

        assert_eq!(prop.stored_value(&"dune"), Some(-43));
        assert!(prop.is_reference(&"dune"));
        assert!(!prop.is_new(&"dune"));
        assert_eq!(
            prop.get_expression(&"dune", false).unwrap(),
            Some(ColumnExpression::literal(41))
        );
        assert_eq!(prop.id(&"dune"), Some(41));
    }

    #[test]
    fn test_unknown_reference() {
        let mut prop = property(true, GenerationStrategy::sequence("book_seq"));
        prop.mark_reference(&"dune");

        assert_eq!(prop.stored_value(&"dune"), Some(IdState::UNKNOWN_ID_MARKER));
        assert!(prop.is_reference(&"dune"));
        assert!(!prop.is_new(&"dune"));
        assert!(matches!(
            prop.get_expression(&"dune", false),
            Err(GeneratorError::Precondition(_))
        ));
    }

    #[test]
    fn test_mark_reference_is_idempotent() {
        let mut prop = property(true, GenerationStrategy::sequence("book_seq"));
        prop.mark_reference_with_id(&"dune", 41).unwrap();
        prop.mark_reference(&"dune");
        prop.mark_reference_with_id(&"dune", 7).unwrap();
        assert_eq!(prop.state(&"dune"), IdState::KnownReference(41));

        insert(&mut prop, "emma");
        prop.mark_reference(&"emma");
        assert_eq!(prop.state(&"emma"), IdState::Assigned(1));
    }

    #[test]
    fn test_negative_reference_id_is_rejected() {
        let mut prop = property(true, GenerationStrategy::sequence("book_seq"));
        assert!(prop.mark_reference_with_id(&"dune", -5).is_err());
        assert!(prop.is_new(&"dune"));
    }

    #[test]
    fn test_reference_id_must_fit_encoding() {
        let mut prop = property(true, GenerationStrategy::sequence("book_seq"));
        assert!(matches!(
            prop.mark_reference_with_id(&"dune", i64::MAX),
            Err(GeneratorError::Overflow { .. })
        ));
        assert!(prop.is_new(&"dune"));

        prop.mark_reference_with_id(&"emma", MAX_REFERENCE_ID).unwrap();
        assert_eq!(prop.stored_value(&"emma"), Some(i64::MIN));
        prop.import_stored_value(&"dune", Some(i64::MIN));
        assert_eq!(prop.state(&"dune"), IdState::KnownReference(MAX_REFERENCE_ID));
    }

    #[test]
    fn test_identity_id_known_after_insert() {
        let mut prop = property(true, GenerationStrategy::Identity);
        let stmt = insert(&mut prop, "dune");

        assert!(stmt.is_empty());
        assert!(prop.is_new(&"dune"));
        prop.post_insert(&"dune").unwrap();
        assert_eq!(prop.state(&"dune"), IdState::Assigned(1));
        assert_eq!(
            prop.get_expression(&"dune", false).unwrap(),
            Some(ColumnExpression::formula("(SELECT MAX(id) FROM book)"))
        );
    }

    #[test]
    fn test_post_insert_is_noop_for_other_generators() {
        let mut prop = property(true, GenerationStrategy::sequence("book_seq"));
        insert(&mut prop, "dune");
        prop.post_insert(&"dune").unwrap();
        assert_eq!(prop.state(&"dune"), IdState::Assigned(1));
        assert_eq!(prop.generator().borrow().current_value(), 1);
    }

    #[test]
    fn test_pre_insert_statements_for_table_counter() {
        let mut prop = property(true, GenerationStrategy::table_counter());
        let mut writer = RecordingWriter::default();

        prop.create_pre_insert_statements(&mut writer, &"dune").unwrap();
        insert(&mut prop, "dune");
        prop.create_pre_insert_statements(&mut writer, &"emma").unwrap();
        insert(&mut prop, "emma");

        assert_eq!(writer.sql().len(), 1);
    }

    #[test]
    fn test_no_pre_insert_statements_for_absolute_ids() {
        let prop = property(false, GenerationStrategy::table_counter());
        let mut writer = RecordingWriter::default();
        prop.create_pre_insert_statements(&mut writer, &"dune").unwrap();
        assert!(writer.sql().is_empty());
    }

    #[test]
    fn test_import_stored_value() {
        let mut prop = property(true, GenerationStrategy::sequence("book_seq")).with_primitive(true);
        prop.import_stored_value(&"dune", Some(-43));
        prop.import_stored_value(&"emma", Some(0));
        prop.import_stored_value(&"odyssey", Some(-1));

        assert_eq!(prop.state(&"dune"), IdState::KnownReference(41));
        assert!(prop.is_new(&"emma"));
        assert_eq!(prop.stored_value(&"emma"), Some(0));
        assert_eq!(prop.state(&"odyssey"), IdState::UnknownReference);
    }
}
