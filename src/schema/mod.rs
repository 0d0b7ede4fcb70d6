//! Struct schemas
//!
//! A [`Schema`] collects field declarations and freezes them on first use.
//! Freezing happens exactly once even when several threads race for it; the
//! field list, the name index and the mutable-field list are computed together
//! in that single pass.

pub mod builder;
pub mod descriptor;
pub mod field;
pub mod field_set;

pub use builder::StructBuilder;
pub use descriptor::{FieldDescriptor, RegistryDescriptor, SchemaDescriptor, SchemaRegistry, TypeDescriptor};
pub use field::{FieldDef, FieldRef, Mutability};
pub use field_set::FieldSet;

use crate::error::{Error, Result};
use crate::melt::Recipe;
use crate::types::{DataType, PartialType};
use crate::value::Value;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Frozen view of a schema's fields.
#[derive(Debug)]
pub struct Fields {
    all: Vec<FieldRef>,
    by_name: HashMap<Box<str>, FieldRef>,
    mutable: Vec<FieldRef>,
}

impl Fields {
    /// Fields in ordinal order.
    pub fn all(&self) -> &[FieldRef] {
        &self.all
    }

    pub fn by_name(&self, name: &str) -> Option<&FieldRef> {
        self.by_name.get(name)
    }

    pub fn mutable(&self) -> &[FieldRef] {
        &self.mutable
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn field_set(&self) -> FieldSet {
        FieldSet::first(self.all.len())
    }
}

/// Declared struct layout.
pub struct Schema {
    name: Arc<str>,
    pending: Mutex<Option<Vec<FieldRef>>>,
    frozen: OnceCell<Result<Fields>>,
    recipe: OnceCell<Result<Arc<Recipe>>>,
    partial_recipe: OnceCell<Result<Arc<Recipe>>>,
}

impl Schema {
    /// Create an empty schema in its declaration phase.
    pub fn new(name: impl Into<Arc<str>>) -> Arc<Self> {
        Arc::new(Schema {
            name: name.into(),
            pending: Mutex::new(Some(Vec::new())),
            frozen: OnceCell::new(),
            recipe: OnceCell::new(),
            partial_recipe: OnceCell::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a reassignable field, optionally with a default value.
    pub fn declare_mutable(&self, name: impl Into<Box<str>>, ty: DataType, default: Option<Value>) -> Result<FieldRef> {
        let name = name.into();
        if let Some(value) = &default {
            if !ty.accepts(value) {
                return Err(Error::type_mismatch(ty.describe(), value.type_name()));
            }
        }
        self.declare(name, ty, field::Mutability::Mutable { default })
    }

    /// Declare a field that must be supplied at construction.
    pub fn declare_immutable(&self, name: impl Into<Box<str>>, ty: DataType) -> Result<FieldRef> {
        self.declare(name.into(), ty, field::Mutability::Immutable)
    }

    fn declare(&self, name: Box<str>, ty: DataType, mutability: field::Mutability) -> Result<FieldRef> {
        if let Some(partial) = ty.as_partial() {
            if std::ptr::eq(Arc::as_ptr(partial.schema()), self) {
                return Err(Error::InvalidTypeComposition(format!(
                    "field `{}`.`{}` cannot nest its own schema",
                    self.name, name
                )));
            }
        }

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(fields) = pending.as_mut() else {
            return Err(Error::SchemaAlreadyFrozen {
                schema: self.name.to_string(),
            });
        };
        if fields.len() >= FieldSet::CAPACITY {
            return Err(Error::OrdinalOverflow {
                schema: self.name.to_string(),
                name: name.into(),
            });
        }

        let ordinal = fields.len() as u8;
        let field = Arc::new(FieldDef::new(self.name.clone(), name, ty, ordinal, mutability));
        fields.push(field.clone());
        Ok(field)
    }

    /// Freeze the declarations. Idempotent; a failure is returned to every caller.
    pub fn freeze(&self) -> Result<&Fields> {
        self.frozen
            .get_or_init(|| {
                let fields = self
                    .pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take()
                    .unwrap_or_default();
                self.build_fields(fields)
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    fn build_fields(&self, all: Vec<FieldRef>) -> Result<Fields> {
        if all.is_empty() {
            return Err(Error::EmptySchema {
                schema: self.name.to_string(),
            });
        }

        let mut by_name = HashMap::with_capacity(all.len());
        for field in &all {
            if by_name.insert(Box::from(field.name()), field.clone()).is_some() {
                return Err(Error::DuplicateFieldName {
                    schema: self.name.to_string(),
                    name: field.name().to_string(),
                });
            }
        }
        let mutable = all.iter().filter(|f| f.is_mutable()).cloned().collect();

        log::debug!("froze schema `{}` with {} fields", self.name, all.len());
        Ok(Fields { all, by_name, mutable })
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get().is_some()
    }

    pub fn fields(&self) -> Result<&[FieldRef]> {
        Ok(self.freeze()?.all())
    }

    pub fn field_by_name(&self, name: &str) -> Result<Option<&FieldRef>> {
        Ok(self.freeze()?.by_name(name))
    }

    pub fn mutable_fields(&self) -> Result<&[FieldRef]> {
        Ok(self.freeze()?.mutable())
    }

    pub fn all_field_set(&self) -> Result<FieldSet> {
        Ok(self.freeze()?.field_set())
    }

    /// Field by ordinal; `None` before a successful freeze.
    pub(crate) fn field_at(&self, ordinal: u8) -> Option<&FieldRef> {
        match self.frozen.get() {
            Some(Ok(fields)) => fields.all.get(usize::from(ordinal)),
            _ => None,
        }
    }

    /// Whether `field` was declared by this schema.
    pub fn owns(&self, field: &FieldDef) -> bool {
        self.field_at(field.ordinal())
            .map_or(false, |own| std::ptr::eq(Arc::as_ptr(own), field))
    }

    /// Struct type whose values always carry every field.
    pub fn struct_type(self: &Arc<Self>) -> DataType {
        DataType::Partial(PartialType::full(self.clone()))
    }

    /// Struct type whose values carry any subset of fields.
    pub fn partial_type(self: &Arc<Self>) -> DataType {
        DataType::Partial(PartialType::partial(self.clone()))
    }

    pub fn builder(self: &Arc<Self>) -> Result<StructBuilder> {
        StructBuilder::new(self.clone())
    }

    /// Flatten recipe for full values, compiled once.
    pub fn recipe(self: &Arc<Self>) -> Result<Arc<Recipe>> {
        self.recipe
            .get_or_init(|| Recipe::compile(self, false).map(Arc::new))
            .clone()
    }

    /// Flatten recipe with a leading field-set column, for partial values.
    pub fn partial_recipe(self: &Arc<Self>) -> Result<Arc<Recipe>> {
        self.partial_recipe
            .get_or_init(|| Recipe::compile(self, true).map(Arc::new))
            .clone()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Schema");
        out.field("name", &self.name);
        match self.frozen.get() {
            Some(Ok(fields)) => out.field("fields", &fields.all.iter().map(|f| f.name()).collect::<Vec<_>>()),
            Some(Err(err)) => out.field("error", err),
            None => out.field("frozen", &false),
        };
        out.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_ordinals_follow_declaration_order() {
        let schema = Schema::new("User");
        let name = schema.declare_immutable("name", DataType::string()).unwrap();
        let age = schema.declare_mutable("age", DataType::i32(), Some(Value::I32(0))).unwrap();

        assert_eq!(name.ordinal(), 0);
        assert_eq!(age.ordinal(), 1);
        assert_eq!(schema.fields().unwrap().len(), 2);
        assert_eq!(schema.mutable_fields().unwrap().len(), 1);
        assert_eq!(schema.field_by_name("age").unwrap().unwrap().ordinal(), 1);
        assert!(schema.field_by_name("email").unwrap().is_none());
        assert_eq!(age.to_string(), "User.age");
    }

    #[test]
    fn test_duplicate_name_fails_at_freeze() {
        let schema = Schema::new("Dup");
        schema.declare_immutable("a", DataType::i32()).unwrap();
        schema.declare_immutable("a", DataType::i64()).unwrap();

        let err = schema.freeze().unwrap_err();
        assert!(matches!(err, Error::DuplicateFieldName { ref name, .. } if name == "a"));
        assert_eq!(schema.freeze().unwrap_err(), err);
    }

    #[test]
    fn test_empty_schema_fails() {
        let schema = Schema::new("Empty");
        assert!(matches!(schema.freeze(), Err(Error::EmptySchema { .. })));
    }

    #[test]
    fn test_sixty_fifth_field_overflows() {
        let schema = Schema::new("Wide");
        for i in 0..64 {
            schema.declare_immutable(format!("f{i}"), DataType::bool()).unwrap();
        }
        let err = schema.declare_immutable("f64", DataType::bool()).unwrap_err();
        assert!(matches!(err, Error::OrdinalOverflow { .. }));
        assert_eq!(schema.all_field_set().unwrap().len(), 64);
    }

    #[test]
    fn test_declare_after_freeze_fails() {
        let schema = Schema::new("Late");
        schema.declare_immutable("a", DataType::i32()).unwrap();
        schema.freeze().unwrap();

        let err = schema.declare_mutable("b", DataType::i32(), None).unwrap_err();
        assert!(matches!(err, Error::SchemaAlreadyFrozen { .. }));
    }

    #[test]
    fn test_concurrent_freeze_computes_once() {
        let schema = Schema::new("Shared");
        schema.declare_immutable("a", DataType::i32()).unwrap();
        schema.declare_immutable("b", DataType::i32()).unwrap();

        let seen: Vec<usize> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| schema.freeze().unwrap() as *const Fields as usize))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(seen.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_defaults() {
        let schema = Schema::new("Prefs");
        let theme = schema.declare_mutable("theme", DataType::string(), Some(Value::from("dark"))).unwrap();
        let nick = schema
            .declare_mutable("nick", DataType::nullable(DataType::string()).unwrap(), Some(Value::Null))
            .unwrap();
        let id = schema.declare_immutable("id", DataType::i64()).unwrap();

        assert_eq!(theme.default().unwrap(), &Value::from("dark"));
        assert_eq!(nick.default().unwrap(), &Value::Null);
        assert!(matches!(id.default(), Err(Error::MissingDefault { .. })));
        assert_eq!(id.default_or(&Value::I64(-1)), &Value::I64(-1));
    }

    #[test]
    fn test_default_must_fit_type() {
        let schema = Schema::new("Bad");
        let err = schema.declare_mutable("n", DataType::i32(), Some(Value::Null)).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_self_nesting_is_rejected() {
        let schema = Schema::new("Node");
        let err = schema
            .declare_mutable("next", DataType::nullable(schema.struct_type()).unwrap(), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTypeComposition(_)));
    }
}
