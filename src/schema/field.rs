use crate::error::{Error, Result};
use crate::types::DataType;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a declared field.
pub type FieldRef = Arc<FieldDef>;

/// Whether a field may be reassigned after construction.
#[derive(Debug, Clone)]
pub enum Mutability {
    /// Reassignable; `None` means no default was declared, which is distinct
    /// from a declared `Some(Value::Null)` default.
    Mutable { default: Option<Value> },
    /// Supplied once at construction. Never has a default.
    Immutable,
}

/// One field of a schema: name, type, ordinal and mutability.
#[derive(Debug)]
pub struct FieldDef {
    schema: Arc<str>,
    name: Box<str>,
    ty: DataType,
    ordinal: u8,
    mutability: Mutability,
}

impl FieldDef {
    pub(crate) fn new(schema: Arc<str>, name: Box<str>, ty: DataType, ordinal: u8, mutability: Mutability) -> Self {
        FieldDef {
            schema,
            name,
            ty,
            ordinal,
            mutability,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &DataType {
        &self.ty
    }

    pub fn ordinal(&self) -> u8 {
        self.ordinal
    }

    pub fn schema_name(&self) -> &str {
        &self.schema
    }

    pub fn mutability(&self) -> &Mutability {
        &self.mutability
    }

    pub fn is_mutable(&self) -> bool {
        matches!(self.mutability, Mutability::Mutable { .. })
    }

    pub fn has_default(&self) -> bool {
        matches!(self.mutability, Mutability::Mutable { default: Some(_) })
    }

    /// The declared default, or `MissingDefault`.
    pub fn default(&self) -> Result<&Value> {
        match &self.mutability {
            Mutability::Mutable { default: Some(value) } => Ok(value),
            Mutability::Mutable { default: None } | Mutability::Immutable => Err(Error::MissingDefault {
                schema: self.schema.to_string(),
                field: self.name.to_string(),
            }),
        }
    }

    pub fn default_or<'a>(&'a self, fallback: &'a Value) -> &'a Value {
        self.default().unwrap_or(fallback)
    }
}

impl fmt::Display for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}
