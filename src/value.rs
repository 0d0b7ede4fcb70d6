//! Runtime values and materialized structs.

use crate::error::{Error, Result};
use crate::schema::{FieldDef, FieldRef, FieldSet, Schema};
use crate::tokens::{emit_tokens, TokenStream};
use std::fmt;
use std::sync::Arc;

/// A dynamic value of any [`DataType`](crate::DataType).
///
/// `Null` is the absent marker of nullable types; no non-nullable type has it
/// as a legal value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Blob(Vec<u8>),
    List(Vec<Value>),
    Struct(StructSnapshot),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Str(_) => "str",
            Value::Blob(_) => "blob",
            Value::List(_) => "list",
            Value::Struct(_) => "struct",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I32(v) => Some(i64::from(*v)),
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructSnapshot> {
        match self {
            Value::Struct(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<StructSnapshot> for Value {
    fn from(v: StructSnapshot) -> Self {
        Value::Struct(v)
    }
}

/// An immutable struct value holding the fields in `field_set`.
///
/// Values are kept in one allocation ordered by field-set index, so a full
/// snapshot is indexed by ordinal and a partial one by rank within its set.
#[derive(Clone)]
pub struct StructSnapshot {
    schema: Arc<Schema>,
    fields: FieldSet,
    values: Box<[Value]>,
}

impl StructSnapshot {
    pub(crate) fn from_parts(schema: Arc<Schema>, fields: FieldSet, values: Vec<Value>) -> Result<Self> {
        let all = schema.all_field_set()?;
        if !all.contains_all(fields) {
            return Err(Error::mismatch(
                schema.name(),
                format!("field set {:#x} exceeds {} declared fields", fields.bits(), all.len()),
            ));
        }
        if values.len() != fields.len() {
            return Err(Error::mismatch(
                schema.name(),
                format!("{} values for {} present fields", values.len(), fields.len()),
            ));
        }
        Ok(StructSnapshot {
            schema,
            fields,
            values: values.into_boxed_slice(),
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn field_set(&self) -> FieldSet {
        self.fields
    }

    /// Whether every declared field is present.
    pub fn is_full(&self) -> bool {
        self.schema.all_field_set().map_or(false, |all| all == self.fields)
    }

    /// Value of `field`, or `None` when the field is absent from this snapshot.
    pub fn get(&self, field: &FieldDef) -> Option<&Value> {
        if !self.schema.owns(field) {
            return None;
        }
        let index = self.fields.index_of(field.ordinal())?;
        self.values.get(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let field = self.schema.field_by_name(name).ok()??;
        self.get(field)
    }

    /// Present fields with their values, in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldRef, &Value)> + '_ {
        self.fields
            .iter()
            .filter_map(|ordinal| self.schema.field_at(ordinal))
            .zip(self.values.iter())
    }

    /// Copy of this snapshot with a mutable field replaced or added.
    pub fn with(&self, field: &FieldRef, value: Value) -> Result<StructSnapshot> {
        if !self.schema.owns(field) {
            return Err(Error::UnknownField {
                schema: self.schema.name().to_string(),
                field: field.name().to_string(),
            });
        }
        if !field.is_mutable() {
            return Err(Error::ImmutableField {
                schema: self.schema.name().to_string(),
                field: field.name().to_string(),
            });
        }
        if !field.ty().accepts(&value) {
            return Err(Error::type_mismatch(field.ty().describe(), value.type_name()));
        }

        let fields = self.fields.with(field.ordinal());
        let mut values = Vec::with_capacity(fields.len());
        for ordinal in fields.iter() {
            if ordinal == field.ordinal() {
                values.push(value.clone());
            } else if let Some(index) = self.fields.index_of(ordinal) {
                values.push(self.values[index].clone());
            }
        }
        StructSnapshot::from_parts(self.schema.clone(), fields, values)
    }

    /// Token stream of this struct as a dictionary.
    pub fn tokens(&self) -> TokenStream {
        let ty = if self.is_full() {
            self.schema.struct_type()
        } else {
            self.schema.partial_type()
        };
        emit_tokens(ty, Value::Struct(self.clone()))
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values.into_vec()
    }
}

impl PartialEq for StructSnapshot {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.schema, &other.schema) && self.fields == other.fields && self.values == other.values
    }
}

impl fmt::Debug for StructSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct(self.schema.name());
        for (field, value) in self.iter() {
            out.field(field.name(), value);
        }
        out.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    fn point() -> (Arc<Schema>, FieldRef, FieldRef) {
        let schema = Schema::new("Point");
        let x = schema.declare_immutable("x", DataType::i32()).unwrap();
        let y = schema.declare_mutable("y", DataType::i32(), None).unwrap();
        (schema, x, y)
    }

    #[test]
    fn test_get_present_and_absent() {
        let (schema, x, y) = point();
        let partial = schema.builder().unwrap().set(&y, 5).unwrap().build_partial().unwrap();

        assert_eq!(partial.get(&y), Some(&Value::I32(5)));
        assert_eq!(partial.get(&x), None);
        assert_eq!(partial.get_by_name("y"), Some(&Value::I32(5)));
        assert!(!partial.is_full());
    }

    #[test]
    fn test_foreign_field_is_not_found() {
        let (schema, _, _) = point();
        let (_, other_x, _) = point();
        let snapshot = schema.builder().unwrap().set_by_name("x", 1).unwrap().set_by_name("y", 2).unwrap().build().unwrap();

        assert_eq!(snapshot.get(&other_x), None);
    }

    #[test]
    fn test_with_replaces_mutable_field() {
        let (schema, x, y) = point();
        let snapshot = schema.builder().unwrap().set(&x, 1).unwrap().set(&y, 2).unwrap().build().unwrap();

        let moved = snapshot.with(&y, Value::I32(9)).unwrap();
        assert_eq!(moved.get(&y), Some(&Value::I32(9)));
        assert_eq!(moved.get(&x), Some(&Value::I32(1)));
        assert_eq!(snapshot.get(&y), Some(&Value::I32(2)));

        let err = snapshot.with(&x, Value::I32(3)).unwrap_err();
        assert!(matches!(err, Error::ImmutableField { .. }));
    }

    #[test]
    fn test_with_adds_missing_field_in_order() {
        let (schema, x, y) = point();
        let partial = schema.builder().unwrap().set(&x, 1).unwrap().build_partial().unwrap();

        let grown = partial.with(&y, Value::I32(4)).unwrap();
        assert!(grown.is_full());
        let values: Vec<_> = grown.iter().map(|(f, v)| (f.name().to_string(), v.clone())).collect();
        assert_eq!(values, vec![("x".to_string(), Value::I32(1)), ("y".to_string(), Value::I32(4))]);
    }

    #[test]
    fn test_debug_lists_present_fields() {
        let (schema, x, y) = point();
        let snapshot = schema.builder().unwrap().set(&x, 1).unwrap().set(&y, 2).unwrap().build().unwrap();
        assert_eq!(format!("{:?}", snapshot), "Point { x: I32(1), y: I32(2) }");
    }
}
