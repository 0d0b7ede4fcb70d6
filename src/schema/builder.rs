//! Construction of [`StructSnapshot`] values field by field.

use crate::error::{Error, Result};
use crate::schema::{FieldDef, FieldSet, Schema};
use crate::value::{StructSnapshot, Value};
use std::sync::Arc;

/// Collects field values for one struct value.
#[derive(Debug)]
pub struct StructBuilder {
    schema: Arc<Schema>,
    values: Vec<Option<Value>>,
}

impl StructBuilder {
    pub(crate) fn new(schema: Arc<Schema>) -> Result<Self> {
        let count = schema.fields()?.len();
        Ok(StructBuilder {
            schema,
            values: vec![None; count],
        })
    }

    /// Set a field; the value must fit the field's type.
    pub fn set(mut self, field: &FieldDef, value: impl Into<Value>) -> Result<Self> {
        if !self.schema.owns(field) {
            return Err(Error::UnknownField {
                schema: self.schema.name().to_string(),
                field: field.name().to_string(),
            });
        }
        let value = value.into();
        if !field.ty().accepts(&value) {
            return Err(Error::type_mismatch(field.ty().describe(), value.type_name()));
        }
        self.values[usize::from(field.ordinal())] = Some(value);
        Ok(self)
    }

    pub fn set_by_name(self, name: &str, value: impl Into<Value>) -> Result<Self> {
        let schema = self.schema.clone();
        let Some(field) = schema.field_by_name(name)? else {
            return Err(Error::UnknownField {
                schema: schema.name().to_string(),
                field: name.to_string(),
            });
        };
        self.set(field, value)
    }

    /// Fields set so far.
    pub fn field_set(&self) -> FieldSet {
        FieldSet::of(
            self.values
                .iter()
                .enumerate()
                .filter(|(_, v)| v.is_some())
                .map(|(i, _)| i as u8),
        )
    }

    /// A full value: unset fields take their defaults, or fail with `MissingField`.
    pub fn build(self) -> Result<StructSnapshot> {
        let fields = self.schema.fields()?;
        let mut values = Vec::with_capacity(fields.len());
        for (field, value) in fields.iter().zip(self.values) {
            match value {
                Some(value) => values.push(value),
                None if field.has_default() => values.push(field.default()?.clone()),
                None => {
                    return Err(Error::MissingField {
                        schema: self.schema.name().to_string(),
                        field: field.name().to_string(),
                    });
                }
            }
        }
        let all = self.schema.all_field_set()?;
        StructSnapshot::from_parts(self.schema, all, values)
    }

    /// A partial value carrying only the fields that were set.
    pub fn build_partial(self) -> Result<StructSnapshot> {
        let fields = self.field_set();
        let values = self.values.into_iter().flatten().collect();
        StructSnapshot::from_parts(self.schema, fields, values)
    }
}
