//! Schemas declared from JSON documents
//!
//! ```json
//! {
//!   "schemas": [
//!     {"name": "Point", "fields": [
//!       {"name": "x", "type": "i32"},
//!       {"name": "y", "type": "i32"}
//!     ]},
//!     {"name": "Shape", "fields": [
//!       {"name": "name", "type": "str"},
//!       {"name": "origin", "type": {"struct": "Point"}, "nullable": true, "default": null},
//!       {"name": "tags", "type": {"list": "str"}, "mutable": true}
//!     ]}
//!   ],
//!   "root": "Shape"
//! }
//! ```
//!
//! Struct types may only reference schemas declared earlier in the document,
//! which also keeps descriptors free of cycles.

use crate::error::{Error, Result};
use crate::json::value_from_json;
use crate::schema::Schema;
use crate::types::DataType;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

static FIELD_NAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Top-level descriptor document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryDescriptor {
    pub schemas: Vec<SchemaDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub mutable: bool,
    /// `Some(Null)` for an explicit `null` default, `None` when absent.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<serde_json::Value>, D::Error> {
    serde_json::Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeDescriptor {
    Bool,
    I32,
    I64,
    F32,
    F64,
    Str,
    Blob,
    List(Box<TypeDescriptor>),
    Set(Box<TypeDescriptor>),
    Struct(String),
    Partial(String),
    Nullable(Box<TypeDescriptor>),
}

impl TypeDescriptor {
    fn resolve(&self, known: &HashMap<String, Arc<Schema>>) -> Result<DataType> {
        let lookup = |name: &String| known.get(name).ok_or_else(|| Error::UnknownSchema(name.clone()));
        Ok(match self {
            TypeDescriptor::Bool => DataType::bool(),
            TypeDescriptor::I32 => DataType::i32(),
            TypeDescriptor::I64 => DataType::i64(),
            TypeDescriptor::F32 => DataType::f32(),
            TypeDescriptor::F64 => DataType::f64(),
            TypeDescriptor::Str => DataType::string(),
            TypeDescriptor::Blob => DataType::blob(),
            TypeDescriptor::List(element) => DataType::collection(element.resolve(known)?),
            TypeDescriptor::Set(element) => DataType::set(element.resolve(known)?),
            TypeDescriptor::Struct(name) => lookup(name)?.struct_type(),
            TypeDescriptor::Partial(name) => lookup(name)?.partial_type(),
            TypeDescriptor::Nullable(inner) => DataType::nullable(inner.resolve(known)?)?,
        })
    }
}

/// Frozen schemas built from a [`RegistryDescriptor`], looked up by name.
#[derive(Debug)]
pub struct SchemaRegistry {
    schemas: Vec<Arc<Schema>>,
    by_name: HashMap<String, Arc<Schema>>,
    root: Option<String>,
}

impl SchemaRegistry {
    pub fn from_json(text: &str) -> Result<Self> {
        let descriptor: RegistryDescriptor =
            serde_json::from_str(text).map_err(|e| Error::Convert(format!("invalid schema descriptor: {e}")))?;
        Self::from_descriptor(&descriptor)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let descriptor: RegistryDescriptor =
            serde_json::from_reader(reader).map_err(|e| Error::Convert(format!("invalid schema descriptor: {e}")))?;
        Self::from_descriptor(&descriptor)
    }

    /// Declare and freeze every schema of `descriptor`, in document order.
    pub fn from_descriptor(descriptor: &RegistryDescriptor) -> Result<Self> {
        let mut schemas = Vec::with_capacity(descriptor.schemas.len());
        let mut by_name: HashMap<String, Arc<Schema>> = HashMap::new();

        for schema_descriptor in &descriptor.schemas {
            if by_name.contains_key(&schema_descriptor.name) {
                return Err(Error::DuplicateSchemaName(schema_descriptor.name.clone()));
            }
            let schema = Schema::new(schema_descriptor.name.as_str());
            for field in &schema_descriptor.fields {
                declare(&schema, field, &by_name)?;
            }
            schema.freeze()?;
            log::debug!(
                "registered schema `{}` with {} fields",
                schema.name(),
                schema_descriptor.fields.len()
            );

            by_name.insert(schema_descriptor.name.clone(), schema.clone());
            schemas.push(schema);
        }

        Ok(SchemaRegistry {
            schemas,
            by_name,
            root: descriptor.root.clone(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Schema>> {
        self.by_name.get(name)
    }

    /// Schema named `name`, failing with `UnknownSchema`.
    pub fn schema(&self, name: &str) -> Result<&Arc<Schema>> {
        self.get(name).ok_or_else(|| Error::UnknownSchema(name.to_string()))
    }

    /// The declared root, or the last schema when the document names none.
    pub fn root(&self) -> Result<&Arc<Schema>> {
        match &self.root {
            Some(name) => self.schema(name),
            None => self
                .schemas
                .last()
                .ok_or_else(|| Error::UnknownSchema("<root>".to_string())),
        }
    }

    pub fn schemas(&self) -> &[Arc<Schema>] {
        &self.schemas
    }
}

fn declare(schema: &Arc<Schema>, field: &FieldDescriptor, known: &HashMap<String, Arc<Schema>>) -> Result<()> {
    if !FIELD_NAME_REGEX.is_match(&field.name) {
        return Err(Error::InvalidFieldName(field.name.clone()));
    }
    let mut ty = field.ty.resolve(known)?;
    if field.nullable && !ty.is_nullable() {
        ty = DataType::nullable(ty)?;
    }

    match &field.default {
        Some(json) => {
            let default = value_from_json(&ty, json)?;
            schema.declare_mutable(field.name.as_str(), ty, Some(default))?;
        }
        None if field.mutable => {
            schema.declare_mutable(field.name.as_str(), ty, None)?;
        }
        None => {
            schema.declare_immutable(field.name.as_str(), ty)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use serde_json::json;

    fn shapes() -> serde_json::Value {
        json!({
            "schemas": [
                {"name": "Point", "fields": [
                    {"name": "x", "type": "i32"},
                    {"name": "y", "type": "i32"}
                ]},
                {"name": "Shape", "fields": [
                    {"name": "name", "type": "str"},
                    {"name": "origin", "type": {"struct": "Point"}, "nullable": true, "default": null},
                    {"name": "tags", "type": {"set": "str"}, "mutable": true},
                    {"name": "delta", "type": {"partial": "Point"}, "mutable": true},
                    {"name": "scale", "type": "f64", "default": 1.0}
                ]}
            ]
        })
    }

    #[test]
    fn test_registry_declares_schemas() {
        let registry = SchemaRegistry::from_json(&shapes().to_string()).unwrap();

        let shape = registry.root().unwrap();
        assert_eq!(shape.name(), "Shape");
        assert!(shape.is_frozen());

        let origin = shape.field_by_name("origin").unwrap().unwrap();
        assert_eq!(origin.ty().describe(), "nullable<struct Point>");
        assert_eq!(origin.default().unwrap(), &Value::Null);

        let tags = shape.field_by_name("tags").unwrap().unwrap();
        assert!(tags.is_mutable());
        assert!(!tags.has_default());

        let name = shape.field_by_name("name").unwrap().unwrap();
        assert!(!name.is_mutable());

        let scale = shape.field_by_name("scale").unwrap().unwrap();
        assert_eq!(scale.default().unwrap(), &Value::F64(1.0));

        let delta = shape.field_by_name("delta").unwrap().unwrap();
        let nested = delta.ty().as_partial().unwrap();
        assert!(Arc::ptr_eq(nested.schema(), registry.schema("Point").unwrap()));
        assert!(!nested.is_full());
    }

    #[test]
    fn test_explicit_root() {
        let mut doc = shapes();
        doc["root"] = json!("Point");
        let registry = SchemaRegistry::from_json(&doc.to_string()).unwrap();
        assert_eq!(registry.root().unwrap().name(), "Point");

        doc["root"] = json!("Circle");
        let registry = SchemaRegistry::from_json(&doc.to_string()).unwrap();
        assert_eq!(registry.root().unwrap_err(), Error::UnknownSchema("Circle".to_string()));
    }

    #[test]
    fn test_forward_reference_is_unknown() {
        let doc = json!({"schemas": [
            {"name": "Shape", "fields": [{"name": "origin", "type": {"struct": "Point"}}]},
            {"name": "Point", "fields": [{"name": "x", "type": "i32"}]}
        ]});
        let err = SchemaRegistry::from_json(&doc.to_string()).unwrap_err();
        assert_eq!(err, Error::UnknownSchema("Point".to_string()));
    }

    #[test]
    fn test_invalid_field_names() {
        for name in ["", "1st", "with space", "dash-ed"] {
            let doc = json!({"schemas": [{"name": "S", "fields": [{"name": name, "type": "bool"}]}]});
            let err = SchemaRegistry::from_json(&doc.to_string()).unwrap_err();
            assert_eq!(err, Error::InvalidFieldName(name.to_string()));
        }
    }

    #[test]
    fn test_duplicates() {
        let doc = json!({"schemas": [
            {"name": "S", "fields": [{"name": "a", "type": "bool"}]},
            {"name": "S", "fields": [{"name": "b", "type": "bool"}]}
        ]});
        let err = SchemaRegistry::from_json(&doc.to_string()).unwrap_err();
        assert_eq!(err, Error::DuplicateSchemaName("S".to_string()));

        let doc = json!({"schemas": [{"name": "S", "fields": [
            {"name": "a", "type": "bool"},
            {"name": "a", "type": "i32"}
        ]}]});
        let err = SchemaRegistry::from_json(&doc.to_string()).unwrap_err();
        assert!(matches!(err, Error::DuplicateFieldName { .. }));
    }

    #[test]
    fn test_nested_nullable_and_bad_default() {
        let doc = json!({"schemas": [{"name": "S", "fields": [
            {"name": "a", "type": {"nullable": {"list": {"nullable": "i64"}}}}
        ]}]});
        let registry = SchemaRegistry::from_json(&doc.to_string()).unwrap();
        let field = registry.root().unwrap().field_by_name("a").unwrap().unwrap();
        assert_eq!(field.ty().describe(), "nullable<list<nullable<i64>>>");

        let doc = json!({"schemas": [{"name": "S", "fields": [
            {"name": "a", "type": "i32", "default": "many"}
        ]}]});
        assert!(SchemaRegistry::from_json(&doc.to_string()).is_err());
    }

    #[test]
    fn test_descriptor_serde_shape() {
        let descriptor: RegistryDescriptor = serde_json::from_value(shapes()).unwrap();
        assert_eq!(descriptor.schemas[1].fields[1].ty, TypeDescriptor::Struct("Point".to_string()));
        assert_eq!(descriptor.schemas[1].fields[1].default, Some(serde_json::Value::Null));
        assert_eq!(descriptor.schemas[1].fields[2].default, None);
        assert_eq!(
            serde_json::to_value(&descriptor.schemas[0].fields[0]).unwrap(),
            json!({"name": "x", "type": "i32", "nullable": false, "mutable": false})
        );
    }
}
