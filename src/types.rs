//! Type descriptors for struct fields.
//!
//! [`DataType`] is a closed set of four variants. Every traversal in this
//! crate matches on it exhaustively, so adding a variant means revisiting each
//! of them: recipe compilation, flatten, inflate and token emission.

use crate::error::{Error, Result};
use crate::schema::{FieldSet, Schema};
use crate::tokens::TokenKind;
use crate::value::{StructSnapshot, Value};
use std::fmt;
use std::sync::Arc;

/// Primitive kinds of a [`SimpleType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    I32,
    I64,
    F32,
    F64,
    Str,
    Blob,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::I32 => "i32",
            Kind::I64 => "i64",
            Kind::F32 => "f32",
            Kind::F64 => "f64",
            Kind::Str => "str",
            Kind::Blob => "blob",
        }
    }

    /// The token kind a stored value of this kind is emitted as.
    pub fn token_kind(self) -> TokenKind {
        match self {
            Kind::Bool => TokenKind::Bool,
            Kind::I32 => TokenKind::I32,
            Kind::I64 => TokenKind::I64,
            Kind::F32 => TokenKind::F32,
            Kind::F64 => TokenKind::F64,
            Kind::Str => TokenKind::Str,
            Kind::Blob => TokenKind::Blob,
        }
    }

    /// Check whether a stored value has this kind.
    pub fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Kind::Bool, Value::Bool(_))
                | (Kind::I32, Value::I32(_))
                | (Kind::I64, Value::I64(_))
                | (Kind::F32, Value::F32(_))
                | (Kind::F64, Value::F64(_))
                | (Kind::Str, Value::Str(_))
                | (Kind::Blob, Value::Blob(_))
        )
    }
}

/// Conversion between an in-memory value and its stored form.
pub type Converter = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Produces the elements of a collection value.
pub type CollectStore = Arc<dyn Fn(Value) -> Result<Vec<Value>> + Send + Sync>;

/// Rebuilds a collection value from its elements.
pub type CollectLoad = Arc<dyn Fn(Vec<Value>) -> Result<Value> + Send + Sync>;

/// A primitive leaf type.
#[derive(Clone)]
pub struct SimpleType {
    kind: Kind,
    store: Option<Converter>,
    load: Option<Converter>,
    string_repr: bool,
}

impl SimpleType {
    pub fn new(kind: Kind) -> Self {
        SimpleType {
            kind,
            store: None,
            load: None,
            string_repr: false,
        }
    }

    /// Replace the identity conversions.
    pub fn with_converters(
        mut self,
        store: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
        load: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.store = Some(Arc::new(store));
        self.load = Some(Arc::new(load));
        self
    }

    /// Emit stored values as string tokens regardless of kind.
    pub fn with_string_representation(mut self) -> Self {
        self.string_repr = true;
        self
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn has_string_representation(&self) -> bool {
        self.string_repr
    }

    pub fn store(&self, value: Value) -> Result<Value> {
        match &self.store {
            Some(store) => store(value),
            None => Ok(value),
        }
    }

    pub fn load(&self, stored: Value) -> Result<Value> {
        match &self.load {
            Some(load) => load(stored),
            None => Ok(stored),
        }
    }
}

impl fmt::Debug for SimpleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleType")
            .field("kind", &self.kind)
            .field("custom", &self.store.is_some())
            .field("string_repr", &self.string_repr)
            .finish()
    }
}

/// A homogeneous collection type.
#[derive(Clone)]
pub struct CollectType {
    element: Arc<DataType>,
    unique: bool,
    store: Option<CollectStore>,
    load: Option<CollectLoad>,
}

impl CollectType {
    pub fn new(element: DataType) -> Self {
        CollectType {
            element: Arc::new(element),
            unique: false,
            store: None,
            load: None,
        }
    }

    /// A collection whose loaded form drops repeated elements.
    pub fn set(element: DataType) -> Self {
        CollectType {
            unique: true,
            ..CollectType::new(element)
        }
    }

    pub fn with_converters(
        mut self,
        store: impl Fn(Value) -> Result<Vec<Value>> + Send + Sync + 'static,
        load: impl Fn(Vec<Value>) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.store = Some(Arc::new(store));
        self.load = Some(Arc::new(load));
        self
    }

    pub fn element(&self) -> &DataType {
        &self.element
    }

    pub fn is_set(&self) -> bool {
        self.unique
    }

    /// Indexable view of the collection's elements.
    pub fn store(&self, value: Value) -> Result<Vec<Value>> {
        if let Some(store) = &self.store {
            return store(value);
        }
        match value {
            Value::List(items) => Ok(items),
            other => Err(Error::type_mismatch("list", other.type_name())),
        }
    }

    pub fn load(&self, items: Vec<Value>) -> Result<Value> {
        if let Some(load) = &self.load {
            return load(items);
        }
        if !self.unique {
            return Ok(Value::List(items));
        }
        let mut unique: Vec<Value> = Vec::with_capacity(items.len());
        for item in items {
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Ok(Value::List(unique))
    }
}

impl fmt::Debug for CollectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectType")
            .field("element", &self.element)
            .field("unique", &self.unique)
            .field("custom", &self.store.is_some())
            .finish()
    }
}

/// Custom mapping between an application value and its struct fields.
///
/// `store` yields `Null` when no field is present, the bare value when one
/// is, and a list ordered by field-set index otherwise. `load` receives the
/// same shape back.
pub trait PartialCodec: Send + Sync {
    fn fields(&self, schema: &Arc<Schema>, value: &Value) -> Result<FieldSet>;
    fn store(&self, schema: &Arc<Schema>, value: Value) -> Result<Value>;
    fn load(&self, schema: &Arc<Schema>, fields: FieldSet, stored: Value) -> Result<Value>;
}

/// A nested struct type over a schema.
#[derive(Clone)]
pub struct PartialType {
    schema: Arc<Schema>,
    full: bool,
    codec: Option<Arc<dyn PartialCodec>>,
}

impl PartialType {
    /// Values of this type always carry every field.
    pub fn full(schema: Arc<Schema>) -> Self {
        PartialType {
            schema,
            full: true,
            codec: None,
        }
    }

    /// Values of this type may carry any subset of the fields.
    pub fn partial(schema: Arc<Schema>) -> Self {
        PartialType {
            schema,
            full: false,
            codec: None,
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn PartialCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Fields present in `value`.
    pub fn fields(&self, value: &Value) -> Result<FieldSet> {
        if let Some(codec) = &self.codec {
            return codec.fields(&self.schema, value);
        }
        Ok(self.snapshot(value)?.field_set())
    }

    pub fn store(&self, value: Value) -> Result<Value> {
        if let Some(codec) = &self.codec {
            return codec.store(&self.schema, value);
        }
        self.snapshot(&value)?;
        let Value::Struct(snapshot) = value else {
            return Err(Error::type_mismatch(self.describe(), value.type_name()));
        };
        let mut values = snapshot.into_values();
        Ok(match values.len() {
            0 => Value::Null,
            1 => values.pop().unwrap_or_default(),
            _ => Value::List(values),
        })
    }

    pub fn load(&self, fields: FieldSet, stored: Value) -> Result<Value> {
        if self.full && fields != self.schema.all_field_set()? {
            return Err(Error::type_mismatch(
                self.describe(),
                format!("{} of {} fields", fields.len(), self.schema.fields()?.len()),
            ));
        }
        if let Some(codec) = &self.codec {
            return codec.load(&self.schema, fields, stored);
        }
        let values = match (fields.len(), stored) {
            (0, _) => Vec::new(),
            (1, value) => vec![value],
            (n, Value::List(values)) if values.len() == n => values,
            (n, other) => {
                return Err(Error::type_mismatch(format!("{n} field values"), other.type_name()));
            }
        };
        Ok(Value::Struct(StructSnapshot::from_parts(self.schema.clone(), fields, values)?))
    }

    fn snapshot<'a>(&self, value: &'a Value) -> Result<&'a StructSnapshot> {
        match value {
            Value::Struct(snapshot) if Arc::ptr_eq(snapshot.schema(), &self.schema) => Ok(snapshot),
            Value::Struct(snapshot) => Err(Error::type_mismatch(
                self.describe(),
                format!("struct {}", snapshot.schema().name()),
            )),
            other => Err(Error::type_mismatch(self.describe(), other.type_name())),
        }
    }

    fn describe(&self) -> String {
        let prefix = if self.full { "struct" } else { "partial" };
        format!("{} {}", prefix, self.schema.name())
    }
}

impl fmt::Debug for PartialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialType")
            .field("schema", &self.schema.name())
            .field("full", &self.full)
            .field("custom", &self.codec.is_some())
            .finish()
    }
}

/// A type whose values may be absent. Never wraps another nullable.
#[derive(Debug, Clone)]
pub struct NullableType {
    inner: Box<DataType>,
}

impl NullableType {
    pub fn inner(&self) -> &DataType {
        &self.inner
    }
}

/// The type of a struct field.
#[derive(Debug, Clone)]
pub enum DataType {
    Nullable(NullableType),
    Simple(SimpleType),
    Collect(CollectType),
    Partial(PartialType),
}

impl DataType {
    pub fn simple(kind: Kind) -> Self {
        DataType::Simple(SimpleType::new(kind))
    }

    pub fn bool() -> Self {
        Self::simple(Kind::Bool)
    }

    pub fn i32() -> Self {
        Self::simple(Kind::I32)
    }

    pub fn i64() -> Self {
        Self::simple(Kind::I64)
    }

    pub fn f32() -> Self {
        Self::simple(Kind::F32)
    }

    pub fn f64() -> Self {
        Self::simple(Kind::F64)
    }

    pub fn string() -> Self {
        Self::simple(Kind::Str)
    }

    pub fn blob() -> Self {
        Self::simple(Kind::Blob)
    }

    pub fn collection(element: DataType) -> Self {
        DataType::Collect(CollectType::new(element))
    }

    pub fn set(element: DataType) -> Self {
        DataType::Collect(CollectType::set(element))
    }

    /// Wrap `inner` so that `Value::Null` becomes a legal value.
    pub fn nullable(inner: DataType) -> Result<Self> {
        if let DataType::Nullable(nullable) = &inner {
            return Err(Error::InvalidTypeComposition(format!(
                "nullable cannot wrap {}",
                DataType::Nullable(nullable.clone()).describe()
            )));
        }
        Ok(DataType::Nullable(NullableType { inner: Box::new(inner) }))
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, DataType::Nullable(_))
    }

    /// The non-nullable type and whether a Nullable wrapper was removed.
    pub fn unwrap_nullable(&self) -> (&DataType, bool) {
        match self {
            DataType::Nullable(nullable) => (nullable.inner(), true),
            other => (other, false),
        }
    }

    /// The struct type behind an optional nullable wrapper.
    pub fn as_partial(&self) -> Option<&PartialType> {
        match self.unwrap_nullable().0 {
            DataType::Partial(partial) => Some(partial),
            DataType::Nullable(_) | DataType::Simple(_) | DataType::Collect(_) => None,
        }
    }

    /// Shallow shape check of an in-memory value.
    ///
    /// Simple types with custom conversions accept any non-null value since
    /// their in-memory form is up to the converter.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            DataType::Nullable(nullable) => value.is_null() || nullable.inner().accepts(value),
            DataType::Simple(simple) => {
                if simple.store.is_some() {
                    !value.is_null()
                } else {
                    simple.kind().matches(value)
                }
            }
            DataType::Collect(collect) => collect.store.is_some() || matches!(value, Value::List(_)),
            DataType::Partial(partial) => {
                partial.codec.is_some()
                    || matches!(value, Value::Struct(s) if Arc::ptr_eq(s.schema(), partial.schema()))
            }
        }
    }

    /// Human-readable type name, e.g. `nullable<list<i32>>`.
    pub fn describe(&self) -> String {
        match self {
            DataType::Nullable(nullable) => format!("nullable<{}>", nullable.inner().describe()),
            DataType::Simple(simple) => simple.kind().name().to_string(),
            DataType::Collect(collect) if collect.is_set() => format!("set<{}>", collect.element().describe()),
            DataType::Collect(collect) => format!("list<{}>", collect.element().describe()),
            DataType::Partial(partial) => partial.describe(),
        }
    }
}

impl From<SimpleType> for DataType {
    fn from(simple: SimpleType) -> Self {
        DataType::Simple(simple)
    }
}

impl From<CollectType> for DataType {
    fn from(collect: CollectType) -> Self {
        DataType::Collect(collect)
    }
}

impl From<PartialType> for DataType {
    fn from(partial: PartialType) -> Self {
        DataType::Partial(partial)
    }
}
