use thiserror::Error;

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while declaring schemas and encoding or decoding struct values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Two fields of one schema share a name.
    #[error("duplicate field `{schema}`.`{name}`")]
    DuplicateFieldName { schema: String, name: String },

    /// A 65th field was declared.
    #[error("schema `{schema}` cannot hold field `{name}`: ordinals are limited to [0, 63]")]
    OrdinalOverflow { schema: String, name: String },

    /// A declaration arrived after the schema was frozen.
    #[error("schema `{schema}` is already frozen")]
    SchemaAlreadyFrozen { schema: String },

    /// The schema declared no fields at all.
    #[error("schema `{schema}` must declare at least one field")]
    EmptySchema { schema: String },

    /// The type cannot be built from the given parts, e.g. a nullable nullable.
    #[error("invalid type composition: {0}")]
    InvalidTypeComposition(String),

    /// Schemas reference each other in a cycle.
    #[error("schema `{schema}` contains itself through field `{field}`")]
    RecursiveSchema { schema: String, field: String },

    /// The field declares no default value.
    #[error("no default value for `{schema}`.`{field}`")]
    MissingDefault { schema: String, field: String },

    /// A full struct was requested without a value for this field.
    #[error("no value for `{schema}`.`{field}`")]
    MissingField { schema: String, field: String },

    /// The field does not belong to the schema.
    #[error("schema `{schema}` has no field `{field}`")]
    UnknownField { schema: String, field: String },

    /// Immutable fields cannot be replaced after construction.
    #[error("field `{schema}`.`{field}` is immutable")]
    ImmutableField { schema: String, field: String },

    /// The name is not usable as a field or column name.
    #[error("invalid field name `{0}`")]
    InvalidFieldName(String),

    /// A descriptor referenced a schema that was not declared before it.
    #[error("unknown schema `{0}`")]
    UnknownSchema(String),

    /// A descriptor declared two schemas with one name.
    #[error("schema `{0}` is declared twice")]
    DuplicateSchemaName(String),

    /// The recipe does not describe the value or the columns it was given.
    #[error("recipe mismatch for `{schema}`: {detail}")]
    RecipeMismatch { schema: String, detail: String },

    /// A value does not have the shape its type expects.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A token cannot be represented as the requested token kind.
    #[error("cannot coerce {from} to {to}")]
    Coercion { from: String, to: String },

    /// A user-supplied store/load conversion failed.
    #[error("conversion failed: {0}")]
    Convert(String),
}

impl Error {
    pub(crate) fn mismatch(schema: &str, detail: impl Into<String>) -> Self {
        Error::RecipeMismatch {
            schema: schema.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}
