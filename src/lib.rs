//! # Structflat - Struct Values to Flat Columns
//!
//! A typed model for struct-shaped records and the machinery to move them in
//! and out of flat, column-oriented storage.
//!
//! ## Modules
//!
//! - **types**: the closed [`DataType`] model (nullable, simple, collection, struct)
//! - **schema**: schemas, fields, field sets, builders and JSON schema descriptors
//! - **melt**: flatten recipes, flatten/inflate and the row writer
//! - **tokens**: lazy self-describing token streams over typed values
//! - **json**: `serde_json` bridges for values, rows and token streams
//!
//! ## Quick Start
//!
//! ```rust
//! use structflat::{DataType, Schema, Value};
//!
//! # fn main() -> structflat::Result<()> {
//! let point = Schema::new("Point");
//! point.declare_immutable("x", DataType::i32())?;
//! point.declare_immutable("y", DataType::i32())?;
//!
//! let shape = Schema::new("Shape");
//! shape.declare_immutable("name", DataType::string())?;
//! shape.declare_immutable("origin", point.struct_type())?;
//! shape.declare_immutable("scale", DataType::f64())?;
//!
//! let origin = point.builder()?.set_by_name("x", 1)?.set_by_name("y", 2)?.build()?;
//! let value = shape
//!     .builder()?
//!     .set_by_name("name", "box")?
//!     .set_by_name("origin", origin)?
//!     .set_by_name("scale", 2.5)?
//!     .build()?;
//!
//! let recipe = shape.recipe()?;
//! let columns = recipe.flatten(Value::Struct(value.clone()))?;
//! assert_eq!(columns, vec![Value::from("box"), Value::I32(1), Value::I32(2), Value::F64(2.5)]);
//! assert_eq!(recipe.inflate(columns)?, Value::Struct(value));
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result as AnyResult};
use serde_json::Value as Json;
use std::io::{BufRead, Write};

pub mod error;
pub mod json;
pub mod melt;
pub mod schema;
pub mod tokens;
pub mod types;
pub mod value;

// Re-export commonly used types for convenience
pub use error::{Error, Result};
pub use melt::{Column, MeltConfig, Nesting, Recipe, RowWriter, StructStart};
pub use schema::{FieldDef, FieldRef, FieldSet, Mutability, Schema, SchemaRegistry, StructBuilder};
pub use tokens::{emit_tokens, Token, TokenKind, TokenStream};
pub use types::{CollectType, DataType, Kind, NullableType, PartialCodec, PartialType, SimpleType};
pub use value::{StructSnapshot, Value};

/// Flatten a stream of JSON values, one per line, into rows.
///
/// Blank lines are skipped. Returns the number of rows written.
pub fn melt_ndjson<R: BufRead, W: Write>(reader: R, recipe: &Recipe, writer: &mut RowWriter<W>) -> AnyResult<usize> {
    let ty = &recipe.root().ty;
    writer.write_header(recipe)?;

    for (index, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Json =
            serde_json::from_str(&line).with_context(|| format!("Failed to parse JSON on line {}", index + 1))?;
        let value = json::value_from_json(ty, &record).with_context(|| format!("Invalid value on line {}", index + 1))?;
        let columns = recipe
            .flatten(value)
            .with_context(|| format!("Failed to flatten line {}", index + 1))?;
        writer.write_row(&columns)?;
    }

    writer.flush()?;
    Ok(writer.rows())
}

/// Inflate rows, one JSON array per line, back into JSON values.
///
/// Returns the number of values written.
pub fn thaw_ndjson<R: BufRead, W: Write>(reader: R, recipe: &Recipe, writer: &mut W) -> AnyResult<usize> {
    let mut count = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        if line.trim().is_empty() {
            continue;
        }
        let row: Vec<Json> =
            serde_json::from_str(&line).with_context(|| format!("Failed to parse row on line {}", index + 1))?;
        let columns =
            json::row_from_json(recipe, &row).with_context(|| format!("Invalid row on line {}", index + 1))?;
        let value = recipe
            .inflate(columns)
            .with_context(|| format!("Failed to inflate line {}", index + 1))?;

        let line = serde_json::to_string(&json::value_to_json(&value)).context("Failed to serialize value")?;
        writeln!(writer, "{}", line).context("Failed to write value")?;
        count += 1;
    }

    writer.flush().context("Failed to flush writer")?;
    Ok(count)
}
