//! Struct melting - flatten nested struct values into columns and back
//!
//! A [`Recipe`] is compiled once per schema and drives both directions:
//! [`Recipe::flatten`] turns a struct value into a flat row of column values,
//! [`Recipe::inflate`] rebuilds the struct from such a row.
//!
//! ## Column layout
//!
//! Columns follow field ordinals depth-first. A nested struct field that is
//! nullable or partial is preceded by a field-set column holding the bitmask of
//! its present fields (or `Null` when the struct is absent). Absent fields
//! occupy no column, so the layout of a row depends only on the schema and the
//! field sets of the value.

pub mod config;
pub mod flatten;
pub mod inflate;
pub mod plan;
pub mod writer;

pub use config::MeltConfig;
pub use plan::{Column, Nesting, Recipe, StructStart};
pub use writer::RowWriter;
