//! Flatten recipes
//!
//! A [`Recipe`] is the pre-computed plan flatten and inflate follow instead of
//! walking the schema tree. It is a flat arena of nesting markers: every
//! nested struct field contributes a `Start` marker, the markers of its own
//! nested fields, and a matching `End`. Each `Start` records the offset of its
//! `End`, so a nested struct can be skipped in one step.

use crate::error::{Error, Result};
use crate::melt::config::MeltConfig;
use crate::schema::{FieldDef, Schema};
use crate::types::{DataType, PartialType};
use std::sync::Arc;

/// Opening marker of a struct inside a recipe.
#[derive(Debug, Clone)]
pub struct StructStart {
    /// Declared type, including a Nullable wrapper when there is one.
    pub ty: DataType,
    /// The struct type itself.
    pub partial: PartialType,
    /// Whether a field-set bitmask column precedes the struct's columns.
    pub has_field_set: bool,
    /// Ordinal of the owning field; `None` at top level.
    pub field: Option<u8>,
    /// Columns of the struct when every field is present.
    pub col_count: usize,
    /// Offset of the matching [`Nesting::End`].
    pub end: usize,
}

/// One recipe instruction.
#[derive(Debug, Clone)]
pub enum Nesting {
    Start(StructStart),
    End,
}

/// One column of the full-width layout.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub ty: DataType,
    /// Whether the column holds a field-set bitmask rather than a field value.
    pub field_set: bool,
}

/// Pre-computed flatten/inflate plan of a schema.
#[derive(Debug, Clone)]
pub struct Recipe {
    nestings: Vec<Nesting>,
}

impl Recipe {
    /// Compile the recipe of `schema`. Use [`Schema::recipe`] to get the cached one.
    pub(crate) fn compile(schema: &Arc<Schema>, with_field_set: bool) -> Result<Self> {
        check_acyclic(schema, &mut Vec::new())?;

        let (ty, partial) = if with_field_set {
            (schema.partial_type(), PartialType::partial(schema.clone()))
        } else {
            (schema.struct_type(), PartialType::full(schema.clone()))
        };

        let mut nestings = vec![Nesting::End];
        let mut col_count = usize::from(with_field_set);
        for field in schema.fields()? {
            match field.ty().as_partial() {
                Some(nested) => col_count += splice(&mut nestings, field, nested)?,
                None => col_count += 1,
            }
        }
        let end = nestings.len();
        nestings.push(Nesting::End);
        nestings[0] = Nesting::Start(StructStart {
            ty,
            partial,
            has_field_set: with_field_set,
            field: None,
            col_count,
            end,
        });

        log::debug!(
            "compiled recipe for `{}`: {} markers, {} columns",
            schema.name(),
            nestings.len(),
            col_count
        );
        Ok(Recipe { nestings })
    }

    pub fn nestings(&self) -> &[Nesting] {
        &self.nestings
    }

    /// The top-level marker.
    pub fn root(&self) -> &StructStart {
        match &self.nestings[0] {
            Nesting::Start(start) => start,
            Nesting::End => unreachable!("recipe always opens with a struct start"),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        self.root().partial.schema()
    }

    /// Columns of a value whose fields are all present, nested ones included.
    pub fn column_count(&self) -> usize {
        self.root().col_count
    }

    pub(crate) fn start_at(&self, offset: usize) -> Result<&StructStart> {
        match self.nestings.get(offset) {
            Some(Nesting::Start(start)) => Ok(start),
            _ => Err(Error::mismatch(
                self.schema().name(),
                format!("no struct start at recipe offset {offset}"),
            )),
        }
    }

    /// The nested struct opened at `offset` when it belongs to field `ordinal`.
    pub(crate) fn child_at(&self, offset: usize, ordinal: u8) -> Option<&StructStart> {
        match self.nestings.get(offset) {
            Some(Nesting::Start(start)) if start.field == Some(ordinal) => Some(start),
            _ => None,
        }
    }

    /// Names and types of the full-width layout, in flatten order.
    pub fn columns(&self, config: &MeltConfig) -> Result<Vec<Column>> {
        let mut out = Vec::with_capacity(self.column_count());
        self.collect_columns(0, "", config, &mut out)?;
        Ok(out)
    }

    fn collect_columns(&self, offset: usize, prefix: &str, config: &MeltConfig, out: &mut Vec<Column>) -> Result<()> {
        let start = self.start_at(offset)?;
        if start.has_field_set {
            let name = if prefix.is_empty() {
                config.field_set_column.clone()
            } else {
                prefix.to_string()
            };
            let ty = if start.ty.is_nullable() {
                DataType::nullable(DataType::i64())?
            } else {
                DataType::i64()
            };
            out.push(Column {
                name,
                ty,
                field_set: true,
            });
        }

        let mut child = offset + 1;
        for field in start.partial.schema().fields()? {
            let name = config.join(prefix, field.name());
            match self.child_at(child, field.ordinal()) {
                Some(nested) => {
                    let end = nested.end;
                    self.collect_columns(child, &name, config, out)?;
                    child = end + 1;
                }
                None => out.push(Column {
                    name,
                    ty: field.ty().clone(),
                    field_set: false,
                }),
            }
        }
        Ok(())
    }
}

/// Append the nested schema's cached recipe under `field`; returns its column count.
fn splice(out: &mut Vec<Nesting>, field: &FieldDef, partial: &PartialType) -> Result<usize> {
    let nested = partial.schema().recipe()?;
    let has_field_set = field.ty().is_nullable() || !partial.is_full();
    let col_count = nested.column_count() + usize::from(has_field_set);

    let base = out.len();
    for (i, nesting) in nested.nestings.iter().enumerate() {
        match nesting {
            Nesting::Start(start) => {
                let mut start = start.clone();
                start.end += base;
                if i == 0 {
                    start.ty = field.ty().clone();
                    start.partial = partial.clone();
                    start.has_field_set = has_field_set;
                    start.field = Some(field.ordinal());
                    start.col_count = col_count;
                }
                out.push(Nesting::Start(start));
            }
            Nesting::End => out.push(Nesting::End),
        }
    }
    Ok(col_count)
}

fn check_acyclic(schema: &Arc<Schema>, stack: &mut Vec<*const Schema>) -> Result<()> {
    stack.push(Arc::as_ptr(schema));
    for field in schema.fields()? {
        if let Some(nested) = field.ty().as_partial() {
            if stack.contains(&Arc::as_ptr(nested.schema())) {
                return Err(Error::RecursiveSchema {
                    schema: schema.name().to_string(),
                    field: field.name().to_string(),
                });
            }
            check_acyclic(nested.schema(), stack)?;
        }
    }
    stack.pop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn point() -> Arc<Schema> {
        let schema = Schema::new("Point");
        schema.declare_immutable("x", DataType::i32()).unwrap();
        schema.declare_immutable("y", DataType::i32()).unwrap();
        schema
    }

    fn starts(recipe: &Recipe) -> Vec<&StructStart> {
        recipe
            .nestings()
            .iter()
            .filter_map(|n| match n {
                Nesting::Start(s) => Some(s),
                Nesting::End => None,
            })
            .collect()
    }

    #[test]
    fn test_flat_schema_recipe() {
        let recipe = point().recipe().unwrap();

        assert_eq!(recipe.nestings().len(), 2);
        assert!(recipe.root().field.is_none());
        assert!(!recipe.root().has_field_set);
        assert_eq!(recipe.root().end, 1);
        assert_eq!(recipe.column_count(), 2);
    }

    #[test]
    fn test_nested_full_struct_has_no_field_set_column() {
        let point = point();
        let shape = Schema::new("Shape");
        shape.declare_immutable("name", DataType::string()).unwrap();
        shape.declare_immutable("origin", point.struct_type()).unwrap();
        shape.declare_immutable("scale", DataType::f64()).unwrap();

        let recipe = shape.recipe().unwrap();
        assert_eq!(recipe.column_count(), 4);

        let starts = starts(&recipe);
        assert_eq!(starts.len(), 2);
        assert_eq!(starts[1].field, Some(1));
        assert!(!starts[1].has_field_set);
        assert_eq!(starts[1].col_count, 2);
        assert_eq!(recipe.root().end, 3);
        assert_eq!(starts[1].end, 2);
    }

    #[test]
    fn test_nullable_or_partial_nested_struct_reserves_field_set() {
        let point = point();
        let shape = Schema::new("Shape");
        shape.declare_immutable("origin", DataType::nullable(point.struct_type()).unwrap()).unwrap();
        shape.declare_immutable("delta", point.partial_type()).unwrap();

        let recipe = shape.recipe().unwrap();
        let starts = starts(&recipe);
        assert!(starts[1].has_field_set);
        assert!(starts[2].has_field_set);
        assert_eq!(starts[1].col_count, 3);
        assert_eq!(recipe.column_count(), 6);
    }

    #[test]
    fn test_recipe_is_cached_per_schema() {
        let point = point();
        let a = point.recipe().unwrap();
        let b = point.recipe().unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let partial = point.partial_recipe().unwrap();
        assert!(partial.root().has_field_set);
        assert_eq!(partial.column_count(), 3);
    }

    #[test]
    fn test_three_levels_deep() {
        let inner = Schema::new("Inner");
        inner.declare_immutable("v", DataType::i64()).unwrap();
        let middle = Schema::new("Middle");
        middle.declare_immutable("inner", DataType::nullable(inner.struct_type()).unwrap()).unwrap();
        middle.declare_immutable("m", DataType::bool()).unwrap();
        let outer = Schema::new("Outer");
        outer.declare_immutable("middle", middle.partial_type()).unwrap();
        outer.declare_immutable("o", DataType::string()).unwrap();

        let recipe = outer.recipe().unwrap();
        // leaves v, m, o plus the field sets of `middle` and `middle.inner`
        assert_eq!(recipe.column_count(), 5);
        assert_eq!(starts(&recipe).len(), 3);
    }

    #[test]
    fn test_columns_are_named_by_path() {
        let point = point();
        let shape = Schema::new("Shape");
        shape.declare_immutable("name", DataType::string()).unwrap();
        shape.declare_mutable("origin", DataType::nullable(point.struct_type()).unwrap(), Some(Value::Null)).unwrap();

        let columns = shape.partial_recipe().unwrap().columns(&MeltConfig::default()).unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["_fields", "name", "origin", "origin_x", "origin_y"]);
        assert!(columns[0].field_set);
        assert!(columns[2].field_set && columns[2].ty.is_nullable());
    }

    #[test]
    fn test_cycle_is_rejected() {
        let a = Schema::new("A");
        let b = Schema::new("B");
        a.declare_immutable("id", DataType::i32()).unwrap();
        b.declare_mutable("a", DataType::nullable(a.struct_type()).unwrap(), None).unwrap();
        a.declare_mutable("b", DataType::nullable(b.struct_type()).unwrap(), None).unwrap();

        let err = a.recipe().unwrap_err();
        assert!(matches!(err, Error::RecursiveSchema { .. }));
    }
}
