//! Struct value to flat columns.

use crate::error::{Error, Result};
use crate::melt::plan::Recipe;
use crate::schema::FieldSet;
use crate::value::Value;

impl Recipe {
    /// Flatten `value` into its columns.
    ///
    /// Absent fields take no column. An absent nullable struct takes a single
    /// `Null` in place of its field-set column.
    pub fn flatten(&self, value: Value) -> Result<Vec<Value>> {
        let mut out = vec![Value::Null; self.column_count()];
        let written = self.flatten_into(value, &mut out, 0, 0)?;
        out.truncate(written);
        Ok(out)
    }

    /// Write the columns of the struct opened at `recipe_offset` into `out`
    /// from `dst_pos`, returning how many were written.
    ///
    /// `out` must have room for the struct's full column count from `dst_pos`.
    pub fn flatten_into(&self, value: Value, out: &mut [Value], dst_pos: usize, recipe_offset: usize) -> Result<usize> {
        let start = self.start_at(recipe_offset)?;
        let schema = start.partial.schema();
        assert!(
            dst_pos + start.col_count <= out.len(),
            "flatten buffer for `{}` holds {} columns, needs {} from {}",
            schema.name(),
            out.len(),
            start.col_count,
            dst_pos
        );

        let all = schema.all_field_set()?;
        let mut dst = dst_pos;
        let fields = if start.has_field_set {
            if value.is_null() {
                if !start.ty.is_nullable() {
                    return Err(Error::mismatch(schema.name(), "null value for a non-nullable struct"));
                }
                out[dst] = Value::Null;
                return Ok(1);
            }
            let fields = start.partial.fields(&value)?;
            out[dst] = Value::I64(fields.bits() as i64);
            dst += 1;
            fields
        } else {
            start.partial.fields(&value)?
        };
        if start.partial.is_full() && fields != all {
            return Err(Error::mismatch(
                schema.name(),
                format!("{} of {} fields present where all are required", fields.len(), all.len()),
            ));
        }
        if !all.contains_all(fields) {
            return Err(Error::mismatch(
                schema.name(),
                format!("field set {:#x} exceeds {} declared fields", fields.bits(), all.len()),
            ));
        }

        let mut values = stored_values(schema.name(), fields, start.partial.store(value)?)?.into_iter();
        let mut child = recipe_offset + 1;
        for field in schema.fields()? {
            let nested = self.child_at(child, field.ordinal()).map(|s| (child, s.end));
            if let Some((_, end)) = nested {
                child = end + 1;
            }
            if !fields.contains(field.ordinal()) {
                continue;
            }

            let Some(value) = values.next() else {
                return Err(Error::mismatch(schema.name(), format!("no stored value for `{}`", field.name())));
            };
            match nested {
                Some((offset, _)) => dst += self.flatten_into(value, out, dst, offset)?,
                None => {
                    out[dst] = value;
                    dst += 1;
                }
            }
        }

        log::trace!("flattened `{}` into {} columns", schema.name(), dst - dst_pos);
        Ok(dst - dst_pos)
    }
}

/// Spread the output of `Partial.store` into one value per present field.
pub(crate) fn stored_values(schema: &str, fields: FieldSet, stored: Value) -> Result<Vec<Value>> {
    match (fields.len(), stored) {
        (0, _) => Ok(Vec::new()),
        (1, value) => Ok(vec![value]),
        (n, Value::List(values)) if values.len() == n => Ok(values),
        (n, other) => Err(Error::mismatch(
            schema,
            format!("expected {} stored field values, got {}", n, other.type_name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use crate::types::DataType;
    use std::sync::Arc;

    fn point() -> Arc<Schema> {
        let schema = Schema::new("Point");
        schema.declare_immutable("x", DataType::i32()).unwrap();
        schema.declare_immutable("y", DataType::i32()).unwrap();
        schema
    }

    fn shape(origin: DataType) -> Arc<Schema> {
        let schema = Schema::new("Shape");
        schema.declare_immutable("name", DataType::string()).unwrap();
        schema.declare_mutable("origin", origin, None).unwrap();
        schema.declare_mutable("scale", DataType::f64(), None).unwrap();
        schema
    }

    fn at(point: &Arc<Schema>, x: i32, y: i32) -> Value {
        Value::Struct(point.builder().unwrap().set_by_name("x", x).unwrap().set_by_name("y", y).unwrap().build().unwrap())
    }

    #[test]
    fn test_full_nested_struct_is_inlined() {
        let point = point();
        let shape = shape(point.struct_type());
        let value = shape
            .builder()
            .unwrap()
            .set_by_name("name", "box")
            .unwrap()
            .set_by_name("origin", at(&point, 1, 2))
            .unwrap()
            .set_by_name("scale", 2.5)
            .unwrap()
            .build()
            .unwrap();

        let recipe = shape.recipe().unwrap();
        let columns = recipe.flatten(Value::Struct(value)).unwrap();
        assert_eq!(
            columns,
            vec![Value::from("box"), Value::I32(1), Value::I32(2), Value::F64(2.5)]
        );
        assert_eq!(columns.len(), recipe.column_count());
    }

    #[test]
    fn test_absent_nullable_struct_takes_one_column() {
        let point = point();
        let shape = shape(DataType::nullable(point.struct_type()).unwrap());
        let value = shape
            .builder()
            .unwrap()
            .set_by_name("name", "box")
            .unwrap()
            .set_by_name("origin", Value::Null)
            .unwrap()
            .set_by_name("scale", 2.5)
            .unwrap()
            .build()
            .unwrap();

        let columns = shape.recipe().unwrap().flatten(Value::Struct(value)).unwrap();
        assert_eq!(columns, vec![Value::from("box"), Value::Null, Value::F64(2.5)]);
    }

    #[test]
    fn test_present_nullable_struct_leads_with_field_set() {
        let point = point();
        let shape = shape(DataType::nullable(point.struct_type()).unwrap());
        let value = shape
            .builder()
            .unwrap()
            .set_by_name("name", "box")
            .unwrap()
            .set_by_name("origin", at(&point, 3, 4))
            .unwrap()
            .set_by_name("scale", 1.0)
            .unwrap()
            .build()
            .unwrap();

        let columns = shape.recipe().unwrap().flatten(Value::Struct(value)).unwrap();
        assert_eq!(
            columns,
            vec![Value::from("box"), Value::I64(0b11), Value::I32(3), Value::I32(4), Value::F64(1.0)]
        );
    }

    #[test]
    fn test_partial_top_level_skips_absent_fields() {
        let point = point();
        let shape = shape(point.struct_type());
        let value = shape.builder().unwrap().set_by_name("scale", 3.0).unwrap().build_partial().unwrap();

        let columns = shape.partial_recipe().unwrap().flatten(Value::Struct(value)).unwrap();
        assert_eq!(columns, vec![Value::I64(0b100), Value::F64(3.0)]);
    }

    #[test]
    fn test_empty_partial_writes_only_field_set() {
        let point = point();
        let value = point.builder().unwrap().build_partial().unwrap();

        let columns = point.partial_recipe().unwrap().flatten(Value::Struct(value)).unwrap();
        assert_eq!(columns, vec![Value::I64(0)]);
    }

    #[test]
    fn test_partial_value_on_full_recipe_is_rejected() {
        let point = point();
        let value = point.builder().unwrap().set_by_name("x", 1).unwrap().build_partial().unwrap();

        let err = point.recipe().unwrap().flatten(Value::Struct(value)).unwrap_err();
        assert!(matches!(err, Error::RecipeMismatch { .. }));
    }

    #[test]
    fn test_flatten_into_offset_buffer() {
        let point = point();
        let recipe = point.recipe().unwrap();
        let mut out = vec![Value::Null; 4];

        let written = recipe.flatten_into(at(&point, 5, 6), &mut out, 2, 0).unwrap();
        assert_eq!(written, 2);
        assert_eq!(out, vec![Value::Null, Value::Null, Value::I32(5), Value::I32(6)]);
    }

    #[test]
    #[should_panic(expected = "flatten buffer")]
    fn test_undersized_buffer_panics() {
        let point = point();
        let mut out = vec![Value::Null; 1];
        let _ = point.recipe().unwrap().flatten_into(at(&point, 5, 6), &mut out, 0, 0);
    }
}
