//! Flat columns back to a struct value.

use crate::error::{Error, Result};
use crate::melt::plan::Recipe;
use crate::schema::FieldSet;
use crate::value::Value;
use std::mem;

impl Recipe {
    /// Rebuild the value `flatten` produced these columns from.
    pub fn inflate(&self, mut columns: Vec<Value>) -> Result<Value> {
        if columns.is_empty() {
            return Err(Error::mismatch(self.schema().name(), "no columns to inflate"));
        }
        let consumed = self.inflate_at(&mut columns, 0, 0, 0)?;
        if consumed != columns.len() {
            return Err(Error::mismatch(
                self.schema().name(),
                format!("{} of {} columns left unread", columns.len() - consumed, columns.len()),
            ));
        }
        Ok(mem::take(&mut columns[0]))
    }

    /// Read the struct opened at `recipe_offset` from `values[src_pos..]` and
    /// store it at `values[dst_pos]`, returning how many columns were read.
    ///
    /// Input and output share `values`: consumed slots are overwritten, which
    /// stays sound because every struct reads at least one column, so the
    /// write position never passes the read position.
    pub fn inflate_at(&self, values: &mut [Value], src_pos: usize, dst_pos: usize, recipe_offset: usize) -> Result<usize> {
        assert!(dst_pos <= src_pos, "inflate would write at {dst_pos} ahead of read position {src_pos}");
        let start = self.start_at(recipe_offset)?;
        let schema = start.partial.schema();
        let all = schema.all_field_set()?;

        let mut src = src_pos;
        let fields = if start.has_field_set {
            let column = take_column(values, src, schema.name())?;
            src += 1;
            match column {
                Value::Null if start.ty.is_nullable() => {
                    values[dst_pos] = Value::Null;
                    return Ok(1);
                }
                Value::I64(bits) => FieldSet::from_bits(bits as u64),
                other => {
                    return Err(Error::mismatch(
                        schema.name(),
                        format!("field set column at {} holds {}", src - 1, other.type_name()),
                    ));
                }
            }
        } else {
            all
        };
        if !all.contains_all(fields) {
            return Err(Error::mismatch(
                schema.name(),
                format!("field set {:#x} exceeds {} declared fields", fields.bits(), all.len()),
            ));
        }

        let mut dst = dst_pos;
        let mut child = recipe_offset + 1;
        for field in schema.fields()? {
            let nested = self.child_at(child, field.ordinal()).map(|s| (child, s.end));
            if let Some((_, end)) = nested {
                child = end + 1;
            }
            if !fields.contains(field.ordinal()) {
                continue;
            }

            match nested {
                Some((offset, _)) => src += self.inflate_at(values, src, dst, offset)?,
                None => {
                    let value = take_column(values, src, schema.name())?;
                    values[dst] = value;
                    src += 1;
                }
            }
            dst += 1;
        }

        let collected = match fields.len() {
            0 => Value::Null,
            1 => mem::take(&mut values[dst_pos]),
            n => Value::List(values[dst_pos..dst_pos + n].iter_mut().map(mem::take).collect()),
        };
        values[dst_pos] = start.partial.load(fields, collected)?;

        log::trace!("inflated `{}` from {} columns", schema.name(), src - src_pos);
        Ok(src - src_pos)
    }
}

fn take_column(values: &mut [Value], pos: usize, schema: &str) -> Result<Value> {
    values
        .get_mut(pos)
        .map(mem::take)
        .ok_or_else(|| Error::mismatch(schema, format!("ran out of columns at {pos}")))
}
