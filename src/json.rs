//! Conversions between struct values and `serde_json` values.

use crate::error::{Error, Result};
use crate::melt::Recipe;
use crate::schema::FieldSet;
use crate::tokens::{Token, TokenKind, TokenStream};
use crate::types::{DataType, Kind, PartialType, SimpleType};
use crate::value::Value;
use serde_json::{Map, Number, Value as Json};

/// Read `json` as a value of `ty`.
///
/// Primitive JSON values hold the stored form of a simple type and are run
/// through its `load` conversion. Strings are accepted wherever they parse as
/// the expected kind. Objects missing fields of a full struct type fall back
/// to the field defaults.
pub fn value_from_json(ty: &DataType, json: &Json) -> Result<Value> {
    match ty {
        DataType::Nullable(nullable) => match json {
            Json::Null => Ok(Value::Null),
            json => value_from_json(nullable.inner(), json),
        },
        DataType::Simple(simple) => simple.load(simple_from_json(simple, json)?),
        DataType::Collect(collect) => {
            let Json::Array(items) = json else {
                return Err(Error::type_mismatch(ty.describe(), json_type(json)));
            };
            let items = items
                .iter()
                .map(|item| value_from_json(collect.element(), item))
                .collect::<Result<Vec<_>>>()?;
            collect.load(items)
        }
        DataType::Partial(partial) => struct_from_json(partial, json),
    }
}

fn simple_from_json(simple: &SimpleType, json: &Json) -> Result<Value> {
    let kind = simple.kind();
    if let (Kind::Blob, Json::Array(bytes)) = (kind, json) {
        let bytes = bytes
            .iter()
            .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| Error::type_mismatch("blob", "array of non-bytes"))?;
        return Ok(Value::Blob(bytes));
    }
    // JSON decimals rarely survive the exact f64 to f32 coercion
    if let (Kind::F32, Json::Number(n)) = (kind, json) {
        if let Some(v) = n.as_f64() {
            return Ok(Value::F32(v as f32));
        }
    }

    let token = match json {
        Json::Bool(b) => Token::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Token::I64(i),
            None => Token::F64(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Token::Str(s.clone()),
        other => return Err(Error::type_mismatch(kind.name(), json_type(other))),
    };
    match token.coerce(kind.token_kind())? {
        Token::Bool(v) => Ok(Value::Bool(v)),
        Token::I32(v) => Ok(Value::I32(v)),
        Token::I64(v) => Ok(Value::I64(v)),
        Token::F32(v) => Ok(Value::F32(v)),
        Token::F64(v) => Ok(Value::F64(v)),
        Token::Str(v) => Ok(Value::Str(v)),
        Token::Blob(v) => Ok(Value::Blob(v)),
        other => Err(Error::type_mismatch(kind.name(), other.kind().name())),
    }
}

fn struct_from_json(partial: &PartialType, json: &Json) -> Result<Value> {
    let schema = partial.schema();
    let Json::Object(object) = json else {
        return Err(Error::type_mismatch(format!("struct {}", schema.name()), json_type(json)));
    };

    let mut present = vec![None; schema.fields()?.len()];
    for (name, item) in object {
        let field = schema.field_by_name(name)?.ok_or_else(|| Error::UnknownField {
            schema: schema.name().to_string(),
            field: name.clone(),
        })?;
        present[usize::from(field.ordinal())] = Some(value_from_json(field.ty(), item)?);
    }

    let mut builder = schema.builder()?;
    for (field, value) in schema.fields()?.iter().zip(present) {
        if let Some(value) = value {
            builder = builder.set(field, value)?;
        }
    }
    let snapshot = if partial.is_full() {
        builder.build()?
    } else {
        builder.build_partial()?
    };
    Ok(Value::Struct(snapshot))
}

/// Render a value without its type: structs become objects keyed by field
/// name, blobs arrays of bytes, non-finite floats `null`.
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(v) => Json::Bool(*v),
        Value::I32(v) => Json::from(*v),
        Value::I64(v) => Json::from(*v),
        Value::F32(v) => f32_to_json(*v),
        Value::F64(v) => float_to_json(*v),
        Value::Str(v) => Json::String(v.clone()),
        Value::Blob(v) => Json::Array(v.iter().map(|b| Json::from(*b)).collect()),
        Value::List(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Struct(snapshot) => {
            let object: Map<String, Json> = snapshot
                .iter()
                .map(|(field, value)| (field.name().to_string(), value_to_json(value)))
                .collect();
            Json::Object(object)
        }
    }
}

/// Read a row written by `RowWriter` back into columns typed by `recipe`.
///
/// The walk matches `Recipe::inflate`: a struct's field-set column is read
/// first and decides which of its fields have columns, and every present leaf
/// is read as its field's type.
pub fn row_from_json(recipe: &Recipe, row: &[Json]) -> Result<Vec<Value>> {
    let mut columns = Vec::with_capacity(row.len());
    let read = struct_row_from_json(recipe, 0, row, 0, &mut columns)?;
    if read != row.len() {
        return Err(Error::mismatch(
            recipe.schema().name(),
            format!("{} of {} columns left unread", row.len() - read, row.len()),
        ));
    }
    Ok(columns)
}

fn struct_row_from_json(
    recipe: &Recipe,
    recipe_offset: usize,
    row: &[Json],
    pos: usize,
    out: &mut Vec<Value>,
) -> Result<usize> {
    let start = recipe.start_at(recipe_offset)?;
    let schema = start.partial.schema();

    let mut src = pos;
    let fields = if start.has_field_set {
        let column = row_column(row, src, schema.name())?;
        src += 1;
        if column.is_null() && start.ty.is_nullable() {
            out.push(Value::Null);
            return Ok(1);
        }
        let bits = column.as_i64().ok_or_else(|| {
            Error::mismatch(
                schema.name(),
                format!("field set column at {} holds {}", src - 1, json_type(column)),
            )
        })?;
        out.push(Value::I64(bits));
        FieldSet::from_bits(bits as u64)
    } else {
        schema.all_field_set()?
    };

    let mut child = recipe_offset + 1;
    for field in schema.fields()? {
        let nested = recipe.child_at(child, field.ordinal()).map(|s| (child, s.end));
        if let Some((_, end)) = nested {
            child = end + 1;
        }
        if !fields.contains(field.ordinal()) {
            continue;
        }

        match nested {
            Some((offset, _)) => src += struct_row_from_json(recipe, offset, row, src, out)?,
            None => {
                let json = row_column(row, src, schema.name())?;
                out.push(value_from_json(field.ty(), json)?);
                src += 1;
            }
        }
    }
    Ok(src - pos)
}

fn row_column<'a>(row: &'a [Json], pos: usize, schema: &str) -> Result<&'a Json> {
    row.get(pos)
        .ok_or_else(|| Error::mismatch(schema, format!("ran out of columns at {pos}")))
}

/// Drain one complete value from `stream` into JSON.
pub fn tokens_to_json(stream: &mut TokenStream) -> Result<Json> {
    let token = stream.next_coerced(None)?.ok_or_else(end_of_stream)?;
    match token {
        Token::Null => Ok(Json::Null),
        Token::Bool(v) => Ok(Json::Bool(v)),
        Token::I32(v) => Ok(Json::from(v)),
        Token::I64(v) => Ok(Json::from(v)),
        Token::F32(v) => Ok(f32_to_json(v)),
        Token::F64(v) => Ok(float_to_json(v)),
        Token::Str(v) => Ok(Json::String(v)),
        Token::Blob(v) => Ok(Json::Array(v.into_iter().map(Json::from).collect())),
        Token::BeginSequence => {
            let mut items = Vec::new();
            while stream.peek_kind()?.ok_or_else(end_of_stream)? != TokenKind::EndSequence {
                items.push(tokens_to_json(stream)?);
            }
            stream.next_coerced(None)?;
            Ok(Json::Array(items))
        }
        Token::BeginDictionary => {
            let mut object = Map::new();
            loop {
                match stream.next_coerced(None)?.ok_or_else(end_of_stream)? {
                    Token::EndDictionary => break,
                    Token::Str(name) => {
                        let value = tokens_to_json(stream)?;
                        object.insert(name, value);
                    }
                    other => return Err(Error::type_mismatch("field name", other.kind().name())),
                }
            }
            Ok(Json::Object(object))
        }
        Token::EndSequence | Token::EndDictionary => Err(Error::type_mismatch("value", token.kind().name())),
    }
}

fn end_of_stream() -> Error {
    Error::type_mismatch("token", "end of stream")
}

fn float_to_json(v: f64) -> Json {
    Number::from_f64(v).map_or(Json::Null, Json::Number)
}

// Widen through the shortest decimal so `0.1f32` renders as `0.1`
fn f32_to_json(v: f32) -> Json {
    float_to_json(v.to_string().parse().unwrap_or(f64::NAN))
}

fn json_type(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
