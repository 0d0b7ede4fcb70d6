//! Self-describing token streams
//!
//! A [`TokenStream`] walks a value through its [`DataType`](crate::DataType)
//! and yields primitive tokens plus sequence and dictionary brackets, so any
//! serializer can consume struct values without knowing their schema.

pub mod emit;

pub use emit::{emit_tokens, TokenStream};

use crate::error::{Error, Result};
use crate::types::Kind;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Null,
    Bool,
    I32,
    I64,
    F32,
    F64,
    Str,
    Blob,
    BeginSequence,
    EndSequence,
    BeginDictionary,
    EndDictionary,
}

impl TokenKind {
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Null => "null",
            TokenKind::Bool => "bool",
            TokenKind::I32 => "i32",
            TokenKind::I64 => "i64",
            TokenKind::F32 => "f32",
            TokenKind::F64 => "f64",
            TokenKind::Str => "str",
            TokenKind::Blob => "blob",
            TokenKind::BeginSequence => "begin sequence",
            TokenKind::EndSequence => "end sequence",
            TokenKind::BeginDictionary => "begin dictionary",
            TokenKind::EndDictionary => "end dictionary",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Blob(Vec<u8>),
    BeginSequence,
    EndSequence,
    BeginDictionary,
    EndDictionary,
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Null => TokenKind::Null,
            Token::Bool(_) => TokenKind::Bool,
            Token::I32(_) => TokenKind::I32,
            Token::I64(_) => TokenKind::I64,
            Token::F32(_) => TokenKind::F32,
            Token::F64(_) => TokenKind::F64,
            Token::Str(_) => TokenKind::Str,
            Token::Blob(_) => TokenKind::Blob,
            Token::BeginSequence => TokenKind::BeginSequence,
            Token::EndSequence => TokenKind::EndSequence,
            Token::BeginDictionary => TokenKind::BeginDictionary,
            Token::EndDictionary => TokenKind::EndDictionary,
        }
    }

    /// Primitive token of a stored value of `kind`.
    pub(crate) fn from_stored(kind: Kind, stored: Value) -> Result<Token> {
        match (kind, stored) {
            (Kind::Bool, Value::Bool(v)) => Ok(Token::Bool(v)),
            (Kind::I32, Value::I32(v)) => Ok(Token::I32(v)),
            (Kind::I64, Value::I64(v)) => Ok(Token::I64(v)),
            (Kind::F32, Value::F32(v)) => Ok(Token::F32(v)),
            (Kind::F64, Value::F64(v)) => Ok(Token::F64(v)),
            (Kind::Str, Value::Str(v)) => Ok(Token::Str(v)),
            (Kind::Blob, Value::Blob(v)) => Ok(Token::Blob(v)),
            (kind, other) => Err(Error::type_mismatch(kind.name(), other.type_name())),
        }
    }

    /// Re-express this token as `to`.
    ///
    /// Numbers convert between each other when the value fits exactly,
    /// primitives render to strings and strings parse back. Brackets and
    /// `Null` only coerce to themselves.
    pub fn coerce(self, to: TokenKind) -> Result<Token> {
        let from = self.kind();
        if from == to {
            return Ok(self);
        }
        let coerced = match (&self, to) {
            (Token::I32(v), TokenKind::I64) => Some(Token::I64(i64::from(*v))),
            (Token::I32(v), TokenKind::F64) => Some(Token::F64(f64::from(*v))),
            (Token::I32(v), TokenKind::F32) => float_to_f32(f64::from(*v)),
            (Token::I64(v), TokenKind::I32) => i32::try_from(*v).ok().map(Token::I32),
            (Token::I64(v), TokenKind::F64) => int_to_f64(*v),
            (Token::I64(v), TokenKind::F32) => int_to_f64(*v).and_then(|t| t.coerce(TokenKind::F32).ok()),
            (Token::F32(v), TokenKind::F64) => Some(Token::F64(f64::from(*v))),
            (Token::F32(v), TokenKind::I32 | TokenKind::I64) => float_to_int(f64::from(*v), to),
            (Token::F64(v), TokenKind::F32) => float_to_f32(*v),
            (Token::F64(v), TokenKind::I32 | TokenKind::I64) => float_to_int(*v, to),
            (Token::Bool(v), TokenKind::Str) => Some(Token::Str(v.to_string())),
            (Token::I32(v), TokenKind::Str) => Some(Token::Str(v.to_string())),
            (Token::I64(v), TokenKind::Str) => Some(Token::Str(v.to_string())),
            (Token::F32(v), TokenKind::Str) => Some(Token::Str(v.to_string())),
            (Token::F64(v), TokenKind::Str) => Some(Token::Str(v.to_string())),
            (Token::Blob(v), TokenKind::Str) => String::from_utf8(v.clone()).ok().map(Token::Str),
            (Token::Str(s), TokenKind::Bool) => s.parse().ok().map(Token::Bool),
            (Token::Str(s), TokenKind::I32) => s.parse().ok().map(Token::I32),
            (Token::Str(s), TokenKind::I64) => s.parse().ok().map(Token::I64),
            (Token::Str(s), TokenKind::F32) => s.parse().ok().map(Token::F32),
            (Token::Str(s), TokenKind::F64) => s.parse().ok().map(Token::F64),
            (Token::Str(s), TokenKind::Blob) => Some(Token::Blob(s.clone().into_bytes())),
            _ => None,
        };
        coerced.ok_or_else(|| Error::Coercion {
            from: from.name().to_string(),
            to: to.name().to_string(),
        })
    }
}

fn int_to_f64(v: i64) -> Option<Token> {
    let f = v as f64;
    (f as i64 == v).then_some(Token::F64(f))
}

fn float_to_f32(v: f64) -> Option<Token> {
    let f = v as f32;
    (f64::from(f) == v || v.is_nan()).then_some(Token::F32(f))
}

fn float_to_int(v: f64, to: TokenKind) -> Option<Token> {
    if v.fract() != 0.0 || !v.is_finite() {
        return None;
    }
    match to {
        TokenKind::I32 if v >= f64::from(i32::MIN) && v <= f64::from(i32::MAX) => Some(Token::I32(v as i32)),
        TokenKind::I64 if v >= i64::MIN as f64 && v < i64::MAX as f64 => Some(Token::I64(v as i64)),
        _ => None,
    }
}
