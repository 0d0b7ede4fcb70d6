use crate::error::{Error, Result};
use crate::melt::flatten::stored_values;
use crate::schema::FieldRef;
use crate::tokens::{Token, TokenKind};
use crate::types::{DataType, SimpleType};
use crate::value::Value;
use std::vec;

/// Lazily emit the tokens of `value` read as `ty`.
///
/// Nothing is stored or traversed until the consumer pulls; declined values
/// (see [`TokenStream::skip_value`]) are never converted at all.
pub fn emit_tokens(ty: DataType, value: Value) -> TokenStream {
    TokenStream {
        stack: vec![Pending::Value(ty, value)],
        head: None,
        failed: false,
    }
}

/// Work left on the traversal stack.
enum Pending {
    Value(DataType, Value),
    Elements { element: DataType, items: vec::IntoIter<Value> },
    Entries(vec::IntoIter<(FieldRef, Value)>),
}

/// The next token, resolved just far enough to know its kind.
enum Head {
    Ready(Token),
    Simple(SimpleType, Value),
    Sequence { element: DataType, items: Vec<Value> },
    Dictionary(Vec<(FieldRef, Value)>),
}

impl Head {
    fn kind(&self) -> TokenKind {
        match self {
            Head::Ready(token) => token.kind(),
            Head::Simple(simple, _) if simple.has_string_representation() => TokenKind::Str,
            Head::Simple(simple, _) => simple.kind().token_kind(),
            Head::Sequence { .. } => TokenKind::BeginSequence,
            Head::Dictionary(_) => TokenKind::BeginDictionary,
        }
    }
}

pub struct TokenStream {
    stack: Vec<Pending>,
    head: Option<Head>,
    failed: bool,
}

impl TokenStream {
    /// Kind of the next token, `None` once the stream is exhausted.
    pub fn peek_kind(&mut self) -> Result<Option<TokenKind>> {
        if !self.guard(|s| s.fill_head())? {
            return Ok(None);
        }
        Ok(self.head.as_ref().map(Head::kind))
    }

    /// Next token, converted to `kind` when one is given.
    pub fn next_coerced(&mut self, kind: Option<TokenKind>) -> Result<Option<Token>> {
        self.guard(|s| {
            if !s.fill_head()? {
                return Ok(None);
            }
            let Some(head) = s.head.take() else {
                return Ok(None);
            };
            let token = s.open(head)?;
            match kind {
                Some(kind) => token.coerce(kind).map(Some),
                None => Ok(Some(token)),
            }
        })
    }

    /// Drop the next value without storing it.
    ///
    /// A sequence or dictionary is dropped whole. Returns false when the next
    /// token closes a bracket or the stream is exhausted; nothing is consumed
    /// in that case.
    pub fn skip_value(&mut self) -> Result<bool> {
        self.guard(|s| {
            if !s.fill_head()? {
                return Ok(false);
            }
            let closing = matches!(
                s.head,
                Some(Head::Ready(Token::EndSequence)) | Some(Head::Ready(Token::EndDictionary))
            );
            if !closing {
                s.head = None;
            }
            Ok(!closing)
        })
    }

    fn guard<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.failed {
            return Err(Error::Convert("token stream already failed".to_string()));
        }
        let result = f(self);
        if result.is_err() {
            self.failed = true;
            self.stack.clear();
            self.head = None;
        }
        result
    }

    /// Resolve the head from the stack. Returns false when nothing is left.
    fn fill_head(&mut self) -> Result<bool> {
        while self.head.is_none() {
            let Some(pending) = self.stack.pop() else {
                return Ok(false);
            };
            match pending {
                Pending::Value(ty, value) => self.head = self.resolve(ty, value)?,
                Pending::Elements { element, mut items } => match items.next() {
                    Some(item) => {
                        let ty = element.clone();
                        self.stack.push(Pending::Elements { element, items });
                        self.stack.push(Pending::Value(ty, item));
                    }
                    None => self.head = Some(Head::Ready(Token::EndSequence)),
                },
                Pending::Entries(mut entries) => match entries.next() {
                    Some((field, value)) => {
                        let name = field.name().to_string();
                        self.stack.push(Pending::Entries(entries));
                        self.stack.push(Pending::Value(field.ty().clone(), value));
                        self.head = Some(Head::Ready(Token::Str(name)));
                    }
                    None => self.head = Some(Head::Ready(Token::EndDictionary)),
                },
            }
        }
        Ok(true)
    }

    fn resolve(&mut self, ty: DataType, value: Value) -> Result<Option<Head>> {
        match ty {
            DataType::Nullable(nullable) => {
                if value.is_null() {
                    return Ok(Some(Head::Ready(Token::Null)));
                }
                self.stack.push(Pending::Value(nullable.inner().clone(), value));
                Ok(None)
            }
            DataType::Simple(simple) => Ok(Some(Head::Simple(simple, value))),
            DataType::Collect(collect) => {
                let items = collect.store(value)?;
                Ok(Some(Head::Sequence {
                    element: collect.element().clone(),
                    items,
                }))
            }
            DataType::Partial(partial) => {
                let schema = partial.schema().clone();
                let fields = partial.fields(&value)?;
                let values = stored_values(schema.name(), fields, partial.store(value)?)?;
                let mut entries = Vec::with_capacity(values.len());
                for (ordinal, value) in fields.iter().zip(values) {
                    let field = schema.field_at(ordinal).ok_or_else(|| Error::UnknownField {
                        schema: schema.name().to_string(),
                        field: format!("#{ordinal}"),
                    })?;
                    entries.push((field.clone(), value));
                }
                Ok(Some(Head::Dictionary(entries)))
            }
        }
    }

    /// Turn the head into its token, scheduling any children.
    fn open(&mut self, head: Head) -> Result<Token> {
        match head {
            Head::Ready(token) => Ok(token),
            Head::Simple(simple, value) => {
                let token = Token::from_stored(simple.kind(), simple.store(value)?)?;
                if simple.has_string_representation() {
                    token.coerce(TokenKind::Str)
                } else {
                    Ok(token)
                }
            }
            Head::Sequence { element, items } => {
                self.stack.push(Pending::Elements {
                    element,
                    items: items.into_iter(),
                });
                Ok(Token::BeginSequence)
            }
            Head::Dictionary(entries) => {
                self.stack.push(Pending::Entries(entries.into_iter()));
                Ok(Token::BeginDictionary)
            }
        }
    }
}

impl Iterator for TokenStream {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.next_coerced(None).transpose()
    }
}

impl std::iter::FusedIterator for TokenStream {}
