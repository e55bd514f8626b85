//! Wire format for facts sent to the filler.
//!
//! ```text
//! message := kind entry*
//! kind    := 'S' | 'T' | 'M' | 'U'
//! entry   := type klen:u16le key vlen:u16le value
//! type    := 'i' | 't' | 'n'
//! ```
//!
//! Integers travel as ASCII decimal; a null entry has an empty value. A
//! message with no entries (or no bytes at all) is a flush delimiter.
//!
//! Entry keys are the named parameters of the insert statements in
//! [`crate::statements`], so the same [`Message`] drives staging inserts
//! and the filler's inserts.

use std::borrow::Cow;

use cstruct_core::errors::TransportError;
use cstruct_core::types::{Fact, FactKind, Span};
use rusqlite::types::{Null, ToSql, ToSqlOutput};

const TAG_INT: u8 = b'i';
const TAG_TEXT: u8 = b't';
const TAG_NULL: u8 = b'n';

/// Kind tag byte for a fact kind.
pub fn kind_tag(kind: FactKind) -> u8 {
    match kind {
        FactKind::Source => b'S',
        FactKind::Struct => b'T',
        FactKind::Member => b'M',
        FactKind::Use => b'U',
    }
}

pub fn kind_from_tag(tag: u8) -> Option<FactKind> {
    match tag {
        b'S' => Some(FactKind::Source),
        b'T' => Some(FactKind::Struct),
        b'M' => Some(FactKind::Member),
        b'U' => Some(FactKind::Use),
        _ => None,
    }
}

/// A typed value, borrowed from the fact or datagram it came from, or owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value<'a> {
    Int(i64),
    Text(Cow<'a, str>),
    Null,
}

impl Value<'_> {
    pub fn into_owned(self) -> Value<'static> {
        match self {
            Value::Int(i) => Value::Int(i),
            Value::Text(t) => Value::Text(Cow::Owned(t.into_owned())),
            Value::Null => Value::Null,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(t) => Some(t),
            _ => None,
        }
    }
}

impl From<i64> for Value<'_> {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value<'_> {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<bool> for Value<'_> {
    fn from(v: bool) -> Self {
        Value::Int(i64::from(v))
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(v: &'a str) -> Self {
        Value::Text(Cow::Borrowed(v))
    }
}

impl From<String> for Value<'_> {
    fn from(v: String) -> Self {
        Value::Text(Cow::Owned(v))
    }
}

impl<'a, T: Into<Value<'a>>> From<Option<T>> for Value<'a> {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl ToSql for Value<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Int(i) => ToSqlOutput::from(*i),
            Value::Text(t) => ToSqlOutput::from(t.as_ref()),
            Value::Null => ToSqlOutput::from(Null),
        })
    }
}

/// One key/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<'a> {
    pub key: Cow<'a, str>,
    pub value: Value<'a>,
}

/// A fact on the wire, or a flush delimiter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message<'a> {
    kind: Option<FactKind>,
    entries: Vec<Entry<'a>>,
}

impl<'a> Message<'a> {
    pub fn new(kind: FactKind) -> Self {
        Self {
            kind: Some(kind),
            entries: Vec::new(),
        }
    }

    /// The batch delimiter.
    pub fn flush() -> Message<'static> {
        Message::default()
    }

    pub fn with(mut self, key: &'a str, value: impl Into<Value<'a>>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<Cow<'a, str>>, value: impl Into<Value<'a>>) {
        self.entries.push(Entry {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn kind(&self) -> Option<FactKind> {
        self.kind
    }

    pub fn entries(&self) -> &[Entry<'a>] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&Value<'a>> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| &e.value)
    }

    pub fn is_flush(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_owned(self) -> Message<'static> {
        Message {
            kind: self.kind,
            entries: self
                .entries
                .into_iter()
                .map(|e| Entry {
                    key: Cow::Owned(e.key.into_owned()),
                    value: e.value.into_owned(),
                })
                .collect(),
        }
    }

    /// Build the insert parameters for a fact, borrowing its strings.
    pub fn from_fact(fact: &'a Fact) -> Self {
        match fact {
            Fact::Source(s) => Message::new(FactKind::Source).with("src", s.path.as_str()),
            Fact::Struct(s) => Message::new(FactKind::Struct)
                .with("type", s.kind.as_tag())
                .with("name", s.name.as_str())
                .with("attrs", s.attr_string())
                .with("packed", s.packed)
                .with("inMacro", s.in_macro)
                .with("src", s.source.as_str())
                .with_span(&s.span),
            Fact::Member(m) => Message::new(FactKind::Member)
                .with("name", m.name.as_str())
                .with("struct", m.owner.name.as_str())
                .with("src", m.owner.source.as_str())
                .with("strBegLine", m.owner.begin.line)
                .with("strBegCol", m.owner.begin.col)
                .with_span(&m.span),
            Fact::Use(u) => Message::new(FactKind::Use)
                .with("member", u.member.as_str())
                .with("struct", u.owner.name.as_str())
                .with("strSrc", u.owner.source.as_str())
                .with("strLine", u.owner.begin.line)
                .with("strCol", u.owner.begin.col)
                .with("use_src", u.source.as_str())
                .with("load", u.access.as_load())
                .with("implicit", u.implicit)
                .with_span(&u.span),
        }
    }

    fn with_span(self, span: &Span) -> Self {
        self.with("begLine", span.begin.line)
            .with("begCol", span.begin.col)
            .with("endLine", span.end.line)
            .with("endCol", span.end.col)
    }

    /// Serialize. A flush delimiter encodes to zero bytes.
    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        let Some(kind) = self.kind.filter(|_| !self.entries.is_empty()) else {
            return Ok(Vec::new());
        };

        let mut out = Vec::with_capacity(64);
        out.push(kind_tag(kind));
        for entry in &self.entries {
            let int_text;
            let (tag, payload): (u8, &[u8]) = match &entry.value {
                Value::Int(i) => {
                    int_text = i.to_string();
                    (TAG_INT, int_text.as_bytes())
                }
                Value::Text(t) => (TAG_TEXT, t.as_bytes()),
                Value::Null => (TAG_NULL, &[]),
            };
            out.push(tag);
            put_field(&mut out, entry.key.as_bytes())?;
            put_field(&mut out, payload)?;
        }
        Ok(out)
    }

    /// Parse a datagram, borrowing keys and text from `bytes`.
    pub fn decode(bytes: &'a [u8]) -> Result<Self, TransportError> {
        let Some((&tag, mut rest)) = bytes.split_first() else {
            return Ok(Message::default());
        };
        let kind = kind_from_tag(tag).ok_or_else(|| malformed(format!("unknown kind tag 0x{tag:02x}")))?;

        let mut message = Message::new(kind);
        while let Some((&type_tag, tail)) = rest.split_first() {
            let (key, tail) = take_field(tail)?;
            let (payload, tail) = take_field(tail)?;
            rest = tail;

            let key = std::str::from_utf8(key).map_err(|_| malformed("key is not UTF-8"))?;
            let value = match type_tag {
                TAG_INT => {
                    let text = std::str::from_utf8(payload).map_err(|_| malformed("int is not UTF-8"))?;
                    let parsed = text
                        .parse::<i64>()
                        .map_err(|_| malformed(format!("bad int `{text}` for {key}")))?;
                    Value::Int(parsed)
                }
                TAG_TEXT => Value::Text(Cow::Borrowed(
                    std::str::from_utf8(payload).map_err(|_| malformed("text is not UTF-8"))?,
                )),
                TAG_NULL if payload.is_empty() => Value::Null,
                TAG_NULL => return Err(malformed(format!("null {key} carries a payload"))),
                other => return Err(malformed(format!("unknown value tag 0x{other:02x}"))),
            };
            message.entries.push(Entry {
                key: Cow::Borrowed(key),
                value,
            });
        }
        Ok(message)
    }
}

fn put_field(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), TransportError> {
    let len = u16::try_from(bytes.len()).map_err(|_| TransportError::FieldTooLong { len: bytes.len() })?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn take_field(bytes: &[u8]) -> Result<(&[u8], &[u8]), TransportError> {
    if bytes.len() < 2 {
        return Err(malformed("truncated length prefix"));
    }
    let len = usize::from(u16::from_le_bytes([bytes[0], bytes[1]]));
    let rest = &bytes[2..];
    if rest.len() < len {
        return Err(malformed(format!("field of {len} bytes truncated to {}", rest.len())));
    }
    Ok(rest.split_at(len))
}

fn malformed(reason: impl Into<String>) -> TransportError {
    TransportError::Malformed {
        reason: reason.into(),
    }
}
