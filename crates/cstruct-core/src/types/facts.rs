//! The four fact records an analysis process emits.
//!
//! Owners are referenced by natural key ([`StructRef`], member name), never
//! by store id: a staging store and the corpus assign different ids to the
//! same declaration.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::location::{Position, Span};
use crate::constants::{ANONYMOUS, ATTR_SEPARATOR, UNNAMED};

/// `struct` or `union`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructKind {
    Struct,
    Union,
}

impl StructKind {
    /// One-letter tag stored in `struct.type`.
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Struct => "s",
            Self::Union => "u",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "s" => Some(Self::Struct),
            "u" => Some(Self::Union),
            _ => None,
        }
    }
}

/// Direction of a member access.
///
/// Stored as a nullable integer: 1 read, 0 write, NULL when the direction
/// cannot be determined (e.g. the address escapes into a call).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Read,
    Write,
    Unknown,
}

impl Access {
    pub fn as_load(self) -> Option<i64> {
        match self {
            Self::Read => Some(1),
            Self::Write => Some(0),
            Self::Unknown => None,
        }
    }

    pub fn from_load(load: Option<i64>) -> Self {
        match load {
            Some(0) => Self::Write,
            Some(_) => Self::Read,
            None => Self::Unknown,
        }
    }
}

/// A source file, already canonicalized by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceFact {
    pub path: String,
}

/// A struct or union declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructFact {
    pub name: String,
    pub kind: StructKind,
    pub attrs: Vec<String>,
    pub packed: bool,
    pub in_macro: bool,
    pub source: String,
    pub span: Span,
}

impl StructFact {
    /// Attributes joined the way they are stored.
    pub fn attr_string(&self) -> Option<String> {
        if self.attrs.is_empty() {
            None
        } else {
            Some(self.attrs.join(ATTR_SEPARATOR))
        }
    }

    /// Natural key other facts use to point at this declaration.
    pub fn key(&self) -> StructRef {
        StructRef {
            name: self.name.clone(),
            source: self.source.clone(),
            begin: self.span.begin,
        }
    }
}

/// Natural key of a struct declaration: name, file, and start position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructRef {
    pub name: String,
    pub source: String,
    pub begin: Position,
}

impl StructRef {
    /// Structs the unused listing skips.
    pub fn is_sentinel(&self) -> bool {
        self.name == ANONYMOUS || self.name == UNNAMED
    }
}

impl fmt::Display for StructRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.name, self.source, self.begin)
    }
}

/// A field of a struct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberFact {
    pub name: String,
    pub owner: StructRef,
    pub span: Span,
}

/// One place where a member is referenced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UseFact {
    pub owner: StructRef,
    pub member: String,
    pub source: String,
    pub span: Span,
    pub access: Access,
    /// Synthesized by the compiler, e.g. a field zeroed by a missing
    /// initializer.
    pub implicit: bool,
}

/// Discriminant of [`Fact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactKind {
    Source,
    Struct,
    Member,
    Use,
}

impl FactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Struct => "struct",
            Self::Member => "member",
            Self::Use => "use",
        }
    }
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Fact {
    Source(SourceFact),
    Struct(StructFact),
    Member(MemberFact),
    Use(UseFact),
}

impl Fact {
    pub fn kind(&self) -> FactKind {
        match self {
            Self::Source(_) => FactKind::Source,
            Self::Struct(_) => FactKind::Struct,
            Self::Member(_) => FactKind::Member,
            Self::Use(_) => FactKind::Use,
        }
    }

    /// Name of the struct this fact is about, if any.
    pub fn struct_name(&self) -> Option<&str> {
        match self {
            Self::Source(_) => None,
            Self::Struct(s) => Some(&s.name),
            Self::Member(m) => Some(&m.owner.name),
            Self::Use(u) => Some(&u.owner.name),
        }
    }
}

impl From<SourceFact> for Fact {
    fn from(f: SourceFact) -> Self {
        Self::Source(f)
    }
}

impl From<StructFact> for Fact {
    fn from(f: StructFact) -> Self {
        Self::Struct(f)
    }
}

impl From<MemberFact> for Fact {
    fn from(f: MemberFact) -> Self {
        Self::Member(f)
    }
}

impl From<UseFact> for Fact {
    fn from(f: UseFact) -> Self {
        Self::Use(f)
    }
}
