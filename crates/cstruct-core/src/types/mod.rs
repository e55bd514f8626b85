//! Fact records and their building blocks.

pub mod facts;
pub mod location;
pub mod run;

pub use facts::{Access, Fact, FactKind, MemberFact, SourceFact, StructFact, StructKind, StructRef, UseFact};
pub use location::{Position, Span};
pub use run::{RunId, RunInfo};
