//! Read and bookkeeping queries, as free functions over a `Connection`.

pub mod counts;
pub mod runs;
pub mod views;

pub use counts::{fact_counts, FactCounts};
pub use runs::RunRow;
pub use views::{
    MemberRow, Page, StructMemberRow, StructRow, UnusedRow, UseFilter, UseRow, ViewFilter,
};
