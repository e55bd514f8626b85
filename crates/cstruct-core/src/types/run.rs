//! Analysis runs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier the corpus assigned to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub i64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attributes of one analysis session. The timestamp is assigned by the
/// store when the run row is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInfo {
    pub version: Option<String>,
    pub sha: Option<String>,
    pub filter: Option<String>,
    pub skip: bool,
}
