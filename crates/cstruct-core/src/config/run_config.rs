//! Run tracking and filtering.

use serde::{Deserialize, Serialize};

use crate::types::{RunId, RunInfo};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RunConfig {
    /// Record a run row and stamp facts with it. Default: true.
    pub track: Option<bool>,
    /// Existing run id handed down to analysis processes by the build driver.
    pub id: Option<i64>,
    /// Glob on struct names; facts about other structs are skipped.
    pub filter: Option<String>,
    pub version: Option<String>,
    pub sha: Option<String>,
    pub skip: Option<bool>,
}

impl RunConfig {
    pub fn effective_track(&self) -> bool {
        self.track.unwrap_or(true)
    }

    pub fn run_id(&self) -> Option<RunId> {
        if self.effective_track() {
            self.id.map(RunId)
        } else {
            None
        }
    }

    /// Attributes for a new run row.
    pub fn run_info(&self) -> RunInfo {
        RunInfo {
            version: self.version.clone(),
            sha: self.sha.clone(),
            filter: self.filter.clone(),
            skip: self.skip.unwrap_or(false),
        }
    }
}
