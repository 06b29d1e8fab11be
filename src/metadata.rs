use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Identity of one workflow execution, immutable for its lifetime.
///
/// `disabled_releases` is the feature-gate set behind `has_release`: a
/// release name absent from the set is considered live, so workflow code can
/// branch on versioning without re-deciding differently across replays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub domain: String,
    pub workflow_id: String,
    pub run_id: String,
    pub workflow_name: String,
    pub headers: HashMap<String, String>,
    pub disabled_releases: HashSet<String>,
}

/// Per-invocation activity metadata, passed by value across the activity
/// execution boundary and never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityMetadata {
    pub domain: String,
    pub activity_id: String,
    pub name: String,
    /// Lease token from the orchestration service; `None` for local
    /// invocations, which have no remote round trip to lease.
    pub task_token: Option<String>,
    pub attempt: u32,
    pub workflow_id: String,
    pub workflow_run_id: String,
    pub workflow_name: Option<String>,
    pub headers: HashMap<String, String>,
    pub timeouts: Timeouts,
}

/// Activity timeout set, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    pub start_to_close_s: u64,
    pub schedule_to_close_s: u64,
    pub heartbeat_s: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            start_to_close_s: 30,
            schedule_to_close_s: 60,
            heartbeat_s: 5,
        }
    }
}
