use serde::{Deserialize, Serialize};

/// The kind of asynchronous operation an event target refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    Activity,
    Timer,
    Signal,
    ChildWorkflow,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Activity => "activity",
            EventCategory::Timer => "timer",
            EventCategory::Signal => "signal",
            EventCategory::ChildWorkflow => "child_workflow",
        }
    }
}

/// Addressable identity of one asynchronous operation within a single
/// workflow execution.
///
/// Ids are assigned from the execution context's monotonic counter in the
/// exact order workflow code initiates operations; that order is the replay
/// alignment contract, so a target is immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventTarget {
    id: u64,
    category: EventCategory,
}

impl EventTarget {
    pub fn new(id: u64, category: EventCategory) -> Self {
        debug_assert!(id > 0, "event ids start at 1");
        Self { id, category }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn category(&self) -> EventCategory {
        self.category
    }
}

impl std::fmt::Display for EventTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.category.as_str(), self.id)
    }
}
