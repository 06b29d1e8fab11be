use std::collections::HashMap;

use crate::metadata::Timeouts;

/// Caller-supplied overrides for one activity invocation.
///
/// Every field has a documented default: `activity_id` falls back to the
/// assigned event id, `domain` to the execution's domain, `headers` start
/// from the execution's header map, and `timeouts` to [`Timeouts::default`].
#[derive(Debug, Clone, Default)]
pub struct ActivityOptions {
    pub activity_id: Option<String>,
    pub domain: Option<String>,
    pub headers: HashMap<String, String>,
    pub timeouts: Option<Timeouts>,
}

impl ActivityOptions {
    pub fn with_activity_id(mut self, id: impl Into<String>) -> Self {
        self.activity_id = Some(id.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }
}
