//! Failure capture and re-hydration across the execution boundary.
//!
//! A failure travels as a `(reason, details)` pair: `reason` is a stable
//! string identifier for the error kind, `details` the human-readable
//! payload. The receiving side rebuilds the original kind through a
//! registered factory map and degrades to the generic application kind when
//! the identifier is unknown there (cross-version or cross-language workers).

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metadata::WorkflowMetadata;

/// Reserved reason identifier for cancellation outcomes.
pub const CANCELED_REASON: &str = "canceled";
/// Reserved reason identifier for capabilities missing in an execution mode.
pub const NOT_SUPPORTED_REASON: &str = "not_supported";
/// Reserved reason identifier for programming misuse.
pub const MISUSE_REASON: &str = "misuse";

/// Transportable form of a captured failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub reason: String,
    pub details: String,
}

impl Failure {
    pub fn new(reason: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            details: details.into(),
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.reason, self.details)
    }
}

/// Terminal error taxonomy for workflow execution.
///
/// Cancellation is deliberately not an `Application` failure: consumers must
/// be able to tell "the operation failed" apart from "the operation was
/// canceled". `NotSupported` marks environment limitations rather than logic
/// bugs, and `Misuse` is fatal to the current attempt and never retried here.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum WorkflowError {
    /// Failure raised by user workflow or activity code.
    #[error("{reason}: {details}")]
    Application { reason: String, details: String },

    /// The operation was canceled before it completed.
    #[error("canceled: {details}")]
    Canceled { details: String },

    /// Capability not available in this execution mode.
    #[error("not yet available: {operation}")]
    NotSupported { operation: String },

    /// Programming misuse, fatal to the current execution attempt.
    #[error("workflow misuse: {message}")]
    Misuse { message: String },
}

impl WorkflowError {
    pub fn application(reason: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Application {
            reason: reason.into(),
            details: details.into(),
        }
    }

    pub fn misuse(message: impl Into<String>) -> Self {
        Self::Misuse {
            message: message.into(),
        }
    }

    pub fn not_supported(operation: impl Into<String>) -> Self {
        Self::NotSupported {
            operation: operation.into(),
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }
}

/// Capture an error into its transportable `(reason, details)` pair.
pub fn capture(error: &WorkflowError) -> Failure {
    match error {
        WorkflowError::Application { reason, details } => Failure::new(reason, details),
        WorkflowError::Canceled { details } => Failure::new(CANCELED_REASON, details),
        WorkflowError::NotSupported { operation } => Failure::new(NOT_SUPPORTED_REASON, operation),
        WorkflowError::Misuse { message } => Failure::new(MISUSE_REASON, message),
    }
}

/// Emit the structured failure event consumed by the telemetry sink.
///
/// Logged before the terminal report goes upward so diagnostic context
/// survives even if that report is lost downstream.
pub fn report(error: &WorkflowError, metadata: &WorkflowMetadata) {
    let failure = capture(error);
    tracing::error!(
        target: "cadent::failure",
        workflow_id = %metadata.workflow_id,
        run_id = %metadata.run_id,
        domain = %metadata.domain,
        workflow_name = %metadata.workflow_name,
        reason = %failure.reason,
        details = %failure.details,
        "workflow failure reported"
    );
}

type FailureFactory = Arc<dyn Fn(&str) -> WorkflowError + Send + Sync>;

/// Registered mapping from stable reason identifiers to error-kind factories.
///
/// `rehydrate` never errors: an unresolvable reason is an expected case, not
/// a fault, and falls back to the generic application kind carrying `details`
/// as the message.
#[derive(Clone, Default)]
pub struct FailureConverter {
    factories: Arc<HashMap<String, FailureFactory>>,
}

impl FailureConverter {
    pub fn builder() -> FailureConverterBuilder {
        FailureConverterBuilder {
            factories: HashMap::new(),
        }
    }

    pub fn rehydrate(&self, reason: &str, details: &str) -> WorkflowError {
        if let Some(factory) = self.factories.get(reason) {
            return factory(details);
        }
        match reason {
            CANCELED_REASON => WorkflowError::Canceled {
                details: details.to_string(),
            },
            NOT_SUPPORTED_REASON => WorkflowError::NotSupported {
                operation: details.to_string(),
            },
            MISUSE_REASON => WorkflowError::Misuse {
                message: details.to_string(),
            },
            other => WorkflowError::application(other, details),
        }
    }

    /// Convenience form taking the transportable pair directly.
    pub fn rehydrate_failure(&self, failure: &Failure) -> WorkflowError {
        self.rehydrate(&failure.reason, &failure.details)
    }
}

pub struct FailureConverterBuilder {
    factories: HashMap<String, FailureFactory>,
}

impl FailureConverterBuilder {
    /// Register a factory for a known reason identifier.
    pub fn register<F>(mut self, reason: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&str) -> WorkflowError + Send + Sync + 'static,
    {
        self.factories.insert(reason.into(), Arc::new(factory));
        self
    }

    pub fn build(self) -> FailureConverter {
        FailureConverter {
            factories: Arc::new(self.factories),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_rehydrate_round_trips_known_kinds() {
        let converter = FailureConverter::default();
        for error in [
            WorkflowError::application("quota_exceeded", "limit is 10"),
            WorkflowError::Canceled {
                details: "timer canceled".into(),
            },
            WorkflowError::not_supported("on_signal"),
            WorkflowError::misuse("duplicate id"),
        ] {
            let failure = capture(&error);
            assert_eq!(converter.rehydrate_failure(&failure), error);
        }
    }

    #[test]
    fn unknown_reason_falls_back_without_raising() {
        let converter = FailureConverter::default();
        let rebuilt = converter.rehydrate("Some::Unknown::Class", "boom");
        assert_eq!(
            rebuilt,
            WorkflowError::application("Some::Unknown::Class", "boom")
        );
    }

    #[test]
    fn registered_factory_wins_over_fallback() {
        let converter = FailureConverter::builder()
            .register("quota_exceeded", |details| {
                WorkflowError::application("quota_exceeded", format!("quota: {details}"))
            })
            .build();
        assert_eq!(
            converter.rehydrate("quota_exceeded", "limit is 10"),
            WorkflowError::application("quota_exceeded", "quota: limit is 10")
        );
    }
}
