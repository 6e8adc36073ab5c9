//! Errors raised while dispatching a request through the pipeline.
//!
//! Two families end up in a result's error list. [`DispatchError`] covers
//! failures that abort the remaining pipeline stages: a manifest whose header
//! cannot be read, an unrecognised action, or a hook or action returning an
//! error. [`DefectError`] covers misuse of the result ledger by handler code,
//! such as finalizing twice or never finalizing at all; those are recorded
//! rather than panicking so they surface in logs and force the `error` code.

use std::fmt;

use thiserror::Error;

/// Error type returned by manifest handlers and middleware hooks.
///
/// Boxed so handler authors can propagate any error with `?`.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a single handler or middleware invocation.
pub type HandlerResult = Result<(), HandlerError>;

/// Identifies the handler invocation an error belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerIdentity {
    /// Manifest `apiVersion` the handler is registered for.
    pub api_version: String,
    /// Manifest `kind` the handler is registered for.
    pub kind: String,
    /// Action tag carried by the request.
    pub action: String,
}

impl HandlerIdentity {
    /// Creates an identity from its parts.
    #[must_use]
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            action: action.into(),
        }
    }
}

impl fmt::Display for HandlerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.api_version, self.kind, self.action)
    }
}

/// Errors that abort the remaining pipeline stages.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The `apiVersion`/`kind` projection of `manifest.new` could not be decoded.
    #[error("unable to decode manifest header: {source}")]
    MalformedManifest {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The request carried an action tag outside the supported set.
    #[error("invalid action '{action}'")]
    InvalidAction {
        /// The rejected action tag.
        action: String,
    },

    /// The orchestrator-level before hook returned an error.
    #[error("orchestrator middleware (before) for project '{project}': {source}")]
    OrchestratorBefore {
        /// Project of the orchestrator whose hook failed.
        project: String,
        /// Error returned by the hook.
        #[source]
        source: HandlerError,
    },

    /// The handler-level before hook returned an error.
    #[error("handler middleware (before) {identity}: {source}")]
    HandlerBefore {
        /// Handler whose hook failed.
        identity: HandlerIdentity,
        /// Error returned by the hook.
        #[source]
        source: HandlerError,
    },

    /// The handler's action returned an error.
    #[error("manifest handler {identity}: {source}")]
    Action {
        /// Handler whose action failed.
        identity: HandlerIdentity,
        /// Error returned by the action.
        #[source]
        source: HandlerError,
    },

    /// The handler-level after hook returned an error.
    #[error("handler middleware (after) {identity}: {source}")]
    HandlerAfter {
        /// Handler whose hook failed.
        identity: HandlerIdentity,
        /// Error returned by the hook.
        #[source]
        source: HandlerError,
    },

    /// The orchestrator-level after hook returned an error.
    #[error("orchestrator middleware (after) for project '{project}': {source}")]
    OrchestratorAfter {
        /// Project of the orchestrator whose hook failed.
        project: String,
        /// Error returned by the hook.
        #[source]
        source: HandlerError,
    },
}

impl DispatchError {
    /// Creates an invalid action error.
    pub fn invalid_action(action: impl Into<String>) -> Self {
        Self::InvalidAction {
            action: action.into(),
        }
    }

    /// Returns the pipeline stage that produced the error.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::MalformedManifest { .. } => "match",
            Self::InvalidAction { .. } | Self::Action { .. } => "action",
            Self::OrchestratorBefore { .. } => "orchestrator_before",
            Self::HandlerBefore { .. } => "handler_before",
            Self::HandlerAfter { .. } => "handler_after",
            Self::OrchestratorAfter { .. } => "orchestrator_after",
        }
    }
}

/// Which change list a mutation targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSection {
    /// Resources planned or being created.
    Create,
    /// Resources planned or being updated.
    Update,
    /// Resources planned or being deleted.
    Delete,
}

impl ChangeSection {
    /// Returns the lowercase section name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Misuse of the result ledger by handler or middleware code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DefectError {
    /// `succeed` or `fail` was called on a result that was already finalized.
    #[error("attempted to {attempted} an already finalized result")]
    AlreadyFinalized {
        /// The finalizer that was called a second time (`succeed` or `fail`).
        attempted: &'static str,
    },

    /// A change was added after the result was finalized.
    #[error("attempted to add a {section} change to an already finalized result")]
    MutationAfterLock {
        /// The list the change was meant for.
        section: ChangeSection,
    },

    /// The pipeline finished without any stage finalizing the result.
    #[error("result was never finalized by manifest handler {identity}; call succeed or fail exactly once")]
    UnfinalizedResult {
        /// Handler that was expected to finalize.
        identity: HandlerIdentity,
    },
}

/// Any error recorded on a result.
#[derive(Debug, Error)]
pub enum ResultError {
    /// The pipeline aborted.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// Handler code misused the ledger.
    #[error(transparent)]
    Defect(#[from] DefectError),
}

impl ResultError {
    /// Returns `true` for ledger misuse rather than an aborted pipeline.
    #[must_use]
    pub const fn is_defect(&self) -> bool {
        matches!(self, Self::Defect(_))
    }
}
