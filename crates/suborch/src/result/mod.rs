//! The per-request result ledger.
//!
//! An [`ActionResult`] accumulates the changes a handler plans or applies and
//! is finalized exactly once with [`ActionResult::succeed`] or
//! [`ActionResult::fail`]. Finalization is a tagged state: once locked, every
//! further mutation is rejected and recorded as a [`DefectError`] instead of
//! altering the ledger. The wire-facing [`ResultCode`] and output text are
//! derived from that state by [`ActionResult::code`] and
//! [`ActionResult::output`].

mod change;

use serde::{Deserialize, Serialize};

pub use self::change::{Change, IntoChanges};
use crate::error::{ChangeSection, DefectError, ResultError};

/// Output sent for results carrying any error.
pub const INTERNAL_ERROR_OUTPUT: &str = "Internal error";

/// Output sent for successful results with no changes.
pub const NO_CHANGES_OUTPUT: &str = "No changes";

/// Wire-level outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultCode {
    /// Finalized successfully with at least one change.
    Success,
    /// Finalized with [`ActionResult::fail`].
    Failure,
    /// Finalized successfully with no changes.
    Noop,
    /// An error was recorded or the result was never finalized.
    Error,
}

impl ResultCode {
    /// Returns the lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Noop => "noop",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum Finalization {
    #[default]
    Open,
    Locked {
        success: bool,
        summary: String,
    },
}

/// Ledger of planned or applied changes for one request.
#[derive(Debug, Default)]
pub struct ActionResult {
    state: Finalization,
    creations: Vec<Change>,
    updates: Vec<Change>,
    deletions: Vec<Change>,
    errors: Vec<ResultError>,
}

impl ActionResult {
    /// Creates an open, empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends items to the create list.
    ///
    /// After finalization the items are discarded and a defect is recorded.
    pub fn create(&mut self, items: impl IntoChanges) {
        self.append(ChangeSection::Create, items);
    }

    /// Appends items to the update list.
    pub fn update(&mut self, items: impl IntoChanges) {
        self.append(ChangeSection::Update, items);
    }

    /// Appends items to the delete list.
    pub fn delete(&mut self, items: impl IntoChanges) {
        self.append(ChangeSection::Delete, items);
    }

    /// Locks the result as successful.
    ///
    /// Only the first finalization takes effect; later calls record a defect.
    pub fn succeed(&mut self, summary: impl Into<String>) {
        self.finalize(true, summary.into());
    }

    /// Locks the result as failed with a user-facing summary.
    pub fn fail(&mut self, summary: impl Into<String>) {
        self.finalize(false, summary.into());
    }

    /// Records an error against the result.
    pub fn push_error(&mut self, error: impl Into<ResultError>) {
        self.errors.push(error.into());
    }

    fn append(&mut self, section: ChangeSection, items: impl IntoChanges) {
        if self.is_locked() {
            self.push_error(DefectError::MutationAfterLock { section });
            return;
        }
        let list = match section {
            ChangeSection::Create => &mut self.creations,
            ChangeSection::Update => &mut self.updates,
            ChangeSection::Delete => &mut self.deletions,
        };
        list.extend(items.into_changes());
    }

    fn finalize(&mut self, success: bool, summary: String) {
        if self.is_locked() {
            let attempted = if success { "succeed" } else { "fail" };
            self.push_error(DefectError::AlreadyFinalized { attempted });
            return;
        }
        self.state = Finalization::Locked { success, summary };
    }

    /// Returns `true` once `succeed` or `fail` has been called.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        matches!(self.state, Finalization::Locked { .. })
    }

    /// Returns `true` when locked as successful.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.state, Finalization::Locked { success: true, .. })
    }

    /// Summary passed to the first finalization, if any.
    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        match &self.state {
            Finalization::Open => None,
            Finalization::Locked { summary, .. } => Some(summary.as_str()),
        }
    }

    /// Items recorded for creation.
    #[must_use]
    pub fn creations(&self) -> &[Change] {
        &self.creations
    }

    /// Items recorded for update.
    #[must_use]
    pub fn updates(&self) -> &[Change] {
        &self.updates
    }

    /// Items recorded for deletion.
    #[must_use]
    pub fn deletions(&self) -> &[Change] {
        &self.deletions
    }

    /// Errors recorded so far, in order.
    #[must_use]
    pub fn errors(&self) -> &[ResultError] {
        &self.errors
    }

    /// Returns `true` when no change list has entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creations.is_empty() && self.updates.is_empty() && self.deletions.is_empty()
    }

    /// Derives the wire-level outcome.
    #[must_use]
    pub fn code(&self) -> ResultCode {
        if !self.errors.is_empty() {
            return ResultCode::Error;
        }
        match &self.state {
            Finalization::Open => ResultCode::Error,
            Finalization::Locked { success: false, .. } => ResultCode::Failure,
            Finalization::Locked { success: true, .. } if self.is_empty() => ResultCode::Noop,
            Finalization::Locked { success: true, .. } => ResultCode::Success,
        }
    }

    /// Renders the user-facing output for the current code.
    #[must_use]
    pub fn output(&self) -> String {
        match self.code() {
            ResultCode::Error => INTERNAL_ERROR_OUTPUT.to_owned(),
            ResultCode::Noop => NO_CHANGES_OUTPUT.to_owned(),
            ResultCode::Failure => self.summary().unwrap_or_default().to_owned(),
            ResultCode::Success => self.render_changes(),
        }
    }

    fn render_changes(&self) -> String {
        let mut out = String::from(self.summary().unwrap_or_default());
        out.push('\n');
        let sections = [
            ("Create:", "+", &self.creations),
            ("Update:", "!", &self.updates),
            ("Delete:", "-", &self.deletions),
        ];
        for (heading, marker, items) in sections {
            if items.is_empty() {
                continue;
            }
            out.push_str(heading);
            out.push('\n');
            for item in items {
                out.push_str(marker);
                out.push(' ');
                out.push_str(&item.to_string());
                out.push('\n');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests;
