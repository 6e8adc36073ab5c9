//! Authorisation lookup interface consulted by handlers and middleware.
//!
//! Requests name an IAM lookup service through `resources.iamLookup.url`.
//! Handlers talk to it through the [`IamLookup`] trait so tests and local
//! runs can substitute [`StaticIamLookup`].

use std::collections::{HashMap, HashSet};

use thiserror::Error;

/// Errors raised by an authorisation lookup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IamLookupError {
    /// The lookup service could not be reached or answered with an error.
    #[error("IAM lookup at '{url}' failed: {message}")]
    Unavailable {
        /// Service URL.
        url: String,
        /// Error text.
        message: String,
    },
    /// The lookup service knows nothing about the subject.
    #[error("unknown {subject_kind} '{subject}'")]
    UnknownSubject {
        /// `user` or `app`.
        subject_kind: &'static str,
        /// The identifier that was looked up.
        subject: String,
    },
}

/// Synchronous client for the authorisation lookup service.
pub trait IamLookup: Send + Sync {
    /// Returns `true` when `user` holds `role` on every one of
    /// `resource_ids`.
    ///
    /// # Errors
    ///
    /// Returns an [`IamLookupError`] when the lookup itself fails.
    fn user_has_role(
        &self,
        user: &str,
        role: &str,
        resource_ids: &[&str],
    ) -> Result<bool, IamLookupError>;

    /// Lists the groups `user` belongs to.
    ///
    /// # Errors
    ///
    /// Returns an [`IamLookupError`] when the lookup fails.
    fn list_user_groups(&self, user: &str) -> Result<Vec<String>, IamLookupError>;

    /// Lists the projects owned by application `app_id`.
    ///
    /// # Errors
    ///
    /// Returns an [`IamLookupError`] when the lookup fails.
    fn list_projects_for_app(&self, app_id: &str) -> Result<Vec<String>, IamLookupError>;
}

/// In-memory [`IamLookup`] backed by fixed grants.
#[derive(Debug, Clone, Default)]
pub struct StaticIamLookup {
    grants: HashMap<(String, String), HashSet<String>>,
    groups: HashMap<String, Vec<String>>,
    app_projects: HashMap<String, Vec<String>>,
}

impl StaticIamLookup {
    /// Creates a lookup with no grants.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `role` to `user` on `resource`.
    #[must_use]
    pub fn with_role(mut self, user: &str, resource: &str, role: &str) -> Self {
        self.grants
            .entry((user.to_owned(), resource.to_owned()))
            .or_default()
            .insert(role.to_owned());
        self
    }

    /// Adds `user` to `group`.
    #[must_use]
    pub fn with_group(mut self, user: &str, group: &str) -> Self {
        self.groups
            .entry(user.to_owned())
            .or_default()
            .push(group.to_owned());
        self
    }

    /// Records that application `app_id` owns `project`.
    #[must_use]
    pub fn with_app_project(mut self, app_id: &str, project: &str) -> Self {
        self.app_projects
            .entry(app_id.to_owned())
            .or_default()
            .push(project.to_owned());
        self
    }
}

impl IamLookup for StaticIamLookup {
    fn user_has_role(
        &self,
        user: &str,
        role: &str,
        resource_ids: &[&str],
    ) -> Result<bool, IamLookupError> {
        if resource_ids.is_empty() {
            return Ok(false);
        }
        Ok(resource_ids.iter().all(|resource| {
            self.grants
                .get(&(user.to_owned(), (*resource).to_owned()))
                .is_some_and(|roles| roles.contains(role))
        }))
    }

    fn list_user_groups(&self, user: &str) -> Result<Vec<String>, IamLookupError> {
        Ok(self.groups.get(user).cloned().unwrap_or_default())
    }

    fn list_projects_for_app(&self, app_id: &str) -> Result<Vec<String>, IamLookupError> {
        self.app_projects
            .get(app_id)
            .cloned()
            .ok_or_else(|| IamLookupError::UnknownSubject {
                subject_kind: "app",
                subject: app_id.to_owned(),
            })
    }
}
