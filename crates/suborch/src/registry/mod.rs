//! Handler registry keyed by manifest header.
//!
//! The [`HandlerRegistry`] keeps handlers in registration order and indexes
//! them by `(apiVersion, kind)`. Lookup is first-match-wins: when two handlers
//! are registered for the same header through [`HandlerRegistry::register`],
//! the earlier one keeps serving requests and a warning is logged. Use
//! [`HandlerRegistry::register_unique`] to reject duplicates instead.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tracing::warn;

use crate::handler::ManifestHandler;
use crate::protocol::ManifestHeader;

const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// Errors raised while registering handlers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The handler reported an empty `apiVersion` or `kind`.
    #[error("handler header is incomplete: apiVersion '{api_version}', kind '{kind}'")]
    IncompleteHeader {
        /// Reported `apiVersion`.
        api_version: String,
        /// Reported `kind`.
        kind: String,
    },
    /// A handler is already registered for the header.
    #[error("a handler for apiVersion '{}' and kind '{}' is already registered", .header.api_version, .header.kind)]
    Duplicate {
        /// The contested header.
        header: ManifestHeader,
    },
}

/// Ordered collection of manifest handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn ManifestHandler>>,
    index: HashMap<ManifestHeader, usize>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("headers", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler. A duplicate header is kept but never matched.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::IncompleteHeader`] when the handler reports an
    /// empty `apiVersion` or `kind`.
    pub fn register(
        &mut self,
        handler: impl ManifestHandler + 'static,
    ) -> Result<(), RegistryError> {
        let header = validated_header(&handler)?;
        if self.index.contains_key(&header) {
            warn!(
                target: REGISTRY_TARGET,
                api_version = %header.api_version,
                kind = %header.kind,
                "duplicate handler registered; the first registration wins"
            );
        } else {
            self.index.insert(header, self.handlers.len());
        }
        self.handlers.push(Box::new(handler));
        Ok(())
    }

    /// Registers a handler, rejecting duplicate headers.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when the header is taken and
    /// [`RegistryError::IncompleteHeader`] when it is empty.
    pub fn register_unique(
        &mut self,
        handler: impl ManifestHandler + 'static,
    ) -> Result<(), RegistryError> {
        let header = validated_header(&handler)?;
        if self.index.contains_key(&header) {
            return Err(RegistryError::Duplicate { header });
        }
        self.register(handler)
    }

    /// Returns the handler serving `header`.
    #[must_use]
    pub fn find(&self, header: &ManifestHeader) -> Option<&dyn ManifestHandler> {
        let position = *self.index.get(header)?;
        self.handlers.get(position).map(|handler| &**handler)
    }

    /// Distinct registered headers in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &ManifestHeader> {
        let mut served: Vec<(&ManifestHeader, usize)> =
            self.index.iter().map(|(header, pos)| (header, *pos)).collect();
        served.sort_by_key(|(_, pos)| *pos);
        served.into_iter().map(|(header, _)| header)
    }

    /// Builds the user-facing message for a header with no handler.
    #[must_use]
    pub fn unmatched_message(&self, header: &ManifestHeader) -> String {
        let mut message = format!(
            "The manifest apiVersion '{}' and kind '{}' is not valid.",
            header.api_version, header.kind
        );
        if self.is_empty() {
            message.push_str(" No manifest handlers are registered.");
            return message;
        }
        message.push_str(
            " Perhaps you intended to use one of the following value combinations instead:",
        );
        for known in self.keys() {
            message.push_str("\n\n");
            message.push_str(&known.to_string());
        }
        message
    }

    /// Number of registered handlers, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` when no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

fn validated_header(handler: &dyn ManifestHandler) -> Result<ManifestHeader, RegistryError> {
    let header = handler.header();
    if header.api_version.trim().is_empty() || header.kind.trim().is_empty() {
        return Err(RegistryError::IncompleteHeader {
            api_version: header.api_version,
            kind: header.kind,
        });
    }
    Ok(header)
}
