//! Per-request state shared between middleware and handlers.
//!
//! A fresh [`RequestContext`] is created for every pipeline run and dropped
//! when it finishes, so nothing here needs synchronisation.

use std::any::Any;
use std::collections::HashMap;

use crate::deadline::Deadline;

/// Typed key/value store for passing values between pipeline stages.
///
/// A before-hook can stash a value, for example the resolved IAM groups of
/// the sender, and the handler can read it back by key and type.
#[derive(Debug, Default)]
pub struct ContextCache {
    entries: HashMap<String, Box<dyn Any + Send>>,
}

impl ContextCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key` when it has type `T`.
    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries.get(key)?.downcast_ref::<T>()
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn set<T: Any + Send>(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), Box::new(value));
    }

    /// Removes and returns the value under `key` when it has type `T`.
    ///
    /// An entry of a different type is left in place.
    pub fn take<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.entries.get(key)?.is::<T>() {
            return None;
        }
        let boxed = self.entries.remove(key)?;
        boxed.downcast::<T>().ok().map(|value| *value)
    }

    /// Returns `true` when an entry exists under `key`, whatever its type.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// State handed to every hook and handler during one pipeline run.
#[derive(Debug, Default)]
pub struct RequestContext {
    cache: ContextCache,
    deadline: Deadline,
}

impl RequestContext {
    /// Creates a context bound to the invocation's deadline.
    #[must_use]
    pub fn new(deadline: Deadline) -> Self {
        Self {
            cache: ContextCache::new(),
            deadline,
        }
    }

    /// Shared per-request cache.
    #[must_use]
    pub const fn cache(&self) -> &ContextCache {
        &self.cache
    }

    /// Mutable access to the per-request cache.
    pub const fn cache_mut(&mut self) -> &mut ContextCache {
        &mut self.cache
    }

    /// Deadline of the current invocation.
    #[must_use]
    pub const fn deadline(&self) -> &Deadline {
        &self.deadline
    }
}
