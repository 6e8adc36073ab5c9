//! Response publishing and the publisher handle cache.
//!
//! Responses are published through a [`Publisher`] obtained from a
//! [`PublisherCache`]. The cache memoizes one handle per [`TopicName`] for the
//! lifetime of the owning entry point. Handle construction may touch the
//! network, so it happens outside the cache lock; when two callers race for
//! the same topic, both construct a handle but only the first insert is kept
//! and every caller receives the stored one.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::debug;

use crate::deadline::{Deadline, DeadlineError};

/// Tracing target for publishing.
pub(crate) const PUBLISH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::publish");

/// Errors raised while resolving topics or publishing responses.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The response topic could not be resolved to a project and name.
    #[error("invalid response topic '{topic}': {reason}")]
    InvalidTopic {
        /// The rejected topic string.
        topic: String,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// The invocation deadline passed before or during publishing.
    #[error("deadline exceeded before the response was published")]
    DeadlineExceeded,
    /// The host cancelled the invocation.
    #[error("publishing was cancelled")]
    Cancelled,
    /// A thread panicked while holding the cache lock.
    #[error("publisher cache lock poisoned")]
    CachePoisoned,
    /// A publisher handle could not be created.
    #[error("failed to create publisher for '{topic}': {message}")]
    Connect {
        /// Fully qualified topic path.
        topic: String,
        /// Transport error text.
        message: String,
    },
    /// The transport rejected the message.
    #[error("failed to publish to '{topic}': {message}")]
    Transport {
        /// Fully qualified topic path.
        topic: String,
        /// Transport error text.
        message: String,
    },
}

impl From<DeadlineError> for PublishError {
    fn from(error: DeadlineError) -> Self {
        match error {
            DeadlineError::Cancelled => Self::Cancelled,
            DeadlineError::Exceeded => Self::DeadlineExceeded,
        }
    }
}

/// A topic normalised to project and name.
///
/// Bare names and `projects/{project}/topics/{name}` paths that denote the
/// same topic compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicName {
    project: String,
    topic: String,
}

impl TopicName {
    /// Creates a topic name from its parts.
    #[must_use]
    pub fn new(project: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            topic: topic.into(),
        }
    }

    /// Resolves a response topic, qualifying bare names with
    /// `default_project`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::InvalidTopic`] for empty names, malformed
    /// paths, and bare names when no default project is configured.
    pub fn parse(raw: &str, default_project: &str) -> Result<Self, PublishError> {
        let invalid = |reason| PublishError::InvalidTopic {
            topic: raw.to_owned(),
            reason,
        };
        if raw.trim().is_empty() {
            return Err(invalid("topic name is empty"));
        }
        if raw.starts_with("projects/") {
            let parts: Vec<&str> = raw.split('/').collect();
            return match parts.as_slice() {
                ["projects", project, "topics", topic]
                    if !project.is_empty() && !topic.is_empty() =>
                {
                    Ok(Self::new(*project, *topic))
                }
                _ => Err(invalid("expected projects/{project}/topics/{name}")),
            };
        }
        if raw.contains('/') {
            return Err(invalid("bare topic names must not contain '/'"));
        }
        if default_project.is_empty() {
            return Err(invalid("no project is configured for bare topic names"));
        }
        Ok(Self::new(default_project, raw))
    }

    /// Project the topic belongs to.
    #[must_use]
    pub const fn project(&self) -> &str {
        self.project.as_str()
    }

    /// Short topic name.
    #[must_use]
    pub const fn topic(&self) -> &str {
        self.topic.as_str()
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projects/{}/topics/{}", self.project, self.topic)
    }
}

/// Acknowledgement returned by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishAck {
    message_id: String,
}

impl PublishAck {
    /// Wraps a transport-assigned message id.
    #[must_use]
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
        }
    }

    /// Transport-assigned message id.
    #[must_use]
    pub const fn message_id(&self) -> &str {
        self.message_id.as_str()
    }
}

/// Publishes payloads to one topic.
pub trait Publisher: Send + Sync {
    /// Publishes `payload`, honouring `deadline`.
    ///
    /// # Errors
    ///
    /// Returns a [`PublishError`] when the transport rejects the message or
    /// the deadline passes.
    fn publish(&self, payload: &[u8], deadline: &Deadline) -> Result<PublishAck, PublishError>;
}

/// Creates publishers for topics on demand.
pub trait PublisherFactory: Send + Sync {
    /// Creates a publisher bound to `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Connect`] when the transport is unreachable.
    fn create(&self, topic: &TopicName) -> Result<Arc<dyn Publisher>, PublishError>;
}

type HandleMap = HashMap<TopicName, Arc<dyn Publisher>>;

/// Lazily populated map of topic to publisher handle. Entries are never
/// evicted.
pub struct PublisherCache {
    factory: Box<dyn PublisherFactory>,
    handles: Mutex<HandleMap>,
}

impl fmt::Debug for PublisherCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublisherCache").finish_non_exhaustive()
    }
}

impl PublisherCache {
    /// Creates an empty cache backed by `factory`.
    #[must_use]
    pub fn new(factory: impl PublisherFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the handle for `topic`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::CachePoisoned`] when the lock is poisoned and
    /// the factory's error when a new handle cannot be created.
    pub fn get(&self, topic: &TopicName) -> Result<Arc<dyn Publisher>, PublishError> {
        if let Some(existing) = self.lock()?.get(topic) {
            return Ok(Arc::clone(existing));
        }

        debug!(target: PUBLISH_TARGET, %topic, "creating publisher");
        let created = self.factory.create(topic)?;

        let mut handles = self.lock()?;
        let stored = handles.entry(topic.clone()).or_insert(created);
        Ok(Arc::clone(stored))
    }

    /// Topics with a cached handle, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::CachePoisoned`] when the lock is poisoned.
    pub fn cached_topics(&self) -> Result<Vec<TopicName>, PublishError> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HandleMap>, PublishError> {
        self.handles.lock().map_err(|_| PublishError::CachePoisoned)
    }
}
