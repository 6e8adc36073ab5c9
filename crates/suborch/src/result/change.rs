//! Items recorded in a result's change lists.

use std::fmt;
use std::sync::Arc;

/// A single planned or applied change.
///
/// Items are either plain text or any value that renders itself through
/// [`fmt::Display`], such as a typed resource description.
#[derive(Clone)]
pub enum Change {
    /// A preformatted description.
    Text(String),
    /// A value rendered lazily when the output is built.
    Object(Arc<dyn fmt::Display + Send + Sync>),
}

impl Change {
    /// Wraps a displayable value.
    pub fn object<T>(value: T) -> Self
    where
        T: fmt::Display + Send + Sync + 'static,
    {
        Self::Object(Arc::new(value))
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Object(value) => value.fmt(f),
        }
    }
}

impl fmt::Debug for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Object(value) => f
                .debug_tuple("Object")
                .field(&value.to_string())
                .finish(),
        }
    }
}

impl PartialEq for Change {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl From<&str> for Change {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Change {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for Change {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

/// Anything that can be appended to a change list: one item or a sequence.
pub trait IntoChanges {
    /// Converts `self` into the items to append, preserving order.
    fn into_changes(self) -> Vec<Change>;
}

impl IntoChanges for Change {
    fn into_changes(self) -> Vec<Change> {
        vec![self]
    }
}

impl IntoChanges for &str {
    fn into_changes(self) -> Vec<Change> {
        vec![Change::from(self)]
    }
}

impl IntoChanges for String {
    fn into_changes(self) -> Vec<Change> {
        vec![Change::from(self)]
    }
}

impl IntoChanges for &String {
    fn into_changes(self) -> Vec<Change> {
        vec![Change::from(self)]
    }
}

impl<T: Into<Change>> IntoChanges for Vec<T> {
    fn into_changes(self) -> Vec<Change> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<Change>, const N: usize> IntoChanges for [T; N] {
    fn into_changes(self) -> Vec<Change> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<Change> + Clone> IntoChanges for &[T] {
    fn into_changes(self) -> Vec<Change> {
        self.iter().cloned().map(Into::into).collect()
    }
}
