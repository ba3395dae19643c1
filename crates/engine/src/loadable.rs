//! Tri-state wrapper for values that come from an asynchronous dependency.

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// A value that may not be available yet.
///
/// Consumers that depend on it (the running balance, the import projection)
/// must propagate `Pending` instead of assuming a default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Loadable<T> {
    Pending,
    Ready(T),
    Failed(String),
}

impl<T> Loadable<T> {
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Loadable::Ready(_))
    }

    #[must_use]
    pub fn as_ref(&self) -> Loadable<&T> {
        match self {
            Loadable::Pending => Loadable::Pending,
            Loadable::Ready(value) => Loadable::Ready(value),
            Loadable::Failed(reason) => Loadable::Failed(reason.clone()),
        }
    }

    /// Returns the value if ready.
    #[must_use]
    pub fn ready(self) -> Option<T> {
        match self {
            Loadable::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Loadable<U> {
        match self {
            Loadable::Pending => Loadable::Pending,
            Loadable::Ready(value) => Loadable::Ready(f(value)),
            Loadable::Failed(reason) => Loadable::Failed(reason),
        }
    }

    /// Unwraps a ready value or reports which dependency is missing.
    pub fn require(self, label: &str) -> ResultEngine<T> {
        match self {
            Loadable::Ready(value) => Ok(value),
            Loadable::Pending => Err(EngineError::PendingDependency(format!(
                "{label} is not loaded yet"
            ))),
            Loadable::Failed(reason) => Err(EngineError::PendingDependency(format!(
                "{label} failed to load: {reason}"
            ))),
        }
    }
}

impl<T> From<ResultEngine<T>> for Loadable<T> {
    fn from(value: ResultEngine<T>) -> Self {
        match value {
            Ok(value) => Loadable::Ready(value),
            Err(err) => Loadable::Failed(err.to_string()),
        }
    }
}
