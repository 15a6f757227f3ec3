//! Shared object identity

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Globally unique name of one replicated object's log stream.
///
/// Two ids are interchangeable if and only if their names are equal, so
/// the type is usable as a map key. Cloning shares the underlying string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogObjectId(Arc<str>);

impl LogObjectId {
    /// Creates an id from an object name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty name.
    pub fn new(name: &str) -> Result<LogObjectId> {
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "shared object name must not be empty".to_string(),
            ));
        }
        Ok(LogObjectId(Arc::from(name)))
    }

    /// The object name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
