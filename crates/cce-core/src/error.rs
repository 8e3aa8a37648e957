//! Typed errors for caller-fault input shapes

use thiserror::Error;

/// Input-shape errors surfaced immediately to the caller.
///
/// Everything the type system cannot rule out lands here; malformed but
/// representable inputs (empty content, unusual roles, unknown metadata)
/// are accepted and never error.
#[derive(Debug, Error)]
pub enum Error {
    /// A message record is structurally unusable (kind "type").
    #[error("type: {0}")]
    Type(String),
}

impl Error {
    pub fn type_error(detail: impl Into<String>) -> Self {
        Error::Type(detail.into())
    }
}
