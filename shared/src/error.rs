use thiserror::Error;

use crate::types::FieldId;

/// An access or validation failure whose message the server may surface
/// verbatim to the requesting client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{cause}")]
pub struct FriendlyError {
    pub cause: String,
}

impl FriendlyError {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
        }
    }
}

/// Why a path failed to resolve to an object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The subscriber may not see this child; the cause is client-visible.
    #[error("access denied: {0}")]
    AccessDenied(FriendlyError),

    /// The path named a field that is not a collection (or does not exist).
    #[error("field {field_id} is not a collection")]
    NotACollection { field_id: FieldId },
}
