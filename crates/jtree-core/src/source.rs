#![forbid(unsafe_code)]

//! The jurisdiction data source contract.

use crate::cancellation::CancellationToken;
use crate::jurisdiction::Jurisdiction;
use crate::path::NodePath;

/// Failure of a data source call.
///
/// A call either returns the complete list or fails; there is no partial
/// success.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The remote service could not be reached or answered with an error.
    #[error("jurisdiction service unavailable: {0}")]
    Unavailable(String),
    /// The call did not finish within the configured deadline.
    #[error("jurisdiction request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    /// The fetch was cancelled before it completed.
    #[error("jurisdiction request cancelled")]
    Cancelled,
    /// The response could not be interpreted.
    #[error("malformed jurisdiction response: {0}")]
    Malformed(String),
}

impl SourceError {
    /// Convenience constructor for [`SourceError::Unavailable`].
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }
}

/// Supplier of jurisdiction records.
///
/// Calls may block; the runtime runs them off the update thread and passes a
/// token that is cancelled when the result is no longer wanted.
/// Implementations should return [`SourceError::Cancelled`] when they notice
/// cancellation, but any result from a cancelled call is discarded anyway.
pub trait JurisdictionSource: Send + Sync {
    /// List the top-level jurisdictions.
    fn list_roots(&self, cancel: &CancellationToken) -> Result<Vec<Jurisdiction>, SourceError>;

    /// List the children of the node at `parent`.
    ///
    /// `parent.id()` is the jurisdiction id the remote service expects; the
    /// full path is provided so sources can disambiguate ids that repeat
    /// across branches.
    fn list_children(
        &self,
        parent: &NodePath,
        cancel: &CancellationToken,
    ) -> Result<Vec<Jurisdiction>, SourceError>;
}

impl<S: JurisdictionSource + ?Sized> JurisdictionSource for std::sync::Arc<S> {
    fn list_roots(&self, cancel: &CancellationToken) -> Result<Vec<Jurisdiction>, SourceError> {
        (**self).list_roots(cancel)
    }

    fn list_children(
        &self,
        parent: &NodePath,
        cancel: &CancellationToken,
    ) -> Result<Vec<Jurisdiction>, SourceError> {
        (**self).list_children(parent, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_user_visible_text() {
        assert_eq!(
            SourceError::unavailable("503").to_string(),
            "jurisdiction service unavailable: 503"
        );
        assert_eq!(
            SourceError::Timeout { timeout_ms: 250 }.to_string(),
            "jurisdiction request timed out after 250ms"
        );
    }
}
