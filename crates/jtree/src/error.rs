#![forbid(unsafe_code)]

use jtree_core::{PathParseError, SourceError, StoreError};

/// Any error a jtree application can hit.
#[derive(Debug, thiserror::Error)]
pub enum JtreeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Path(#[from] PathParseError),

    #[cfg(feature = "runtime")]
    #[error(transparent)]
    Program(#[from] jtree_runtime::ProgramError),

    #[cfg(feature = "runtime")]
    #[error(transparent)]
    Config(#[from] jtree_runtime::ConfigError),
}

/// Standard result type for jtree APIs.
pub type Result<T> = std::result::Result<T, JtreeError>;
