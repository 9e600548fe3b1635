#![forbid(unsafe_code)]

//! jtree public facade.
//!
//! Re-exports the common types of the workspace crates and offers a
//! prelude. Start with [`SelectorModel`] driven by a [`Program`], or use
//! [`JurisdictionTree`] directly when you run fetches yourself.

mod error;

pub use error::{JtreeError, Result};

// --- Core re-exports -------------------------------------------------------

pub use jtree_core::{
    CancellationSource, CancellationToken, FetchOutcome, FetchTicket, Forest, Jurisdiction,
    JurisdictionId, JurisdictionSource, JurisdictionTree, NodePath, NodeState, SourceError,
    StaleFetchPolicy, StoreError, TreeEffects,
};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use jtree_runtime::{
    Cmd, Model, Program, ProgramError, ProgramHandle, ProgramSimulator, SelectorConfig,
    SelectorModel, SelectorMsg, SelectorSnapshot, SelectorStatus,
};

// --- Widget re-exports -----------------------------------------------------

#[cfg(feature = "widgets")]
pub use jtree_widgets::{Outline, OutlineGuides, OutlineRow};

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Forest, JtreeError, Jurisdiction, JurisdictionId, JurisdictionSource, JurisdictionTree,
        NodePath, Result, SourceError,
    };

    #[cfg(feature = "runtime")]
    pub use crate::{Program, SelectorConfig, SelectorModel, SelectorMsg, SelectorSnapshot};

    #[cfg(feature = "widgets")]
    pub use crate::{Outline, OutlineGuides};

    pub use crate::core;
    #[cfg(feature = "runtime")]
    pub use crate::runtime;
    #[cfg(feature = "widgets")]
    pub use crate::widgets;
}

pub use jtree_core as core;
#[cfg(feature = "runtime")]
pub use jtree_runtime as runtime;
#[cfg(feature = "widgets")]
pub use jtree_widgets as widgets;
