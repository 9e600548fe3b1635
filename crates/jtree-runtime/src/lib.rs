#![forbid(unsafe_code)]

//! jtree Runtime
//!
//! Runs the jurisdiction tree state machine against a real data source.
//!
//! # Key Components
//!
//! - [`Program`] - Elm-style update loop; blocking fetches run on worker threads
//! - [`ProgramSimulator`] - deterministic driver with a manual task queue
//! - [`Model`] / [`Cmd`] - state machine contract and side-effect descriptions
//! - [`SelectorModel`] - the jurisdiction selector built on `jtree-core`
//! - [`Observable`] - change-notifying snapshot publication
//! - [`SelectorConfig`] - fetch and display settings
//!
//! # How it fits in the system
//! `jtree-core` decides what to fetch; this crate fetches it. Every result
//! is delivered back to the program thread as a message, so the tree is only
//! ever mutated in one place and a late result is applied to the latest
//! snapshot rather than the one its fetch started from.

pub mod config;
pub mod effect_system;
pub mod program;
pub mod reactive;
pub mod selector;
pub mod simulator;

pub use config::{ConfigError, DisplayConfig, FetchConfig, GuideStyle, SelectorConfig};
pub use program::{Cmd, Model, Program, ProgramError, ProgramHandle, TaskSpec};
pub use reactive::{Observable, Subscription};
pub use selector::{SelectorModel, SelectorMsg, SelectorSnapshot, SelectorStatus};
pub use simulator::{CmdRecord, ProgramSimulator};
