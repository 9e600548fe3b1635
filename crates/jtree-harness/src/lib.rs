#![forbid(unsafe_code)]

//! Test support for jtree.
//!
//! - [`FixtureSource`] serves a static tree from JSON, with optional latency
//! - [`ScriptedSource`] scripts failures and delays per path and logs calls
//! - [`TraceCapture`] records `tracing` spans and events for assertions

pub mod capture;
pub mod fixture;
pub mod scripted;

pub use capture::{CapturedEvent, CapturedSpan, TraceCapture};
pub use fixture::{FixtureError, FixtureNode, FixtureSource, NORTH_AMERICA};
pub use scripted::{ScriptedSource, SourceCall};
