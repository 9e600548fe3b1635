#![forbid(unsafe_code)]

//! Change-notifying values for presentation code.

pub mod observable;

pub use observable::{Observable, Subscription};
