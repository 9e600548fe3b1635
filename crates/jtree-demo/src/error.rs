#![forbid(unsafe_code)]

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DemoError>;

#[derive(Debug, Error)]
pub enum DemoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fixture {}: {source}", path.display())]
    Fixture {
        path: PathBuf,
        source: jtree_harness::FixtureError,
    },

    #[error("config error: {0}")]
    Config(#[from] jtree::runtime::ConfigError),

    #[error("program error: {0}")]
    Program(#[from] jtree::ProgramError),

    #[error("invalid step `{step}`: {message}")]
    InvalidStep { step: String, message: String },

    #[error("{message}")]
    Exit { code: i32, message: String },
}

impl DemoError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Exit { code, .. } => *code,
            Self::InvalidStep { .. } => 2,
            _ => 1,
        }
    }

    #[must_use]
    pub fn invalid_step(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidStep {
            step: step.into(),
            message: message.into(),
        }
    }
}
