#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use jtree::{NodePath, SelectorMsg};

use crate::error::DemoError;

/// One scripted user intent: `expand:<path>`, `check:<path>` or `clear`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Expand(NodePath),
    Check(NodePath),
    Clear,
}

impl Step {
    #[must_use]
    pub fn into_msg(self) -> SelectorMsg {
        match self {
            Self::Expand(path) => SelectorMsg::ToggleExpand(path),
            Self::Check(path) => SelectorMsg::ToggleCheck(path),
            Self::Clear => SelectorMsg::ClearSelection,
        }
    }
}

impl FromStr for Step {
    type Err = DemoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "clear" {
            return Ok(Self::Clear);
        }
        let Some((action, path)) = s.split_once(':') else {
            return Err(DemoError::invalid_step(
                s,
                "expected expand:<path>, check:<path> or clear",
            ));
        };
        let path: NodePath = path
            .parse()
            .map_err(|err| DemoError::invalid_step(s, format!("{err}")))?;
        match action {
            "expand" => Ok(Self::Expand(path)),
            "check" => Ok(Self::Check(path)),
            other => Err(DemoError::invalid_step(
                s,
                format!("unknown action `{other}`"),
            )),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expand(path) => write!(f, "expand:{path}"),
            Self::Check(path) => write!(f, "check:{path}"),
            Self::Clear => f.write_str("clear"),
        }
    }
}
