//! Workspace modes: signed-in users versus the shared demo workspace.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which workspace a request comes from. The shared demo workspace gets
/// tighter guardrail ceilings than a signed-in user's own workspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceMode {
    #[default]
    User,
    Demo,
}

impl WorkspaceMode {
    pub fn is_demo(self) -> bool {
        matches!(self, WorkspaceMode::Demo)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkspaceMode::User => "user",
            WorkspaceMode::Demo => "demo",
        }
    }
}

impl fmt::Display for WorkspaceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkspaceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(WorkspaceMode::User),
            "demo" => Ok(WorkspaceMode::Demo),
            other => Err(format!("unknown workspace mode: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        assert_eq!("demo".parse::<WorkspaceMode>().unwrap(), WorkspaceMode::Demo);
        assert_eq!(" User ".parse::<WorkspaceMode>().unwrap(), WorkspaceMode::User);
        assert!("admin".parse::<WorkspaceMode>().is_err());
        assert_eq!(WorkspaceMode::Demo.to_string(), "demo");
    }

    #[test]
    fn serde_lowercase() {
        let json = serde_json::to_string(&WorkspaceMode::Demo).unwrap();
        assert_eq!(json, "\"demo\"");
        let mode: WorkspaceMode = serde_json::from_str("\"user\"").unwrap();
        assert!(!mode.is_demo());
    }
}
