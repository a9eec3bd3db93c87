//! Version information for the vault-init CLI

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub version: String,

    /// Git commit SHA (short), when the build provides one
    pub commit: Option<String>,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            commit: option_env!("GIT_SHA").map(String::from),
        }
    }

    pub fn display(&self) -> String {
        match &self.commit {
            Some(commit) => format!("vault-init {} ({})", self.version, commit),
            None => format!("vault-init {}", self.version),
        }
    }
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
