use std::path::{Path, PathBuf};

use capture_api::profile_or_default;

/// Environment variable overriding the data root.
pub const HOME_ENV: &str = "MQTRACE_HOME";

/// On-disk layout of everything the engine persists.
///
/// ```text
/// <root>/config.toml
/// <root>/traces.toml
/// <root>/data/<profile>/history/{active,archived}.jsonl
/// <root>/data/<profile>/traces/<key>/{messages.jsonl,counts.json}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRoot {
    path: PathBuf,
}

impl DataRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$MQTRACE_HOME`, else `$HOME/.config/mqtrace`, else `./.mqtrace`.
    pub fn from_env() -> Self {
        if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Self::new(dir);
        }
        match std::env::var_os("HOME").filter(|v| !v.is_empty()) {
            Some(home) => Self::new(PathBuf::from(home).join(".config").join("mqtrace")),
            None => Self::new(".mqtrace"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config_file(&self) -> PathBuf {
        self.path.join("config.toml")
    }

    pub fn traces_file(&self) -> PathBuf {
        self.path.join("traces.toml")
    }

    pub fn profile_dir(&self, profile: &str) -> PathBuf {
        self.path.join("data").join(profile_or_default(profile))
    }

    pub fn history_dir(&self, profile: &str) -> PathBuf {
        self.profile_dir(profile).join("history")
    }

    pub fn trace_dir(&self, profile: &str, key: &str) -> PathBuf {
        self.profile_dir(profile).join("traces").join(key)
    }
}
