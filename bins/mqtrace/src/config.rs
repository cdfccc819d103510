use std::path::{Path, PathBuf};
use std::time::Duration;

use capture_api::{DEFAULT_PROFILE, profile_or_default};
use capture_store::DataRoot;
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "mqtrace", about = "Capture, record and search MQTT traffic")]
pub struct Cli {
    /// Root of config.toml, traces.toml and captured data
    #[arg(long, global = true, env = "MQTRACE_HOME")]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn data_root(&self) -> DataRoot {
        match &self.home {
            Some(dir) => DataRoot::new(dir),
            None => DataRoot::from_env(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a topic set for a bounded time window
    Trace(TraceArgs),
    /// Run a transparent relay in front of the broker until Ctrl+C
    Relay(RelayArgs),
    /// Publish one message and record it in the history log
    Publish(PublishArgs),
    /// Search, archive or delete history entries
    History(HistoryArgs),
    /// List registered traces
    Traces(TracesArgs),
    /// List configured connection profiles
    Profiles,
}

#[derive(Args, Clone, Debug)]
pub struct TraceArgs {
    /// Trace key, unique per profile
    #[arg(long)]
    pub key: String,

    #[arg(long)]
    pub profile: Option<String>,

    /// Comma separated subscription filters, `#` when empty
    #[arg(long, value_delimiter = ',')]
    pub topics: Vec<String>,

    /// Ignore messages stamped before this RFC 3339 instant
    #[arg(long, default_value = "")]
    pub start: String,

    /// Stop recording at this RFC 3339 instant
    #[arg(long, default_value = "")]
    pub end: String,

    /// Give up after this long, e.g. `30s`, `5m`
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Connect straight to the broker instead of through the relay
    #[arg(long)]
    pub direct: bool,
}

#[derive(Args, Clone, Debug)]
pub struct RelayArgs {
    #[arg(long, default_value = "127.0.0.1:0")]
    pub bind: String,

    /// Broker address; defaults to the default profile's broker
    #[arg(long)]
    pub upstream: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct PublishArgs {
    pub topic: String,

    pub payload: String,

    #[arg(long)]
    pub profile: Option<String>,

    #[arg(long)]
    pub retain: bool,

    /// 0, 1 or 2
    #[arg(long, default_value_t = 0)]
    pub qos: u8,

    #[arg(long)]
    pub direct: bool,
}

#[derive(Args, Clone, Debug)]
pub struct HistoryArgs {
    #[arg(long)]
    pub profile: Option<String>,

    /// Filter query, e.g. `topic=temp,hum payload=21 start=... archived=true`
    #[arg(long, conflicts_with_all = ["topics", "payload", "start", "end", "archived"])]
    pub query: Option<String>,

    /// Comma separated fuzzy topic patterns
    #[arg(long, value_delimiter = ',')]
    pub topics: Vec<String>,

    #[arg(long, default_value = "")]
    pub payload: String,

    #[arg(long, default_value = "")]
    pub start: String,

    #[arg(long, default_value = "")]
    pub end: String,

    /// Search the archived partition
    #[arg(long)]
    pub archived: bool,

    /// Print the distinct topics instead of messages
    #[arg(long)]
    pub list_topics: bool,

    /// Archive messages by id or topic
    #[arg(long, conflicts_with = "delete")]
    pub archive: Option<String>,

    /// Delete messages by id or topic
    #[arg(long)]
    pub delete: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct TracesArgs {
    /// Only traces of this profile
    #[arg(long)]
    pub profile: Option<String>,

    /// Unregister a trace and drop its data
    #[arg(long)]
    pub remove: Option<String>,
}

/// `30s`, `500ms`, `5m`, `1h`, or plain seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (num, unit) = s.split_at(split);
    let n: u64 = num.parse().map_err(|_| format!("invalid duration '{s}'"))?;
    let scale = match unit {
        "ms" => return Ok(Duration::from_millis(n)),
        "" | "s" => 1,
        "m" => 60,
        "h" => 3600,
        _ => return Err(format!("unknown duration unit '{unit}' in '{s}'")),
    };
    n.checked_mul(scale)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}

// ---- TOML Config ----

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub default_profile: String,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    /// Address of the last relay started on this machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_addr: Option<String>,
}

/// Broker connection settings, treated as an immutable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn default_schema() -> String {
    "tcp".to_string()
}
fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    1883
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROFILE.to_string(),
            schema: default_schema(),
            host: default_host(),
            port: default_port(),
            client_id: String::new(),
            username: None,
            password: None,
        }
    }
}

impl Profile {
    pub fn broker_url(&self) -> String {
        format!("{}://{}:{}", self.schema, self.host, self.port)
    }

    /// `host:port` to dial.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn client_id(&self) -> String {
        if self.client_id.is_empty() {
            format!("mqtrace-{}", std::process::id())
        } else {
            self.client_id.clone()
        }
    }
}

impl AppConfig {
    /// A missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(CliError::Config {
                    context: "read",
                    detail: format!("'{}': {e}", path.display()),
                });
            }
        };
        toml::from_str(&content).map_err(|e| CliError::Config {
            context: "parse",
            detail: format!("'{}': {e}", path.display()),
        })
    }

    /// Name used when the command line gives none.
    pub fn default_profile_name(&self) -> &str {
        profile_or_default(&self.default_profile)
    }

    /// Resolve a profile by name, falling back to the default profile.
    ///
    /// With no profiles configured at all the built-in `localhost:1883`
    /// profile stands in for `default`.
    pub fn profile(&self, name: Option<&str>) -> Result<Profile, CliError> {
        let name = match name {
            Some(n) if !n.trim().is_empty() => n.trim(),
            _ => self.default_profile_name(),
        };
        if let Some(p) = self.profiles.iter().find(|p| p.name == name) {
            return Ok(p.clone());
        }
        if self.profiles.is_empty() && name == DEFAULT_PROFILE {
            return Ok(Profile::default());
        }
        Err(tracer::TraceError::Profile(name.to_string()).into())
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
