use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::error::RelayError;
use crate::relay::{Destination, RelayHandle, start};

/// Key under which the last relay address is kept in the config file.
pub const RELAY_ADDR_KEY: &str = "relay_addr";

const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Reuse the relay recorded in `config_path` when it still accepts
/// connections, otherwise start one on an ephemeral loopback port and record
/// its address.
///
/// The handle is `None` when an existing relay was reused.
pub async fn init(
    config_path: &Path,
    destination: Arc<dyn Destination>,
) -> Result<(String, Option<RelayHandle>), RelayError> {
    if let Some(saved) = load_relay_addr(config_path)? {
        if is_dialable(&saved).await {
            tracing::info!(addr = %saved, "reusing running relay");
            return Ok((saved, None));
        }
        tracing::debug!(addr = %saved, "saved relay is not reachable");
    }

    let (addr, handle) = start("127.0.0.1:0", destination).await?;
    if let Err(e) = save_relay_addr(config_path, &addr) {
        tracing::warn!(error = %e, path = %config_path.display(), "could not record relay address");
    }
    Ok((addr, Some(handle)))
}

/// Dial and immediately close. A relay treats this as a liveness probe.
pub async fn is_dialable(addr: &str) -> bool {
    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

pub fn load_relay_addr(config_path: &Path) -> Result<Option<String>, RelayError> {
    let table = read_table(config_path)?;
    Ok(table
        .get(RELAY_ADDR_KEY)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string))
}

/// Update `relay_addr` and keep every other key of the file as is.
pub fn save_relay_addr(config_path: &Path, addr: &str) -> Result<(), RelayError> {
    let mut table = read_table(config_path)?;
    table.insert(RELAY_ADDR_KEY.to_string(), toml::Value::String(addr.to_string()));

    let text = toml::to_string_pretty(&table).map_err(|e| RelayError::Config {
        context: config_path.display().to_string(),
        detail: e.to_string(),
    })?;
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(config_path, text)?;
    Ok(())
}

fn read_table(config_path: &Path) -> Result<toml::Table, RelayError> {
    let text = match std::fs::read_to_string(config_path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(toml::Table::new()),
        Err(e) => return Err(e.into()),
    };
    text.parse::<toml::Table>().map_err(|e| RelayError::Config {
        context: config_path.display().to_string(),
        detail: e.to_string(),
    })
}

#[cfg(test)]
#[path = "reuse_test.rs"]
mod tests;
