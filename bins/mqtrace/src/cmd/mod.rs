pub mod history;
pub mod profiles;
pub mod publish;
pub mod relay;
pub mod trace;
pub mod traces;

use std::sync::Arc;
use std::time::Duration;

use capture_store::DataRoot;
use pubsub::{ConnectOptions, MqttClient};
use ::relay::{FixedUpstream, RelayHandle};
use tokio_util::sync::CancellationToken;

use crate::config::Profile;
use crate::error::CliError;

const KEEP_ALIVE_SECS: u16 = 30;
const RELAY_DRAIN: Duration = Duration::from_secs(5);

/// Client for `profile`, dialing through the shared relay unless `direct`.
///
/// The relay handle is `Some` when this process started the relay and must
/// stop it on exit.
pub(crate) async fn broker_client(
    root: &DataRoot,
    profile: &Profile,
    direct: bool,
) -> Result<(MqttClient, Option<RelayHandle>), CliError> {
    let (addr, handle) = if direct {
        (profile.socket_addr(), None)
    } else {
        let upstream = Arc::new(FixedUpstream(profile.socket_addr()));
        ::relay::init(&root.config_file(), upstream).await?
    };
    tracing::info!(
        profile = %profile.name,
        broker = %profile.broker_url(),
        via = %addr,
        "connecting"
    );

    let options = ConnectOptions {
        client_id: profile.client_id(),
        username: profile.username.clone(),
        password: profile.password.clone(),
        keep_alive_secs: KEEP_ALIVE_SECS,
    };
    Ok((MqttClient::new(addr, options), handle))
}

/// Cancelled on the first Ctrl+C.
pub(crate) fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down...");
            trigger.cancel();
        }
    });
    token
}

/// Stop a relay this process owns and give its connections a moment to drain.
pub(crate) async fn stop_relay(handle: Option<RelayHandle>) {
    if let Some(handle) = handle {
        handle.stop();
        if tokio::time::timeout(RELAY_DRAIN, handle.wait()).await.is_err() {
            tracing::warn!(addr = %handle.addr(), "relay connections did not drain");
        }
    }
}
