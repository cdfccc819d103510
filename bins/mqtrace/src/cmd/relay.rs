use std::sync::Arc;

use capture_store::DataRoot;

use crate::config::{AppConfig, RelayArgs};
use crate::error::CliError;

pub async fn run(root: DataRoot, args: RelayArgs) -> Result<(), CliError> {
    let upstream = match args.upstream {
        Some(addr) => addr,
        None => AppConfig::load(&root.config_file())?.profile(None)?.socket_addr(),
    };

    let destination = Arc::new(::relay::FixedUpstream(upstream.clone()));
    let (addr, handle) = ::relay::start(&args.bind, destination).await?;
    ::relay::save_relay_addr(&root.config_file(), &addr)?;
    tracing::info!(addr = %addr, upstream = %upstream, "relay ready");
    println!("{addr}");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down...");
    super::stop_relay(Some(handle)).await;
    tracing::info!("shutdown complete");
    Ok(())
}
