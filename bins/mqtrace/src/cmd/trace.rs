use std::sync::Arc;

use capture_api::{HistoryStore, TraceStore};
use capture_store::{DataRoot, FileStore};
use tracer::{TraceError, TraceOptions, run_trace};

use crate::config::{AppConfig, TraceArgs};
use crate::error::CliError;

pub async fn run(root: DataRoot, args: TraceArgs) -> Result<(), CliError> {
    let app = AppConfig::load(&root.config_file())?;
    let profile = app.profile(args.profile.as_deref())?;

    let opts = TraceOptions {
        profile: profile.name.clone(),
        key: args.key,
        topics: args.topics,
        start: args.start,
        end: args.end,
        timeout: args.timeout,
    };

    // Bad times and existing data both fail before any connection is made.
    let cfg = opts.to_config()?;
    let store = Arc::new(FileStore::open(root.clone(), &profile.name)?);
    if store.has_data(cfg.profile_name(), &cfg.key)? {
        return Err(TraceError::DataExists {
            profile: cfg.profile_name().to_string(),
            key: cfg.key,
        }
        .into());
    }

    let (client, relay) = super::broker_client(&root, &profile, args.direct).await?;
    let shutdown = super::shutdown_on_ctrl_c();

    let result = run_trace(opts, store.clone(), Arc::new(client), shutdown).await;
    super::stop_relay(relay).await;
    store.close()?;

    let counts = result?;
    let mut rows: Vec<_> = counts.into_iter().collect();
    rows.sort();
    for (topic, count) in rows {
        println!("{count:>8}  {topic}");
    }
    Ok(())
}
