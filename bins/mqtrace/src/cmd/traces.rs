use capture_api::{HistoryStore, TraceStore, profile_or_default};
use capture_store::{DataRoot, FileStore};
use chrono::SecondsFormat;

use crate::config::{AppConfig, TracesArgs};
use crate::error::CliError;

pub fn run(root: DataRoot, args: TracesArgs) -> Result<(), CliError> {
    let app = AppConfig::load(&root.config_file())?;
    let store = FileStore::open(root, app.default_profile_name())?;

    if let Some(key) = &args.remove {
        let traces = store.load_traces()?;
        let cfg = traces
            .get(key)
            .ok_or_else(|| capture_api::StoreError::TraceNotFound(key.clone()))?;
        store.clear_data(cfg.profile_name(), key)?;
        store.remove_trace(key)?;
        println!("removed trace '{key}'");
        return Ok(store.close()?);
    }

    let only = args.profile.as_deref().map(profile_or_default);
    for (key, cfg) in store.load_traces()? {
        if only.is_some_and(|p| p != cfg.profile_name()) {
            continue;
        }
        let counts = store.load_counts(cfg.profile_name(), &key, &cfg.topics)?;
        let total: u64 = counts.values().sum();
        let window = |t: Option<chrono::DateTime<chrono::Utc>>| {
            t.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_else(|| "-".to_string())
        };
        println!(
            "{key}  profile={}  topics={}  start={}  end={}  messages={total}",
            cfg.profile_name(),
            cfg.subscription_filters().join(","),
            window(cfg.start),
            window(cfg.end),
        );
    }
    Ok(store.close()?)
}
