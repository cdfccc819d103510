use capture_api::{HistoryStore, Message, QueryError, SearchQuery, parse_instant};
use capture_store::{DataRoot, FileStore};
use chrono::SecondsFormat;

use crate::config::{AppConfig, HistoryArgs};
use crate::error::CliError;

pub fn run(root: DataRoot, args: HistoryArgs) -> Result<(), CliError> {
    let app = AppConfig::load(&root.config_file())?;
    let profile = match args.profile.as_deref() {
        Some(p) if !p.trim().is_empty() => p.trim().to_string(),
        _ => app.default_profile_name().to_string(),
    };
    let store = FileStore::open(root, &profile)?;

    if let Some(target) = &args.archive {
        let moved = store.archive(target)?;
        println!("archived {moved} message(s)");
        return Ok(store.close()?);
    }
    if let Some(target) = &args.delete {
        let removed = store.delete(target)?;
        println!("deleted {removed} message(s)");
        return Ok(store.close()?);
    }

    let query = build_query(&args)?;
    if args.list_topics {
        for topic in store.topics(query.archived)? {
            println!("{topic}");
        }
        return Ok(store.close()?);
    }

    let found = store.search(&query)?;
    for msg in &found {
        println!("{}", format_line(msg));
    }
    tracing::debug!(
        profile = %profile,
        matched = found.len(),
        total = store.count(query.archived)?,
        "history search"
    );
    Ok(store.close()?)
}

fn build_query(args: &HistoryArgs) -> Result<SearchQuery, CliError> {
    if let Some(line) = &args.query {
        return Ok(SearchQuery::parse(line)?);
    }
    let start = parse_instant("start", &args.start)?;
    let end = parse_instant("end", &args.end)?;
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(QueryError::StartAfterEnd.into());
        }
    }
    let base = if args.archived {
        SearchQuery::archived()
    } else {
        SearchQuery::active()
    };
    Ok(base
        .with_topics(args.topics.iter().cloned())
        .with_window(start, end)
        .with_payload(args.payload.clone()))
}

fn format_line(msg: &Message) -> String {
    format!(
        "{:>6}  {}  {:<6} {}  {}",
        msg.id,
        msg.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        msg.kind.to_string(),
        msg.topic,
        msg.payload_text()
    )
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
