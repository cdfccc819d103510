use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use capture_api::{
    HistoryStore, Message, SearchQuery, StoreError, TraceStore, TracerConfig, profile_or_default,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::partition::{HistoryLog, filter_counts};
use crate::root::DataRoot;

const ACTIVE_FILE: &str = "active.jsonl";
const ARCHIVED_FILE: &str = "archived.jsonl";
const MESSAGES_FILE: &str = "messages.jsonl";
const COUNTS_FILE: &str = "counts.json";

// ════════════════════════════════════════════════════════════════
//  FileStore
// ════════════════════════════════════════════════════════════════

/// JSONL-backed store rooted at a [`DataRoot`].
///
/// History belongs to the profile the store was opened for; trace partitions
/// are addressed per call. The history log is loaded on first use and kept as
/// a write-through cache.
pub struct FileStore {
    root: DataRoot,
    profile: String,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    closed: bool,
    history: Option<HistoryLog>,
    counts: HashMap<PathBuf, BTreeMap<String, u64>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TracesFile {
    #[serde(default)]
    traces: BTreeMap<String, TracerConfig>,
}

impl FileStore {
    pub fn open(root: DataRoot, profile: &str) -> Result<Self, StoreError> {
        let profile = profile_or_default(profile).to_string();
        validate_name(&profile)?;
        tracing::debug!(root = %root.path().display(), profile = %profile, "file store opened");
        Ok(Self {
            root,
            profile,
            state: Mutex::new(State::default()),
        })
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn root(&self) -> &DataRoot {
        &self.root
    }

    /// Remove every history and trace file of `profile`.
    pub fn delete_profile_data(&self, profile: &str) -> Result<(), StoreError> {
        let mut state = self.lock_open()?;
        let dir = self.root.profile_dir(profile);
        remove_dir(&dir)?;
        state.counts.retain(|path, _| !path.starts_with(&dir));
        if profile_or_default(profile) == self.profile {
            state.history = None;
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("file store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn lock_open(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        let state = self.lock();
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(state)
    }

    fn history_file(&self, archived: bool) -> PathBuf {
        let name = if archived { ARCHIVED_FILE } else { ACTIVE_FILE };
        self.root.history_dir(&self.profile).join(name)
    }

    fn history<'a>(&self, state: &'a mut State) -> Result<&'a mut HistoryLog, StoreError> {
        if state.history.is_none() {
            let dir = self.root.history_dir(&self.profile);
            std::fs::create_dir_all(&dir)
                .map_err(|e| StoreError::io(format!("mkdir {}", dir.display()), e))?;
            let active: Vec<Message> = read_lines(&self.history_file(false))?;
            let archived: Vec<Message> = read_lines(&self.history_file(true))?;
            let legacy = active.iter().chain(archived.iter()).any(|m| m.id == 0);
            let log = HistoryLog::from_parts(active, archived);
            if legacy {
                self.rewrite_history(&log)?;
            }
            tracing::debug!(
                profile = %self.profile,
                active = log.active.len(),
                archived = log.archived.len(),
                "history loaded"
            );
            state.history = Some(log);
        }
        state
            .history
            .as_mut()
            .ok_or_else(|| StoreError::format("history", "cache not loaded"))
    }

    fn rewrite_history(&self, log: &HistoryLog) -> Result<(), StoreError> {
        write_lines(&self.history_file(false), &log.active)?;
        write_lines(&self.history_file(true), &log.archived)
    }

    fn trace_dir(&self, profile: &str, key: &str) -> Result<PathBuf, StoreError> {
        validate_name(profile_or_default(profile))?;
        validate_name(key)?;
        Ok(self.root.trace_dir(profile, key))
    }

    fn read_traces(&self) -> Result<BTreeMap<String, TracerConfig>, StoreError> {
        let path = self.root.traces_file();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(StoreError::io(format!("read {}", path.display()), e)),
        };
        let file: TracesFile = toml::from_str(&text)
            .map_err(|e| StoreError::format(path.display(), e))?;
        Ok(file.traces)
    }

    fn write_traces(&self, traces: &BTreeMap<String, TracerConfig>) -> Result<(), StoreError> {
        let path = self.root.traces_file();
        let file = TracesFile {
            traces: traces.clone(),
        };
        let text = toml::to_string_pretty(&file).map_err(|e| StoreError::format(path.display(), e))?;
        write_atomic(&path, text.as_bytes())
    }

    fn cached_counts<'a>(
        &self,
        state: &'a mut State,
        dir: &Path,
    ) -> Result<&'a mut BTreeMap<String, u64>, StoreError> {
        if !state.counts.contains_key(dir) {
            let counts = read_counts(&dir.join(COUNTS_FILE))?;
            state.counts.insert(dir.to_path_buf(), counts);
        }
        state
            .counts
            .get_mut(dir)
            .ok_or_else(|| StoreError::format(dir.display(), "counts not loaded"))
    }
}

impl HistoryStore for FileStore {
    fn append(&self, message: Message) -> Result<u64, StoreError> {
        let mut state = self.lock_open()?;
        let log = self.history(&mut state)?;
        let stored = log.append(message).clone();
        if let Err(e) = append_line(&self.history_file(stored.archived), &stored) {
            let partition = if stored.archived { &mut log.archived } else { &mut log.active };
            partition.pop();
            return Err(e);
        }
        Ok(stored.id)
    }

    fn archive(&self, target: &str) -> Result<usize, StoreError> {
        let mut state = self.lock_open()?;
        let log = self.history(&mut state)?;
        let moved = log.archive(target);
        if moved > 0 {
            self.rewrite_history(log)?;
            tracing::info!(profile = %self.profile, selector = %target, moved, "history archived");
        }
        Ok(moved)
    }

    fn delete(&self, target: &str) -> Result<usize, StoreError> {
        let mut state = self.lock_open()?;
        let log = self.history(&mut state)?;
        let removed = log.delete(target);
        if removed > 0 {
            self.rewrite_history(log)?;
            tracing::info!(profile = %self.profile, selector = %target, removed, "history deleted");
        }
        Ok(removed)
    }

    fn count(&self, archived: bool) -> Result<usize, StoreError> {
        let mut state = self.lock_open()?;
        Ok(self.history(&mut state)?.count(archived))
    }

    fn search(&self, query: &SearchQuery) -> Result<Vec<Message>, StoreError> {
        let mut state = self.lock_open()?;
        Ok(self.history(&mut state)?.search(query))
    }

    fn topics(&self, archived: bool) -> Result<Vec<String>, StoreError> {
        let mut state = self.lock_open()?;
        Ok(self.history(&mut state)?.topics(archived))
    }

    fn close(&self) -> Result<(), StoreError> {
        let mut state = self.lock();
        if !state.closed {
            state.closed = true;
            state.history = None;
            state.counts.clear();
            tracing::debug!(profile = %self.profile, "file store closed");
        }
        Ok(())
    }
}

impl TraceStore for FileStore {
    fn add_trace(&self, cfg: TracerConfig) -> Result<(), StoreError> {
        let _state = self.lock_open()?;
        let dir = self.trace_dir(&cfg.profile, &cfg.key)?;
        if partition_has_data(&dir)? {
            return Err(StoreError::TraceExists {
                profile: profile_or_default(&cfg.profile).to_string(),
                key: cfg.key,
            });
        }
        let mut traces = self.read_traces()?;
        if let Some(existing) = traces.get(&cfg.key) {
            if existing.profile_name() != cfg.profile_name() {
                return Err(StoreError::TraceExists {
                    profile: existing.profile_name().to_string(),
                    key: cfg.key,
                });
            }
        }
        traces.insert(cfg.key.clone(), cfg);
        self.write_traces(&traces)
    }

    fn remove_trace(&self, key: &str) -> Result<(), StoreError> {
        let _state = self.lock_open()?;
        let mut traces = self.read_traces()?;
        if traces.remove(key).is_none() {
            return Err(StoreError::TraceNotFound(key.to_string()));
        }
        self.write_traces(&traces)
    }

    fn load_traces(&self) -> Result<BTreeMap<String, TracerConfig>, StoreError> {
        let _state = self.lock_open()?;
        self.read_traces()
    }

    fn save_traces(&self, traces: &BTreeMap<String, TracerConfig>) -> Result<(), StoreError> {
        let _state = self.lock_open()?;
        self.write_traces(traces)
    }

    fn has_data(&self, profile: &str, key: &str) -> Result<bool, StoreError> {
        let _state = self.lock_open()?;
        partition_has_data(&self.trace_dir(profile, key)?)
    }

    fn clear_data(&self, profile: &str, key: &str) -> Result<(), StoreError> {
        let mut state = self.lock_open()?;
        let dir = self.trace_dir(profile, key)?;
        remove_dir(&dir)?;
        state.counts.remove(&dir);
        tracing::info!(profile = %profile_or_default(profile), key, "trace data cleared");
        Ok(())
    }

    fn append(&self, profile: &str, key: &str, message: Message) -> Result<(), StoreError> {
        let mut state = self.lock_open()?;
        let dir = self.trace_dir(profile, key)?;
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::io(format!("mkdir {}", dir.display()), e))?;

        append_line(&dir.join(MESSAGES_FILE), &message)?;

        let counts = self.cached_counts(&mut state, &dir)?;
        *counts.entry(message.topic).or_default() += 1;
        let json = serde_json::to_vec_pretty(&*counts)
            .map_err(|e| StoreError::format(COUNTS_FILE, e))?;
        write_atomic(&dir.join(COUNTS_FILE), &json)
    }

    fn messages(&self, profile: &str, key: &str) -> Result<Vec<Message>, StoreError> {
        let _state = self.lock_open()?;
        read_lines(&self.trace_dir(profile, key)?.join(MESSAGES_FILE))
    }

    fn load_counts(
        &self,
        profile: &str,
        key: &str,
        filters: &[String],
    ) -> Result<HashMap<String, u64>, StoreError> {
        let mut state = self.lock_open()?;
        let dir = self.trace_dir(profile, key)?;
        let counts = self.cached_counts(&mut state, &dir)?;
        Ok(filter_counts(counts, filters))
    }
}

// ════════════════════════════════════════════════════════════════
//  JSONL helpers
// ════════════════════════════════════════════════════════════════

/// Partition names become directory names.
fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn partition_has_data(dir: &Path) -> Result<bool, StoreError> {
    let path = dir.join(MESSAGES_FILE);
    match std::fs::metadata(&path) {
        Ok(meta) => Ok(meta.len() > 0),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(format!("stat {}", path.display()), e)),
    }
}

fn remove_dir(dir: &Path) -> Result<(), StoreError> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(format!("remove {}", dir.display()), e)),
    }
}

fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let f = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(format!("open {}", path.display()), e)),
    };
    let reader = std::io::BufReader::new(f);

    let mut out = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| StoreError::io(format!("read {}", path.display()), e))?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line)
            .map_err(|e| StoreError::format(format!("{}:{}", path.display(), n + 1), e))?;
        out.push(item);
    }
    Ok(out)
}

fn append_line<T: Serialize>(path: &Path, item: &T) -> Result<(), StoreError> {
    let line = serde_json::to_string(item).map_err(|e| StoreError::format(path.display(), e))?;
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::io(format!("open {}", path.display()), e))?;
    writeln!(f, "{line}").map_err(|e| StoreError::io(format!("write {}", path.display()), e))
}

fn write_lines<T: Serialize>(path: &Path, items: &[T]) -> Result<(), StoreError> {
    let mut buf = Vec::new();
    for item in items {
        serde_json::to_writer(&mut buf, item).map_err(|e| StoreError::format(path.display(), e))?;
        buf.push(b'\n');
    }
    write_atomic(path, &buf)
}

/// Write to a sibling temp file, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| StoreError::io(format!("mkdir {}", parent.display()), e))?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).map_err(|e| StoreError::io(format!("write {}", tmp.display()), e))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| StoreError::io(format!("rename {}", path.display()), e))
}

fn read_counts(path: &Path) -> Result<BTreeMap<String, u64>, StoreError> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::format(path.display(), e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(StoreError::io(format!("read {}", path.display()), e)),
    }
}

#[cfg(test)]
#[path = "file_test.rs"]
mod tests;
