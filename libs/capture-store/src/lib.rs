//! Persistence for captured messages.
//!
//! [`MemoryStore`] keeps everything in memory; [`FileStore`] writes JSONL
//! files under a [`DataRoot`]. Both implement the history and trace store
//! traits from `capture-api`.

mod file;
mod memory;
mod partition;
mod root;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use root::{DataRoot, HOME_ENV};
