mod blocking;
mod btree;
mod config;
mod core;
mod storage;

pub use crate::blocking::{BlockingBTree, BlockingCursor};
pub use crate::btree::{BTree, Cursor, Entry, Node, TreeStats};
pub use crate::config::BTreeConfig;
pub use crate::core::errors::{BTreeError, ProviderError};
pub use crate::storage::{FileProvider, FileProviderConfig, MemoryProvider, Provider};
