mod file;
mod memory;
mod provider;

pub use file::{FileProvider, FileProviderConfig};
pub use memory::MemoryProvider;
pub use provider::Provider;
