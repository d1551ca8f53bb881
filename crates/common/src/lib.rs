pub mod file_state_store;
pub mod sqlite_state_store;
pub mod state_store;
pub mod validation;

// Re-export commonly used types
pub use file_state_store::FileStateStore;
pub use sqlite_state_store::SqliteStateStore;
pub use state_store::{MemoryStateStore, StateStore, StorageEvent};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
