// Event Check-in Desk - Core Library
// Exposes the registry, snapshot store, and export for the TUI and tests

pub mod export;
pub mod registry;
pub mod store;

// Re-export commonly used types
pub use export::export_csv;
pub use registry::{
    Attendee, Draft, DraftField, Registry, Stats, ValidationError, ValidationResult, CODE_LEN,
};
pub use store::{MemoryStore, SnapshotError, SnapshotStore, SqliteStore, STORE_KEY};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
