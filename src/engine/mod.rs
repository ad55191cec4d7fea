// Zefest Engine - Core module structure
pub mod config;
pub mod storage;
pub mod session;
pub mod api;
pub mod updater;
pub mod navigation;
pub mod platform;
pub mod cli;

pub use config::ClientConfig;
pub use storage::{KeyValueStore, StorageKey};
