//! Zefest navigation guards

pub mod guard;

pub use guard::{BackAction, BackGuard, ListenerId, NavigationHost, SignalSource};
