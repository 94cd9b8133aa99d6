//! Backend-owned shared state.
//!
//! # Responsibilities
//! - Per-session key/value maps, indexed by the request's session identifier
//! - One process-wide application key/value map
//!
//! # Design Decisions
//! - One mutex per store; reads lock as well as writes
//! - The two stores never share a lock
//! - Empty keys and session ids are ignored, never errors
//! - No expiry: entries live until removed

pub mod application;
pub mod session;

use std::sync::{Mutex, MutexGuard};

pub use application::ApplicationStore;
pub use session::SessionStore;

/// Opaque value held by the stores.
pub type StoreValue = serde_json::Value;

/// Both stores, as owned by one backend process.
#[derive(Debug, Default)]
pub struct SharedState {
    pub session: SessionStore,
    pub application: ApplicationStore,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Lock a store, recovering the map if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
