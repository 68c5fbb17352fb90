//! In-memory adapters for tests and embedding the search in another process.

pub mod frontier;
pub mod node_store;

pub use frontier::InMemoryFrontier;
pub use node_store::InMemoryNodeStore;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
