//! Record storage.
//!
//! Provides the [`ResourceStore`] abstraction the reconcilers read and write
//! through, change events, and an in-memory implementation.

mod error;
mod event;
mod memory;
mod traits;

pub use error::{Result, StoreError};
pub use event::Event;
pub use memory::MemoryStore;
pub use traits::{DataStore, ResourceStore};
