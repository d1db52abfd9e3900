//! Signal persistence.
//!
//! [`SignalStore`] is the narrow repository the lifecycle engine writes
//! through. Status changes are single atomic operations: callers never
//! read-modify-write a record themselves.
//!
//! [`MemorySignalStore`] keeps records in memory and, when opened on a path,
//! journals every write as a JSON line that is replayed on the next start.

pub mod error;
pub mod journal;
pub mod memory;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemorySignalStore;
pub use store::{DynStore, SignalStore};
