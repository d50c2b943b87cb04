//! Queue module: the items a user submits for conversion.
//!
//! Items live in an [`ItemStore`]. The orchestrator reads the store at every
//! drain step and is the only writer of status and progress while a batch is
//! running; outside a batch the UI may insert, remove or reset items.

mod store;
mod types;

pub use store::{InMemoryItemStore, ItemStore};
pub use types::{ItemId, ItemStatus, QueueItem};
