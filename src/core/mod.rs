//! Core infrastructure: the event bus, the event catalogue, and the
//! reference data store.

pub mod event_bus;
pub mod events;
pub mod store;

pub use event_bus::{EventBus, Subscription};
pub use store::MemoryStore;
