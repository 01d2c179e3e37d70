//! SMS Dispatch
//!
//! Periodically fetches unsent messages, hands each one to a delivery
//! provider and records the outcome. The loop can be paused and resumed at
//! runtime.

pub mod cache;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod processor;
pub mod sqlite;
pub mod store;

pub use cache::{ConfirmationCache, RedisConfirmationCache};
pub use delivery::{DeliveryClient, DeliveryConfirmation, HttpDeliveryClient, HttpDeliveryClientConfig};
pub use dispatcher::{DispatchControl, DispatcherConfig, MessageDispatcher};
pub use error::{DispatchError, Result};
pub use gate::PauseGate;
pub use processor::{BatchProcessor, CycleReport};
pub use sqlite::SqliteMessageStore;
pub use store::MessageStore;
