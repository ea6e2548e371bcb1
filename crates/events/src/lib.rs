//! In-process event bus for the mentorship client.
//!
//! Components signal each other through typed [`ClientEvent`]s published
//! on an [`EventBus`] instead of string-keyed global broadcasts. Any
//! number of views can subscribe and each receives every event.

pub mod bus;

pub use bus::{ClientEvent, EventBus, EventEnvelope};
