//! Mentorship session client.
//!
//! Ties the REST API, the shared real-time channel and the per-session
//! caches together. A [`ClientContext`] owns the process-wide state; a
//! [`SessionView`] is one open session screen on top of it.

pub mod api;
pub mod assignments;
pub mod config;
pub mod context;
pub mod error;
pub mod in_flight;
pub mod reconciler;
pub mod router;
pub mod schedule;
pub mod store;
pub mod view;

pub use api::{HttpPlatformApi, PlatformApi};
pub use config::{ClientConfig, ConfigError};
pub use context::ClientContext;
pub use error::{ClientError, ClientResult};
pub use reconciler::Composer;
pub use view::SessionView;
