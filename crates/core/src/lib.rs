//! Mentorship session domain model.
//!
//! Pure, I/O-free building blocks shared by the channel and client crates:
//! the session lifecycle state machine, schedule slot invariants,
//! assignment timing rules, the message model with its ordered timeline,
//! upload validation, role permissions, and the draft store.

pub mod assignment;
pub mod draft;
pub mod error;
pub mod message;
pub mod roles;
pub mod schedule;
pub mod session;
pub mod timeline;
pub mod types;
pub mod upload;
