//! Core infrastructure for breakwater.
//!
//! This crate provides functionality shared by the breakwater components:
//! - Panic-contained callback fan-out for breaker events and monitor alarms
//! - Shared error aliases used to carry operation faults

pub mod callbacks;
pub mod error;

pub use callbacks::{guarded, Callback, Callbacks};
pub use error::{BoxError, SharedError};
