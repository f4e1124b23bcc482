//! Error aliases shared across breakwater crates.
//!
//! Operations wrapped by a breaker may fail with any error type. Faults are
//! erased into a [`BoxError`] at the pipeline boundary and then frozen into a
//! [`SharedError`] so that a single cause can be handed to an interceptor and
//! stored in the failure history at the same time.

use std::error::Error;
use std::sync::Arc;

/// An owned, type-erased error.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// A cheaply clonable, type-erased error.
pub type SharedError = Arc<dyn Error + Send + Sync + 'static>;

/// Converts any error convertible into a [`BoxError`] into a [`SharedError`].
pub fn share<E>(err: E) -> SharedError
where
    E: Into<BoxError>,
{
    Arc::from(err.into())
}
