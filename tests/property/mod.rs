//! Property-based tests, one module per component.

mod monitor;
