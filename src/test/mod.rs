//! Crate-private helpers for unit tests.

mod builder;

pub use builder::*;
