//! Adapters - Concrete implementations of ports.

pub mod memory;

#[cfg(feature = "aws")]
pub mod aws;

#[cfg(feature = "local")]
pub mod local;
