//! Error types shared across the sentinel

pub mod sentinel_error;

pub use sentinel_error::*;
