//! Network helpers

pub mod retry;

pub use retry::*;
