//! Core data types and structures

pub mod exchange;
pub mod health;

pub use exchange::*;
pub use health::*;
