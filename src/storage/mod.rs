//! Data persistence and file operations

pub mod status;

pub use status::*;
