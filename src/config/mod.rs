//! Configuration management for the sentinel

pub mod settings;

pub use settings::*;
