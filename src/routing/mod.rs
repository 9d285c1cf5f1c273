//! Exchange selection strategies

pub mod router;

pub use router::*;
