//! Circuit breakers and the registry that scopes them

pub mod kind;
pub mod circuit;
pub mod registry;

pub use kind::*;
pub use circuit::*;
pub use registry::*;
