//! Exchange adapters and the manager that coordinates them

pub mod adapter;
pub mod simulated;
pub mod manager;

pub use adapter::*;
pub use simulated::*;
pub use manager::*;
