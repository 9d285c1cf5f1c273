//! Alert sink capability and its implementations

pub mod sink;
pub mod logger;
pub mod throttle;
pub mod memory;

pub use sink::*;
pub use logger::*;
pub use throttle::*;
pub use memory::*;
