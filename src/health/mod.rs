//! Exchange health records and the monitor that maintains them

pub mod record;
pub mod book;
pub mod monitor;

pub use record::*;
pub use book::*;
pub use monitor::*;
