//! Rolling volatility used by market sampling

pub mod calculator;

pub use calculator::*;
