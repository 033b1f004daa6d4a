pub mod executor;
pub mod factory;
pub mod gate;
pub mod report;
pub mod trigger;
mod unit;
