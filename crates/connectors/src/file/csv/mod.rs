pub mod error;
pub mod staging;
