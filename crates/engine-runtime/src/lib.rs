pub mod error;
pub mod execution;
pub mod maintenance;
