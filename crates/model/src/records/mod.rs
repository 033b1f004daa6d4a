pub mod batch;
pub mod handle;
pub mod row;
