pub mod dedup;
pub mod error;
pub mod extract;
pub mod load;
pub mod retry;
pub mod transform;
pub mod watermark;
