pub mod check;
pub mod pipeline;
