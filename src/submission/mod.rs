pub mod payload;
pub mod pipeline;
