pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Connect, Id, Keygen, Version};
