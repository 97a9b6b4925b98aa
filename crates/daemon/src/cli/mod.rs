pub mod args;
pub mod op;
pub mod ops;

#[cfg(feature = "fuse")]
pub use ops::Mount;
pub use ops::{Cat, Init, Ls, Stat, Version};
