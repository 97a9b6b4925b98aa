// Projection core
pub mod vfs;

// Kernel bridge
#[cfg(feature = "fuse")]
pub mod fuse;

// App state (configuration, paths) and process setup
pub mod process;
pub mod state;

pub use state::{AppConfig, AppState, StateError};
pub use vfs::{FilesystemProjection, FsError, VfsConfig};
