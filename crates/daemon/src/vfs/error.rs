//! Error kinds surfaced to the kernel bridge.

/// What a filesystem call can fail with.
///
/// Transport detail is logged where the failure is mapped and never
/// carried across this boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),
    #[error("I/O error on {0}")]
    Io(String),
}

impl FsError {
    pub fn errno(&self) -> libc::c_int {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::Io(_) => libc::EIO,
        }
    }
}
