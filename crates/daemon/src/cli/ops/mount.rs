use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use clap::Args;
use diskfs_daemon::fuse::DiskFs;
use diskfs_daemon::process;
use diskfs_daemon::state::StateError;

use crate::cli::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct Mount {
    /// Local directory to mount the remote account at
    pub mount_point: PathBuf,

    /// Let other users access the mount (needs user_allow_other in /etc/fuse.conf)
    #[arg(long)]
    pub allow_other: bool,

    /// Unmount a previous mount at the mount point instead of mounting
    #[arg(long)]
    pub unmount: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("mount point {0:?} is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to mount at {0:?}: {1}")]
    MountFailed(PathBuf, std::io::Error),
    #[error("failed to unmount {0:?}: {1}")]
    UnmountFailed(PathBuf, String),
    #[error("failed waiting for shutdown signal: {0}")]
    Signal(std::io::Error),
}

fn unmount(mount_point: &Path) -> Result<(), MountError> {
    let failed = |e: String| MountError::UnmountFailed(mount_point.to_path_buf(), e);

    #[cfg(target_os = "linux")]
    let status = Command::new("fusermount")
        .arg("-u")
        .arg(mount_point)
        .status()
        .map_err(|e| failed(e.to_string()))?;

    #[cfg(not(target_os = "linux"))]
    let status = Command::new("umount")
        .arg(mount_point)
        .status()
        .map_err(|e| failed(e.to_string()))?;

    if !status.success() {
        return Err(failed(format!("unmount exited with {}", status)));
    }
    Ok(())
}

fn mount_options(allow_other: bool) -> Vec<fuser::MountOption> {
    let mut options = vec![
        fuser::MountOption::FSName("diskfs".to_string()),
        fuser::MountOption::Subtype("diskfs".to_string()),
        fuser::MountOption::NoAtime,
    ];
    if allow_other {
        options.push(fuser::MountOption::AllowOther);
    }
    options
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Mount {
    type Error = MountError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        if self.unmount {
            unmount(&self.mount_point)?;
            return Ok(format!("Unmounted {}", self.mount_point.display()));
        }

        if !self.mount_point.is_dir() {
            return Err(MountError::NotADirectory(self.mount_point.clone()));
        }

        let state = ctx.load_state()?;
        let _guards = process::init_logging(&state.config.log);

        let vfs_config = state.config.vfs_config()?;
        let projection = Arc::new(ctx.projection(&state, &vfs_config)?);
        tracing::info!(
            "chunk cache at {:?} (chunk size {} bytes, max {} bytes)",
            vfs_config.chunk_dir,
            vfs_config.chunk_size,
            vfs_config.max_cache_bytes
        );

        let fs = DiskFs::new(tokio::runtime::Handle::current(), projection);
        let options = mount_options(self.allow_other);

        tracing::info!("Mounting FUSE filesystem at {:?}", self.mount_point);
        let session = fuser::spawn_mount2(fs, &self.mount_point, &options)
            .map_err(|e| MountError::MountFailed(self.mount_point.clone(), e))?;

        tokio::signal::ctrl_c().await.map_err(MountError::Signal)?;
        tracing::info!("shutting down, unmounting {:?}", self.mount_point);

        // Unmounts, then waits for the session thread to exit
        session.join();

        Ok(format!("Unmounted {}", self.mount_point.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_options() {
        let options = mount_options(false);
        assert!(!options.contains(&fuser::MountOption::AllowOther));
        assert!(mount_options(true).contains(&fuser::MountOption::AllowOther));
        assert!(options.contains(&fuser::MountOption::FSName("diskfs".to_string())));
    }
}
