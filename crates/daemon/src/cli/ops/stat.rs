use clap::Args;
use diskfs_daemon::vfs::{FileAttributes, FsError};

use crate::cli::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct Stat {
    /// Remote path to inspect
    pub path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StatError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("{0}")]
    Fs(#[from] FsError),
}

fn render(path: &str, attrs: &FileAttributes) -> String {
    let kind = if attrs.is_directory {
        "directory"
    } else {
        "regular file"
    };
    format!(
        "File: {}\nType: {}\nSize: {} bytes\nMode: {:o}\nLinks: {}\nUid: {}  Gid: {}\nCreated: {}\nModified: {}\nAccessed: {}",
        path,
        kind,
        attrs.size_bytes,
        attrs.mode(),
        attrs.link_count,
        attrs.owner_uid,
        attrs.owner_gid,
        attrs.created_at,
        attrs.modified_at,
        attrs.accessed_at,
    )
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Stat {
    type Error = StatError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let path = self.path.clone();
        let attrs = ctx
            .with_scratch_projection(|projection| async move { projection.getattr(&path).await })
            .await??;
        Ok(render(&self.path, &attrs))
    }
}
