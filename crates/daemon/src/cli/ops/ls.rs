use clap::Args;
use diskfs_daemon::vfs::{FilesystemProjection, FsError};

use crate::cli::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Remote directory to list (defaults to root)
    #[arg(default_value = "/")]
    pub path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LsError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("{0}")]
    Fs(#[from] FsError),
}

async fn list(projection: FilesystemProjection, path: String) -> Result<String, FsError> {
    let names = projection.readdir(&path).await?;
    if names.is_empty() {
        return Ok("No items found".to_string());
    }

    let mut lines = Vec::with_capacity(names.len());
    for name in names {
        let child = FilesystemProjection::child_path(&path, &name);
        // Listing already cached every child's attributes
        match projection.getattr(&child).await {
            Ok(attrs) => {
                let kind = if attrs.is_directory { "dir" } else { "file" };
                lines.push(format!("{:<4} {:>12}  {}", kind, attrs.size_bytes, name));
            }
            Err(FsError::NotFound(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(lines.join("\n"))
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Ls {
    type Error = LsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let path = self.path.clone();
        let output = ctx
            .with_scratch_projection(|projection| list(projection, path))
            .await??;
        Ok(output)
    }
}
