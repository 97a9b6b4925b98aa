use clap::Args;
use diskfs_daemon::vfs::{FilesystemProjection, FsError};

use crate::cli::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct Cat {
    /// Remote file to read
    pub path: String,

    /// Byte offset to start reading at
    #[arg(long, default_value_t = 0)]
    pub offset: u64,

    /// Number of bytes to read (defaults to the rest of the file)
    #[arg(long)]
    pub length: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("{0}")]
    Fs(#[from] FsError),
}

async fn read_all(
    projection: FilesystemProjection,
    path: String,
    offset: u64,
    length: Option<u64>,
) -> Result<Vec<u8>, FsError> {
    let fh = projection.open(&path).await?;
    let window = projection.chunks().chunk_size().min(u32::MAX as u64);

    let mut data = Vec::new();
    let mut cursor = offset;
    let result = loop {
        let wanted = match length {
            Some(len) => offset.saturating_add(len).saturating_sub(cursor).min(window),
            None => window,
        };
        if wanted == 0 {
            break Ok(());
        }

        match projection.read(fh, cursor, wanted as u32, None).await {
            Ok(bytes) if bytes.is_empty() => break Ok(()),
            Ok(bytes) => {
                cursor += bytes.len() as u64;
                data.extend_from_slice(&bytes);
            }
            Err(e) => break Err(e),
        }
    };

    projection.release(fh);
    result.map(|()| data)
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Cat {
    type Error = CatError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let path = self.path.clone();
        let (offset, length) = (self.offset, self.length);
        let bytes = ctx
            .with_scratch_projection(|projection| read_all(projection, path, offset, length))
            .await??;

        // Text is printed as-is, binary content as hex
        match String::from_utf8(bytes) {
            Ok(text) => Ok(text),
            Err(e) => Ok(e
                .into_bytes()
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ")),
        }
    }
}
