use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use common::remote::{DiskClient, RemoteError};
use diskfs_daemon::state::{AppState, StateError};
use diskfs_daemon::vfs::{FilesystemProjection, FsError, VfsConfig};

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("remote client error: {0}")]
    Remote(#[from] RemoteError),
    #[error("failed to set up projection: {0}")]
    Projection(#[from] FsError),
}

#[derive(Clone)]
pub struct OpContext {
    /// Optional custom config path (defaults to ~/.diskfs)
    pub config_path: Option<PathBuf>,
}

impl OpContext {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }

    pub fn load_state(&self) -> Result<AppState, StateError> {
        AppState::load(self.config_path.clone())
    }

    /// Build a projection over the configured remote account
    pub fn projection(
        &self,
        state: &AppState,
        vfs_config: &VfsConfig,
    ) -> Result<FilesystemProjection, ContextError> {
        let base_url = state.config.base_url()?;
        let token = state.config.token();
        let client = DiskClient::new(&base_url, token.as_deref())?;
        Ok(FilesystemProjection::new(Arc::new(client), vfs_config)?)
    }

    /// Run `f` against a projection whose chunk directory is private to
    /// this process, so one-shot commands never purge a live mount's cache
    pub async fn with_scratch_projection<T, F, Fut>(&self, f: F) -> Result<T, ContextError>
    where
        F: FnOnce(FilesystemProjection) -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let state = self.load_state()?;
        let mut vfs_config = state.config.vfs_config()?;
        vfs_config.chunk_dir = vfs_config
            .chunk_dir
            .join(format!("cli-{}", std::process::id()));
        let scratch = vfs_config.chunk_dir.clone();

        let projection = self.projection(&state, &vfs_config)?;
        let output = f(projection).await;

        if let Err(e) = std::fs::remove_dir_all(&scratch) {
            tracing::debug!("failed to remove scratch chunk dir {:?}: {}", scratch, e);
        }
        Ok(output)
    }
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
