use clap::Args;
use diskfs_daemon::state::{AppConfig, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Base URL of the disk REST API
    #[arg(long)]
    pub base_url: Option<String>,

    /// OAuth token to store in the config (DISKFS_TOKEN overrides it)
    #[arg(long)]
    pub token: Option<String>,

    /// Directory for cached chunks
    #[arg(long)]
    pub chunk_dir: Option<std::path::PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("state error: {0}")]
    State(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut config = AppConfig::default();
        if let Some(base_url) = &self.base_url {
            config.remote.base_url = base_url.clone();
        }
        config.remote.token = self.token.clone();
        config.cache.chunk_dir = self.chunk_dir.clone();

        // Reject a malformed URL before anything is written
        config.base_url()?;

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;
        Ok(format!(
            "Initialized diskfs directory at {}\nConfig: {}",
            state.diskfs_dir.display(),
            state.config_path.display()
        ))
    }
}
