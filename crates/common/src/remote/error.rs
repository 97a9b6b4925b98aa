use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("remote object not found: {0}")]
    NotFound(String),
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("HTTP status {0}: {1}")]
    HttpStatus(StatusCode, String),
    #[error("authorization token is not a valid header value")]
    InvalidToken,
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("no download link returned for {0}")]
    MissingDownloadLink(String),
}

impl RemoteError {
    /// Whether the remote reported the object as absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            RemoteError::NotFound(_) => true,
            RemoteError::HttpStatus(status, _) => *status == StatusCode::NOT_FOUND,
            _ => false,
        }
    }
}
