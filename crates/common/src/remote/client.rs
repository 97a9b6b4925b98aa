use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RANGE};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::error::RemoteError;
use super::resource::{ApiErrorBody, DownloadLink, Resource};
use super::{RangeResponse, RemoteEntry, RemoteMetadata, RemoteStore};

/// Number of children requested per listing page
const LIST_PAGE_SIZE: u64 = 100;

/// HTTP client for a disk-style REST API (`resources`, `resources/download`).
#[derive(Debug, Clone)]
pub struct DiskClient {
    pub remote: Url,
    /// Authorized client for the API itself
    client: Client,
    /// Unauthenticated client for download links, which point at other hosts
    transfer: Client,
}

impl DiskClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://cloud-api.yandex.net/v1/disk/";

    pub fn new(remote: &Url, token: Option<&str>) -> Result<Self, RemoteError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("OAuth {}", token))
                .map_err(|_| RemoteError::InvalidToken)?;
            default_headers.insert(AUTHORIZATION, value);
        }
        let client = Client::builder().default_headers(default_headers).build()?;
        let transfer = Client::builder().build()?;

        // Url::join replaces the last segment unless the base ends in a slash
        let mut remote = remote.clone();
        if !remote.path().ends_with('/') {
            let path = format!("{}/", remote.path());
            remote.set_path(&path);
        }

        Ok(Self {
            remote,
            client,
            transfer,
        })
    }

    /// Get the base URL for API requests
    pub fn base_url(&self) -> &Url {
        &self.remote
    }

    fn endpoint(&self, name: &str, params: &[(&str, String)]) -> Result<Url, RemoteError> {
        let mut url = self.remote.join(name)?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        Ok(url)
    }

    /// Turn a non-success response into an error, decoding the API error body when present.
    async fn check(response: Response, path: &str) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(path.to_string()));
        }

        let text = response.text().await?;
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|body| body.to_string())
            .unwrap_or(text);
        Err(RemoteError::HttpStatus(status, message))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, path: &str) -> Result<T, RemoteError> {
        let response = self.client.get(url).send().await?;
        let response = Self::check(response, path).await?;
        Ok(response.json::<T>().await?)
    }

    /// Fetch one page of a resource description.
    pub async fn get_resource(
        &self,
        path: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Resource, RemoteError> {
        let url = self.endpoint(
            "resources",
            &[
                ("path", path.to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ],
        )?;
        self.get_json(url, path).await
    }

    /// Resolve the short-lived download link for a file.
    pub async fn download_link(&self, path: &str) -> Result<Url, RemoteError> {
        let url = self.endpoint("resources/download", &[("path", path.to_string())])?;
        let link: DownloadLink = self.get_json(url, path).await?;
        let href = link
            .href
            .ok_or_else(|| RemoteError::MissingDownloadLink(path.to_string()))?;
        Ok(Url::parse(&href)?)
    }
}

#[async_trait::async_trait]
impl RemoteStore for DiskClient {
    async fn fetch_metadata(&self, path: &str) -> Result<RemoteMetadata, RemoteError> {
        tracing::debug!("fetching metadata for {}", path);
        let resource = self.get_resource(path, 0, 0).await?;
        Ok(resource.to_metadata())
    }

    async fn list_children(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let mut entries = Vec::new();
        let mut offset = 0;

        loop {
            tracing::debug!("listing {} (offset {})", path, offset);
            let resource = self.get_resource(path, LIST_PAGE_SIZE, offset).await?;
            let page = resource
                .embedded
                .ok_or_else(|| RemoteError::NotADirectory(path.to_string()))?;

            if page.items.is_empty() {
                break;
            }
            offset += page.items.len() as u64;
            entries.extend(page.items.iter().map(Resource::to_entry));

            if offset >= page.total {
                break;
            }
        }

        Ok(entries)
    }

    async fn fetch_range(
        &self,
        path: &str,
        start: u64,
        end: u64,
    ) -> Result<RangeResponse, RemoteError> {
        let href = self.download_link(path).await?;
        tracing::debug!("range download for {}: bytes={}-{}", path, start, end);

        let response = self
            .transfer
            .get(href)
            .header(RANGE, format!("bytes={}-{}", start, end))
            .send()
            .await?;
        let status = response.status();
        let data = response.bytes().await?;

        Ok(RangeResponse { status, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let base = Url::parse("https://cloud-api.example.net/v1/disk").unwrap();
        let client = DiskClient::new(&base, Some("token")).unwrap();
        assert_eq!(client.base_url().as_str(), "https://cloud-api.example.net/v1/disk/");
    }

    #[test]
    fn test_endpoint_encodes_path() {
        let base = Url::parse(DiskClient::DEFAULT_BASE_URL).unwrap();
        let client = DiskClient::new(&base, None).unwrap();
        let url = client
            .endpoint("resources", &[("path", "/my docs/a&b.txt".to_string())])
            .unwrap();
        assert_eq!(url.path(), "/v1/disk/resources");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![("path".to_string(), "/my docs/a&b.txt".to_string())]
        );
    }

    #[test]
    fn test_invalid_token_rejected() {
        let base = Url::parse(DiskClient::DEFAULT_BASE_URL).unwrap();
        let result = DiskClient::new(&base, Some("bad\ntoken"));
        assert!(matches!(result, Err(RemoteError::InvalidToken)));
    }
}
