use crate::config::RemoteConfig;
use crate::error::{RemoteError, SyncError, SyncResult};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, Url};
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Authenticated HTTP client with a cap on concurrent requests.
pub struct RemoteClient {
    http: Client,
    base_url: String,
    origin: Url,
    auth_header: String,
    page_size: Option<u32>,
    permits: Semaphore,
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl RemoteClient {
    pub fn new(config: &RemoteConfig) -> SyncResult<Self> {
        config.validate()?;
        if !config.verify_tls {
            warn!(
                base_url = %config.base_url,
                "TLS certificate verification is disabled for the remote system"
            );
        }

        let http = Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        let origin = Url::parse(&base_url)
            .map_err(|e| SyncError::Config(format!("invalid base URL `{base_url}`: {e}")))?;

        Ok(Self {
            http,
            base_url,
            origin,
            auth_header: config.auth_scheme.header_value(&config.token),
            page_size: config.page_size,
            permits: Semaphore::new(config.max_in_flight),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves an API path or an absolute URL returned by the server.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Resolves the `next` cursor of the page at `current`.
    ///
    /// Absolute cursors must stay on the origin of the base URL, so the
    /// auth header is never sent to another host.
    pub(crate) fn cursor(&self, current: &str, next: &str) -> Result<String, RemoteError> {
        let url = self.url(next);
        let same_origin = Url::parse(&url).is_ok_and(|u| u.origin() == self.origin.origin());
        if !same_origin {
            return Err(RemoteError::Decode {
                url: current.to_string(),
                reason: format!("pagination cursor `{url}` leaves {}", self.base_url),
            });
        }
        Ok(url)
    }

    /// URL of the first page of a collection.
    pub(crate) fn first_page(&self, path: &str) -> String {
        let url = self.url(path);
        match self.page_size {
            Some(limit) => {
                let sep = if url.contains('?') { '&' } else { '?' };
                format!("{url}{sep}limit={limit}")
            }
            None => url,
        }
    }

    pub async fn get_json(&self, url: &str) -> Result<Value, RemoteError> {
        let body = self.execute(Method::GET, url, None).await?;
        decode(url, &body)
    }

    pub async fn post_json(&self, path: &str, payload: &Value) -> Result<Value, RemoteError> {
        let url = self.url(path);
        let body = self.execute(Method::POST, &url, Some(payload)).await?;
        decode(&url, &body)
    }

    pub async fn patch_json(&self, path: &str, payload: &Value) -> Result<(), RemoteError> {
        let url = self.url(path);
        self.execute(Method::PATCH, &url, Some(payload)).await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        let url = self.url(path);
        self.execute(Method::DELETE, &url, None).await?;
        Ok(())
    }

    /// Sends one request and reads the full body while holding a permit.
    async fn execute(
        &self,
        method: Method,
        url: &str,
        payload: Option<&Value>,
    ) -> Result<String, RemoteError> {
        let _permit = self.permits.acquire().await.map_err(|_| RemoteError::Closed)?;

        let mut request = self
            .http
            .request(method.clone(), url)
            .header(AUTHORIZATION, &self.auth_header)
            .header(ACCEPT, "application/json");
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        debug!(%method, url, "remote request");
        let transport = |source: reqwest::Error| RemoteError::Transport {
            url: url.to_string(),
            source,
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;

        if !status.is_success() {
            return Err(RemoteError::Status {
                method: method.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

fn decode(url: &str, body: &str) -> Result<Value, RemoteError> {
    serde_json::from_str(body).map_err(|e| RemoteError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
