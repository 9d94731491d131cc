use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, ClientBuilder, Url};

use crate::config::ApiConfig;
use crate::error::Context;

use super::FetchResult;

/// Headers and body of a successful GET.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Thin GET-only client with the fixed headers and timeout every request needs.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(api: &ApiConfig) -> FetchResult<Self> {
        let client = client_builder(api)?
            .build()
            .context("Failed to construct HTTP client")?;
        Ok(Self::from_parts(client, &api.base_url))
    }

    pub(crate) fn from_parts(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self, resource: &str) -> FetchResult<Url> {
        let raw = format!("{}/{}", self.base_url, resource.trim_start_matches('/'));
        Ok(Url::parse(&raw).with_context(|| format!("Invalid endpoint URL {raw}"))?)
    }

    /// Issue one GET. Network failures, timeouts and non-2xx statuses all surface
    /// as [`crate::error::AppError::Transport`]; nothing is retried.
    pub async fn get(&self, resource: &str, query: &[(&str, &str)]) -> FetchResult<RawResponse> {
        let url = self.endpoint(resource)?;
        log::debug!("GET {url} {query:?}");

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await?
            .error_for_status()?;

        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse { headers, body })
    }
}

fn client_builder(api: &ApiConfig) -> FetchResult<ClientBuilder> {
    Ok(Client::builder()
        .timeout(api.timeout)
        .default_headers(build_headers(&api.user_agent)?))
}

fn build_headers(user_agent: &str) -> FetchResult<HeaderMap> {
    let mut map = HeaderMap::new();
    let agent = HeaderValue::from_str(user_agent)
        .with_context(|| format!("Invalid User-Agent header value: {user_agent}"))?;
    map.insert(USER_AGENT, agent);
    map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(map)
}
