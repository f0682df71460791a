pub mod error;
pub mod types;

pub use error::{Result, TavilyError};
pub use types::{SearchDepth, SearchResult};

use std::time::Duration;

use tracing::info;
use types::{SearchRequest, SearchResponse};

const BASE_URL: &str = "https://api.tavily.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TavilyClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Run one search query. Non-success statuses and timeouts surface as
    /// `TavilyError` so callers can isolate failures per query.
    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
        depth: SearchDepth,
    ) -> Result<Vec<SearchResult>> {
        info!(query, max_results, "Tavily search");

        let body = SearchRequest {
            query,
            max_results,
            search_depth: depth,
            include_raw_content: false,
        };

        let resp = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(TavilyError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let data: SearchResponse = resp.json().await?;
        info!(query, count = data.results.len(), "Tavily search complete");
        Ok(data.results)
    }
}
