//! `getUpdates` over HTTP.

use async_trait::async_trait;
use courier_core::{Category, FetchError, FetchRequest, Update, UpdateSource};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default Bot API base URL.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Pull-mode source calling the Bot API `getUpdates` method.
///
/// Each request carries a client-side timeout of [`FetchRequest::deadline`].
/// A healthy long poll answers before it, so running into it is reported as a
/// transport failure.
#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct GetUpdates<'a> {
    offset: i64,
    limit: u32,
    timeout: u64,
    #[serde(skip_serializing_if = "all_categories")]
    allowed_updates: &'a [Category],
}

// An empty list asks the server for every category.
fn all_categories(categories: &&[Category]) -> bool {
    categories.is_empty()
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
    error_code: Option<i64>,
    description: Option<String>,
}

impl HttpSource {
    /// Source for `token` against the public Bot API.
    pub fn new(token: &str) -> Self {
        Self::with_api_url(DEFAULT_API_URL, token)
    }

    /// Source for `token` against a custom Bot API server.
    pub fn with_api_url(api_url: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/bot{}/getUpdates", api_url.trim_end_matches('/'), token),
        }
    }

    /// Use a preconfigured client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

impl fmt::Debug for HttpSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The endpoint embeds the token.
        f.debug_struct("HttpSource").finish_non_exhaustive()
    }
}

// Strip the URL so the token never reaches the logs.
fn transport(err: reqwest::Error) -> FetchError {
    FetchError::Transport(Box::new(err.without_url()))
}

#[async_trait]
impl UpdateSource for HttpSource {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Update>, FetchError> {
        let body = GetUpdates {
            offset: request.offset,
            limit: request.limit,
            timeout: request.timeout.as_secs(),
            allowed_updates: &request.allowed_updates,
        };

        let response: ApiResponse = self
            .client
            .post(&self.endpoint)
            .timeout(request.deadline())
            .json(&body)
            .send()
            .await
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;

        if !response.ok {
            return Err(FetchError::Api {
                code: response.error_code.unwrap_or_default(),
                description: response.description.unwrap_or_default(),
            });
        }
        Ok(response.result)
    }
}
