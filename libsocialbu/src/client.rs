//! SocialBu API client
//!
//! `SocialBuClient` issues authenticated HTTP calls and maps non-2xx
//! responses onto the error taxonomy in [`crate::error`]. The narrow
//! [`SocialBuApi`] trait covers the operations the post builder needs, so
//! tests can swap in the in-memory fake from [`crate::testing`].

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::builder::PostBuilder;
use crate::config::Config;
use crate::error::{ApiRequest, Result, SocialBuError};
use crate::types::{Account, MediaUpload, PaginatedResponse, Post};

/// Everything the post builder needs from the API.
///
/// Implemented by [`SocialBuClient`] over HTTP and by
/// [`crate::testing::FakeSocialBu`] in memory.
#[async_trait]
pub trait SocialBuApi: Send + Sync {
    /// Account IDs to target when the builder was given none.
    fn default_account_ids(&self) -> Vec<u64>;

    /// Fetch a single account, including its capability fields.
    async fn fetch_account(&self, account_id: u64) -> Result<Account>;

    /// Run the media upload pipeline for a local path or remote URL.
    async fn upload_media(&self, source: &str) -> Result<MediaUpload>;

    /// Create a post from a finished builder payload.
    async fn create_post(&self, request: CreatePostRequest) -> Result<Post>;
}

/// Finished payload for the create-post endpoint.
#[derive(Debug, Clone)]
pub struct CreatePostRequest {
    pub content: String,
    pub account_ids: Vec<u64>,
    /// Absolute schedule time in `YYYY-MM-DD HH:MM:SS`.
    pub publish_at: Option<String>,
    /// `{"upload_token": ...}` entries, in attachment order.
    pub attachments: Option<Vec<Value>>,
    pub draft: bool,
    pub postback_url: Option<String>,
    pub options: Option<Value>,
}

impl CreatePostRequest {
    /// Wire payload; optional fields absent when unset, never null.
    pub fn to_payload(&self) -> Value {
        let mut map = Map::new();
        map.insert("content".to_string(), json!(self.content));
        map.insert("accounts".to_string(), json!(self.account_ids));
        if let Some(publish_at) = &self.publish_at {
            map.insert("publish_at".to_string(), json!(publish_at));
        }
        if let Some(attachments) = &self.attachments {
            map.insert("existing_attachments".to_string(), json!(attachments));
        }
        if self.draft {
            map.insert("draft".to_string(), json!(true));
        }
        if let Some(url) = &self.postback_url {
            map.insert("postback_url".to_string(), json!(url));
        }
        if let Some(options) = &self.options {
            map.insert("options".to_string(), options.clone());
        }
        Value::Object(map)
    }
}

/// HTTP client for the SocialBu REST API.
///
/// Configuration is read-only after construction; the client is cheap to
/// clone and safe to share.
#[derive(Debug, Clone)]
pub struct SocialBuClient {
    pub(crate) http: reqwest::Client,
    token: String,
    base_url: String,
    account_ids: Vec<u64>,
}

impl SocialBuClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.timeout))
            .connect_timeout(Duration::from_secs(config.http.connect_timeout))
            .build()?;

        Ok(Self {
            http,
            token: config.token.clone().unwrap_or_default(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            account_ids: config.account_ids.clone(),
        })
    }

    /// Whether the client has a token to authenticate with.
    pub fn is_configured(&self) -> bool {
        !self.token.is_empty()
    }

    /// Start composing a post against this client.
    pub fn compose(&self) -> PostBuilder<'_> {
        PostBuilder::new(self)
    }

    /// Publish content to the default accounts, optionally with one media file.
    pub async fn publish(&self, content: &str, media: Option<&str>) -> Result<Post> {
        let mut builder = self.compose().content(content);
        if let Some(path) = media {
            builder = builder.media(path);
        }
        builder.send().await
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    pub async fn list_accounts(
        &self,
        account_type: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<Vec<Account>> {
        Ok(self
            .paginate_accounts(account_type, page, per_page)
            .await?
            .items)
    }

    pub async fn get_account(&self, account_id: u64) -> Result<Account> {
        let response = self
            .get(&format!("/accounts/{}", account_id), &[])
            .await?;
        let data = unwrap_item(&response, &["account", "data"]);
        Ok(Account::from_value(&data))
    }

    pub async fn paginate_accounts(
        &self,
        account_type: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<PaginatedResponse<Account>> {
        let query = listing_query(account_type, page, per_page);
        let response = self.get("/accounts", &query).await?;
        Ok(PaginatedResponse::from_value(
            &response,
            "accounts",
            Account::from_value,
        ))
    }

    /// Walk every page and collect all accounts.
    pub async fn all_accounts(&self, account_type: Option<&str>) -> Result<Vec<Account>> {
        let mut accounts = Vec::new();
        let mut page = 1;
        loop {
            let response = self.paginate_accounts(account_type, page, 50).await?;
            let more = response.has_more_pages();
            accounts.extend(response.items);
            if !more {
                return Ok(accounts);
            }
            page += 1;
        }
    }

    // ========================================================================
    // Posts
    // ========================================================================

    pub async fn list_posts(
        &self,
        post_type: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<Vec<Post>> {
        Ok(self.paginate_posts(post_type, page, per_page).await?.items)
    }

    pub async fn get_post(&self, post_id: u64) -> Result<Post> {
        let response = self.get(&format!("/posts/{}", post_id), &[]).await?;
        let data = unwrap_item(&response, &["post", "data"]);
        Ok(Post::from_value(&data))
    }

    pub async fn paginate_posts(
        &self,
        post_type: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<PaginatedResponse<Post>> {
        let query = listing_query(post_type, page, per_page);
        let response = self.get("/posts", &query).await?;
        Ok(PaginatedResponse::from_value(
            &response,
            "posts",
            Post::from_value,
        ))
    }

    /// Walk every page and collect all posts of the given type.
    pub async fn all_posts(&self, post_type: Option<&str>) -> Result<Vec<Post>> {
        let mut posts = Vec::new();
        let mut page = 1;
        loop {
            let response = self.paginate_posts(post_type, page, 50).await?;
            let more = response.has_more_pages();
            posts.extend(response.items);
            if !more {
                return Ok(posts);
            }
            page += 1;
        }
    }

    /// Update a post. The API returns a success flag rather than the post.
    pub async fn update_post(&self, post_id: u64, data: Value) -> Result<bool> {
        let response = self.patch(&format!("/posts/{}", post_id), &data).await?;
        Ok(response
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(true))
    }

    pub async fn delete_post(&self, post_id: u64) -> Result<()> {
        self.delete(&format!("/posts/{}", post_id)).await?;
        Ok(())
    }

    // ========================================================================
    // Raw HTTP
    // ========================================================================

    pub(crate) async fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Value> {
        debug!(endpoint, "GET");
        let response = self
            .request(reqwest::Method::GET, endpoint)
            .query(query)
            .send()
            .await?;
        self.handle_response(response, "GET", endpoint, None).await
    }

    pub(crate) async fn post(&self, endpoint: &str, data: &Value) -> Result<Value> {
        debug!(endpoint, "POST");
        let response = self
            .request(reqwest::Method::POST, endpoint)
            .json(data)
            .send()
            .await?;
        self.handle_response(response, "POST", endpoint, Some(data.clone()))
            .await
    }

    pub(crate) async fn patch(&self, endpoint: &str, data: &Value) -> Result<Value> {
        debug!(endpoint, "PATCH");
        let response = self
            .request(reqwest::Method::PATCH, endpoint)
            .json(data)
            .send()
            .await?;
        self.handle_response(response, "PATCH", endpoint, Some(data.clone()))
            .await
    }

    pub(crate) async fn delete(&self, endpoint: &str) -> Result<Value> {
        debug!(endpoint, "DELETE");
        let response = self
            .request(reqwest::Method::DELETE, endpoint)
            .send()
            .await?;
        self.handle_response(response, "DELETE", endpoint, None)
            .await
    }

    fn request(&self, method: reqwest::Method, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Parse the response body and map non-2xx statuses onto the taxonomy.
    async fn handle_response(
        &self,
        response: reqwest::Response,
        method: &str,
        endpoint: &str,
        payload: Option<Value>,
    ) -> Result<Value> {
        let status = response.status();
        let retry_after = parse_retry_after(&response);
        let body: Value = response.json().await.unwrap_or_else(|_| json!({}));

        if status.is_success() {
            return Ok(body);
        }

        let message = body
            .get("message")
            .or_else(|| body.get("error"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string();
        let request = Some(ApiRequest::new(method, endpoint, payload));
        let response_body = Some(body.clone());

        Err(match status {
            StatusCode::UNAUTHORIZED => SocialBuError::Authentication {
                message,
                response: response_body,
                request,
            },
            StatusCode::NOT_FOUND => SocialBuError::NotFound {
                message,
                response: response_body,
                request,
            },
            StatusCode::UNPROCESSABLE_ENTITY => SocialBuError::Validation {
                message,
                errors: parse_error_map(&body),
                response: response_body,
                request,
            },
            StatusCode::TOO_MANY_REQUESTS => SocialBuError::RateLimit {
                message,
                retry_after,
                response: response_body,
                request,
            },
            status if status.is_server_error() => SocialBuError::Server {
                message,
                status: status.as_u16(),
                response: response_body,
                request,
            },
            status => SocialBuError::Api {
                message,
                status: status.as_u16(),
                response: response_body,
                request,
            },
        })
    }
}

#[async_trait]
impl SocialBuApi for SocialBuClient {
    fn default_account_ids(&self) -> Vec<u64> {
        self.account_ids.clone()
    }

    async fn fetch_account(&self, account_id: u64) -> Result<Account> {
        self.get_account(account_id).await
    }

    async fn upload_media(&self, source: &str) -> Result<MediaUpload> {
        self.upload_media_source(source).await
    }

    async fn create_post(&self, request: CreatePostRequest) -> Result<Post> {
        let response = self.post("/posts", &request.to_payload()).await?;

        // The API returns one post per target account; the first entry is
        // the canonical result.
        let posts = response
            .get("posts")
            .or_else(|| response.get("data"))
            .and_then(Value::as_array);
        if let Some(first) = posts.and_then(|list| list.first()) {
            return Ok(Post::from_value(first));
        }

        let fallback = response.get("post").unwrap_or(&response);
        Ok(Post::from_value(fallback))
    }
}

/// Unwrap a single-item response that may nest the payload under a key.
fn unwrap_item(response: &Value, keys: &[&str]) -> Value {
    for key in keys {
        if let Some(inner) = response.get(*key) {
            if inner.is_object() {
                return inner.clone();
            }
        }
    }
    response.clone()
}

fn listing_query(
    type_filter: Option<&str>,
    page: u64,
    per_page: u64,
) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(filter) = type_filter {
        query.push(("type", filter.to_string()));
    }
    query.push(("page", page.to_string()));
    query.push(("per_page", per_page.to_string()));
    query
}

fn parse_retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Extract a field → messages map from a 422 response body.
fn parse_error_map(body: &Value) -> BTreeMap<String, Vec<String>> {
    let mut errors = BTreeMap::new();
    if let Some(map) = body.get("errors").and_then(Value::as_object) {
        for (field, messages) in map {
            let list = match messages {
                Value::Array(items) => items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
                Value::String(single) => vec![single.clone()],
                _ => Vec::new(),
            };
            errors.insert(field.clone(), list);
        }
    }
    errors
}
