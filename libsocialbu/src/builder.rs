//! Fluent post composition
//!
//! A [`PostBuilder`] accumulates post fields, validates them locally and
//! against each target account's capabilities, uploads pending media through
//! the pipeline, and finally delegates creation to the API. It is created
//! fresh per compose operation and consumed by [`PostBuilder::send`] or
//! [`PostBuilder::dry_run`].

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::capabilities;
use crate::client::{CreatePostRequest, SocialBuApi};
use crate::error::{Result, SocialBuError};
use crate::types::{Account, Post, DATETIME_FORMAT};

/// A schedule time in any accepted input shape, normalized to the API's
/// `YYYY-MM-DD HH:MM:SS` wire format.
pub trait IntoScheduleTime {
    fn into_schedule_time(self) -> String;
}

impl IntoScheduleTime for String {
    fn into_schedule_time(self) -> String {
        self
    }
}

impl IntoScheduleTime for &str {
    fn into_schedule_time(self) -> String {
        self.to_string()
    }
}

impl IntoScheduleTime for DateTime<Utc> {
    fn into_schedule_time(self) -> String {
        self.format(DATETIME_FORMAT).to_string()
    }
}

impl IntoScheduleTime for NaiveDateTime {
    fn into_schedule_time(self) -> String {
        self.format(DATETIME_FORMAT).to_string()
    }
}

/// Fluent accumulator for a draft post.
pub struct PostBuilder<'a> {
    api: &'a dyn SocialBuApi,
    content: String,
    media_sources: Vec<String>,
    account_ids: Vec<u64>,
    accounts: HashMap<u64, Account>,
    publish_at: Option<String>,
    draft: bool,
    postback_url: Option<String>,
    options: Option<Value>,
}

impl<'a> PostBuilder<'a> {
    pub fn new(api: &'a dyn SocialBuApi) -> Self {
        Self {
            api,
            content: String::new(),
            media_sources: Vec::new(),
            account_ids: Vec::new(),
            accounts: HashMap::new(),
            publish_at: None,
            draft: false,
            postback_url: None,
            options: None,
        }
    }

    /// Set the post content.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Add one media source: a local file path or a remote URL.
    /// Can be called repeatedly; upload order follows attachment order.
    pub fn media(mut self, source: impl Into<String>) -> Self {
        self.media_sources.push(source.into());
        self
    }

    /// Add target account IDs. Merged across calls; duplicates are dropped
    /// at resolution time, preserving first occurrence order.
    pub fn to(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.account_ids.extend(ids);
        self
    }

    /// Add pre-fetched accounts as targets.
    ///
    /// Capability validation uses these directly instead of fetching them
    /// from the API; their IDs are also added to the target set.
    pub fn to_accounts(mut self, accounts: impl IntoIterator<Item = Account>) -> Self {
        for account in accounts {
            self.account_ids.push(account.id);
            self.accounts.insert(account.id, account);
        }
        self
    }

    /// Schedule the post for an absolute future time.
    pub fn scheduled_at(mut self, datetime: impl IntoScheduleTime) -> Self {
        self.publish_at = Some(datetime.into_schedule_time());
        self
    }

    /// Alias for [`PostBuilder::scheduled_at`].
    pub fn schedule(self, datetime: impl IntoScheduleTime) -> Self {
        self.scheduled_at(datetime)
    }

    /// Save as draft instead of publishing.
    pub fn as_draft(mut self) -> Self {
        self.draft = true;
        self
    }

    /// Set the postback URL for status webhooks.
    pub fn postback_url(mut self, url: impl Into<String>) -> Self {
        self.postback_url = Some(url.into());
        self
    }

    /// Set platform-specific options (e.g. a title for link posts).
    pub fn options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }

    /// Validate required fields and return the payload that would be sent,
    /// without any network calls or uploads.
    ///
    /// Capability validation is intentionally skipped here (it may need
    /// account fetches), so a passing dry run does not guarantee a
    /// subsequent [`PostBuilder::send`] will pass.
    pub fn dry_run(self) -> Result<Value> {
        self.validate()?;

        let mut map = Map::new();
        map.insert("content".to_string(), json!(self.content));
        map.insert("accounts".to_string(), json!(self.resolve_account_ids()));
        if let Some(publish_at) = &self.publish_at {
            map.insert("publish_at".to_string(), json!(publish_at));
        }
        if !self.media_sources.is_empty() {
            map.insert("pending_uploads".to_string(), json!(self.media_sources));
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
        Ok(Value::Object(map))
    }

    /// Validate, upload pending media in order, and create the post.
    ///
    /// Steps run strictly in sequence; the first failure aborts the rest
    /// and surfaces to the caller.
    pub async fn send(self) -> Result<Post> {
        self.validate()?;
        self.validate_account_capabilities().await?;

        let attachments = self.upload_media().await?;

        let request = CreatePostRequest {
            content: self.content,
            account_ids: resolve_ids(&self.account_ids, || self.api.default_account_ids()),
            publish_at: self.publish_at,
            attachments,
            draft: self.draft,
            postback_url: self.postback_url,
            options: self.options,
        };

        self.api.create_post(request).await
    }

    /// Target account IDs: explicit ones de-duplicated in first-seen order,
    /// falling back to the client's configured defaults.
    fn resolve_account_ids(&self) -> Vec<u64> {
        resolve_ids(&self.account_ids, || self.api.default_account_ids())
    }

    /// Required-field validation on locally available state only.
    fn validate(&self) -> Result<()> {
        let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();

        if self.content.trim().is_empty() {
            errors.insert(
                "content".to_string(),
                vec!["Content is required.".to_string()],
            );
        }

        if self.resolve_account_ids().is_empty() {
            errors.insert(
                "accounts".to_string(),
                vec!["At least one account ID is required.".to_string()],
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SocialBuError::local_validation("Validation failed.", errors))
        }
    }

    /// Check content and media against each target account's capabilities.
    ///
    /// Pre-supplied accounts are used as-is; the rest are fetched once each.
    /// Errors accumulate across all accounts before failing.
    async fn validate_account_capabilities(&self) -> Result<()> {
        let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for account_id in self.resolve_account_ids() {
            let fetched;
            let account = match self.accounts.get(&account_id) {
                Some(account) => account,
                None => {
                    fetched = self.api.fetch_account(account_id).await?;
                    &fetched
                }
            };

            capabilities::check_account(
                &self.content,
                self.media_sources.len(),
                account,
                &mut errors,
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SocialBuError::local_validation(
                "Account capability validation failed.",
                errors,
            ))
        }
    }

    /// Upload pending media in attachment order.
    async fn upload_media(&self) -> Result<Option<Vec<Value>>> {
        if self.media_sources.is_empty() {
            return Ok(None);
        }

        let mut attachments = Vec::with_capacity(self.media_sources.len());
        for source in &self.media_sources {
            debug!(source, "uploading media");
            let upload = self.api.upload_media(source).await?;
            attachments.push(upload.to_attachment());
        }
        Ok(Some(attachments))
    }
}

/// De-duplicate preserving first occurrence order; fall back to defaults
/// when no explicit IDs were given.
fn resolve_ids(explicit: &[u64], defaults: impl FnOnce() -> Vec<u64>) -> Vec<u64> {
    if explicit.is_empty() {
        return defaults();
    }

    let mut seen = HashSet::new();
    explicit
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}
