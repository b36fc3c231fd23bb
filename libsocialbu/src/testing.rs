//! In-memory API fake for tests
//!
//! `FakeSocialBu` implements [`SocialBuApi`] without any network, recording
//! every publish and upload so tests can assert on what would have been
//! sent. Seed it with accounts and posts, script one-shot failures, and use
//! the `assert_*` helpers for common checks.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::builder::PostBuilder;
use crate::client::{CreatePostRequest, SocialBuApi};
use crate::error::{Result, SocialBuError};
use crate::types::{Account, MediaUpload, Post, PostStatus, DATETIME_FORMAT};

/// In-memory stand-in for the HTTP client.
#[derive(Debug)]
pub struct FakeSocialBu {
    default_account_ids: Vec<u64>,
    accounts: Mutex<HashMap<u64, Account>>,
    posts: Mutex<HashMap<u64, Post>>,
    published: Mutex<Vec<Value>>,
    uploads: Mutex<Vec<String>>,
    next_post_id: AtomicU64,
    next_upload_id: AtomicU64,
    fail_next_publish: Mutex<Option<SocialBuError>>,
    fail_next_upload: Mutex<Option<SocialBuError>>,
}

impl Default for FakeSocialBu {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSocialBu {
    pub fn new() -> Self {
        Self {
            default_account_ids: vec![1, 2, 3],
            accounts: Mutex::new(HashMap::new()),
            posts: Mutex::new(HashMap::new()),
            published: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            next_post_id: AtomicU64::new(1),
            next_upload_id: AtomicU64::new(1),
            fail_next_publish: Mutex::new(None),
            fail_next_upload: Mutex::new(None),
        }
    }

    /// Override the default target accounts (initially `[1, 2, 3]`).
    pub fn with_default_accounts(mut self, ids: Vec<u64>) -> Self {
        self.default_account_ids = ids;
        self
    }

    /// Seed accounts for `fetch_account` to return.
    pub fn with_accounts(self, accounts: impl IntoIterator<Item = Account>) -> Self {
        {
            let mut map = self.accounts.lock().unwrap();
            for account in accounts {
                map.insert(account.id, account);
            }
        }
        self
    }

    /// Seed posts for lookup.
    pub fn with_posts(self, posts: impl IntoIterator<Item = Post>) -> Self {
        {
            let mut map = self.posts.lock().unwrap();
            for post in posts {
                map.insert(post.id, post);
            }
        }
        self
    }

    /// Make the next `create_post` call fail with the given error.
    pub fn fail_next_publish(&self, error: SocialBuError) {
        *self.fail_next_publish.lock().unwrap() = Some(error);
    }

    /// Make the next `upload_media` call fail with the given error.
    pub fn fail_next_upload(&self, error: SocialBuError) {
        *self.fail_next_upload.lock().unwrap() = Some(error);
    }

    /// Start composing a post against the fake.
    pub fn compose(&self) -> PostBuilder<'_> {
        PostBuilder::new(self)
    }

    /// Payloads recorded by `create_post`, oldest first.
    pub fn published(&self) -> Vec<Value> {
        self.published.lock().unwrap().clone()
    }

    /// Sources passed to `upload_media`, oldest first.
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    // ========================================================================
    // Assertions
    // ========================================================================

    /// Panic unless some recorded publish contains `fragment` in its content.
    pub fn assert_published(&self, fragment: &str) {
        let published = self.published.lock().unwrap();
        let found = published.iter().any(|payload| {
            payload
                .get("content")
                .and_then(Value::as_str)
                .is_some_and(|content| content.contains(fragment))
        });
        assert!(
            found,
            "expected a published post containing {:?}; recorded: {:?}",
            fragment, *published
        );
    }

    pub fn assert_published_count(&self, expected: usize) {
        let published = self.published.lock().unwrap();
        assert_eq!(
            published.len(),
            expected,
            "expected {} published posts, recorded {}",
            expected,
            published.len()
        );
    }

    pub fn assert_nothing_published(&self) {
        self.assert_published_count(0);
    }

    /// Panic unless some recorded publish targeted exactly `ids` (in order).
    pub fn assert_published_to(&self, ids: &[u64]) {
        let expected = json!(ids);
        let published = self.published.lock().unwrap();
        let found = published
            .iter()
            .any(|payload| payload.get("accounts") == Some(&expected));
        assert!(
            found,
            "expected a publish to accounts {:?}; recorded: {:?}",
            ids, *published
        );
    }

    /// Panic unless some recorded upload source contains `fragment`.
    pub fn assert_uploaded(&self, fragment: &str) {
        let uploads = self.uploads.lock().unwrap();
        assert!(
            uploads.iter().any(|source| source.contains(fragment)),
            "expected an upload containing {:?}; recorded: {:?}",
            fragment,
            *uploads
        );
    }

    pub fn assert_uploaded_count(&self, expected: usize) {
        let uploads = self.uploads.lock().unwrap();
        assert_eq!(
            uploads.len(),
            expected,
            "expected {} uploads, recorded {}",
            expected,
            uploads.len()
        );
    }
}

#[async_trait]
impl SocialBuApi for FakeSocialBu {
    fn default_account_ids(&self) -> Vec<u64> {
        self.default_account_ids.clone()
    }

    async fn fetch_account(&self, account_id: u64) -> Result<Account> {
        self.accounts
            .lock()
            .unwrap()
            .get(&account_id)
            .cloned()
            .ok_or_else(|| SocialBuError::NotFound {
                message: format!("Account {} not found", account_id),
                response: None,
                request: None,
            })
    }

    async fn upload_media(&self, source: &str) -> Result<MediaUpload> {
        if let Some(error) = self.fail_next_upload.lock().unwrap().take() {
            return Err(error);
        }

        self.uploads.lock().unwrap().push(source.to_string());

        let id = self.next_upload_id.fetch_add(1, Ordering::SeqCst);
        let name = Path::new(source)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.to_string());

        Ok(MediaUpload {
            upload_token: format!("fake-token-{}", id),
            key: format!("uploads/fake-{}", id),
            url: format!("https://fake-cdn.example.com/fake-{}", id),
            secure_key: format!("fake-secure-{}", id),
            mime_type: "image/jpeg".to_string(),
            name,
        })
    }

    async fn create_post(&self, request: CreatePostRequest) -> Result<Post> {
        if let Some(error) = self.fail_next_publish.lock().unwrap().take() {
            return Err(error);
        }

        let payload = request.to_payload();
        self.published.lock().unwrap().push(payload);

        let status = if request.draft {
            PostStatus::Draft
        } else if request.publish_at.is_some() {
            PostStatus::Scheduled
        } else {
            PostStatus::Published
        };

        let id = self.next_post_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now().naive_utc();
        let post = Post {
            id,
            content: request.content,
            status,
            account_ids: request.account_ids,
            publish_at: request
                .publish_at
                .as_deref()
                .and_then(|raw| chrono::NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT).ok()),
            attachments: request.attachments,
            created_at: now,
            updated_at: Some(now),
        };

        self.posts.lock().unwrap().insert(id, post.clone());
        Ok(post)
    }
}
