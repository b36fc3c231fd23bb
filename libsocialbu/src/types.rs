//! Core data types for the SocialBu API
//!
//! The API is loose about field naming (snake_case, camelCase and a few
//! historical spellings coexist), so every type parses from a
//! `serde_json::Value` through an explicit ordered list of accepted key
//! aliases, and re-serializes omitting absent optional fields.

use chrono::{NaiveDateTime, Utc};
use serde_json::{json, Map, Value};

/// First non-null value among the listed keys, in order.
pub(crate) fn pick<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| map.get(*key).filter(|v| !v.is_null()))
}

pub(crate) fn pick_str(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    pick(map, keys).and_then(|v| v.as_str()).map(str::to_string)
}

pub(crate) fn pick_u64(map: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    pick(map, keys).and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    })
}

pub(crate) fn pick_bool(map: &Map<String, Value>, keys: &[&str]) -> Option<bool> {
    pick(map, keys).and_then(Value::as_bool)
}

pub(crate) fn as_object(value: &Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// Wire format used by the API for timestamps.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse an API timestamp, accepting the server-local wire format and RFC 3339.
pub(crate) fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_utc())
        })
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok())
}

// ============================================================================
// Account
// ============================================================================

/// A connected social destination and its declared capabilities.
///
/// Immutable value object; fetched on demand or supplied pre-fetched to the
/// post builder to skip the capability lookup round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: u64,
    pub name: String,
    /// Platform type, dot-qualified subtypes allowed (e.g. `facebook.page`).
    pub account_type: String,
    pub status: String,
    pub username: Option<String>,
    pub profile_url: Option<String>,
    pub avatar_url: Option<String>,
    pub extra_data: Option<Value>,
    /// Max post length in characters. `None` means unlimited.
    pub post_max_length: Option<u32>,
    /// Max attachments per post. `None` means unlimited.
    pub max_attachments: Option<u32>,
    /// Allowed attachment file types, informational.
    pub attachment_types: Option<Vec<String>>,
    /// Tri-state: `Some(true)`/`Some(false)` are explicit, `None` means
    /// "infer from platform type".
    pub post_media_required: Option<bool>,
}

impl Account {
    pub fn from_value(value: &Value) -> Self {
        let map = as_object(value);

        let status = pick_str(&map, &["status"]).unwrap_or_else(|| {
            match pick_bool(&map, &["active"]) {
                Some(true) | None => "active".to_string(),
                Some(false) => "inactive".to_string(),
            }
        });

        Self {
            id: pick_u64(&map, &["id"]).unwrap_or(0),
            name: pick_str(&map, &["name"]).unwrap_or_default(),
            account_type: pick_str(&map, &["type", "platform"])
                .unwrap_or_else(|| "unknown".to_string()),
            status,
            username: pick_str(&map, &["username"]),
            profile_url: pick_str(&map, &["profile_url", "profileUrl"]),
            avatar_url: pick_str(&map, &["avatar_url", "avatarUrl", "avatar", "image"]),
            extra_data: pick(&map, &["extra_data", "extraData"]).cloned(),
            post_max_length: pick_u64(&map, &["post_maxlength", "postMaxLength"])
                .map(|v| v as u32),
            max_attachments: pick_u64(&map, &["max_attachments", "maxAttachments"])
                .map(|v| v as u32),
            attachment_types: pick(&map, &["attachment_types", "attachmentTypes"]).and_then(
                |v| {
                    v.as_array().map(|items| {
                        items
                            .iter()
                            .filter_map(|item| item.as_str().map(str::to_string))
                            .collect()
                    })
                },
            ),
            post_media_required: pick_bool(&map, &["post_media_required", "postMediaRequired"]),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".to_string(), json!(self.id));
        map.insert("name".to_string(), json!(self.name));
        map.insert("type".to_string(), json!(self.account_type));
        map.insert("status".to_string(), json!(self.status));
        if let Some(username) = &self.username {
            map.insert("username".to_string(), json!(username));
        }
        if let Some(profile_url) = &self.profile_url {
            map.insert("profile_url".to_string(), json!(profile_url));
        }
        if let Some(avatar_url) = &self.avatar_url {
            map.insert("avatar_url".to_string(), json!(avatar_url));
        }
        if let Some(extra_data) = &self.extra_data {
            map.insert("extra_data".to_string(), extra_data.clone());
        }
        if let Some(limit) = self.post_max_length {
            map.insert("post_maxlength".to_string(), json!(limit));
        }
        if let Some(limit) = self.max_attachments {
            map.insert("max_attachments".to_string(), json!(limit));
        }
        if let Some(types) = &self.attachment_types {
            map.insert("attachment_types".to_string(), json!(types));
        }
        if let Some(required) = self.post_media_required {
            map.insert("post_media_required".to_string(), json!(required));
        }
        Value::Object(map)
    }

    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    fn is_type(&self, base: &str) -> bool {
        self.account_type == base
            || self
                .account_type
                .strip_prefix(base)
                .is_some_and(|rest| rest.starts_with('.'))
    }

    pub fn is_facebook(&self) -> bool {
        self.is_type("facebook")
    }

    pub fn is_instagram(&self) -> bool {
        self.is_type("instagram")
    }

    pub fn is_twitter(&self) -> bool {
        self.is_type("twitter") || self.is_type("x")
    }

    pub fn is_linkedin(&self) -> bool {
        self.is_type("linkedin")
    }

    pub fn is_tiktok(&self) -> bool {
        self.is_type("tiktok")
    }

    pub fn is_pinterest(&self) -> bool {
        self.is_type("pinterest")
    }

    /// Whether a post to this account must carry media.
    ///
    /// An explicit `post_media_required` flag wins; when unset, media-first
    /// platforms (Instagram, TikTok, Pinterest) require it by convention.
    pub fn requires_media(&self) -> bool {
        match self.post_media_required {
            Some(required) => required,
            None => self.is_instagram() || self.is_tiktok() || self.is_pinterest(),
        }
    }
}

// ============================================================================
// Post
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
    AwaitingApproval,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
            PostStatus::AwaitingApproval => "awaiting_approval",
            PostStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(PostStatus::Draft),
            "scheduled" => Some(PostStatus::Scheduled),
            "published" => Some(PostStatus::Published),
            "awaiting_approval" => Some(PostStatus::AwaitingApproval),
            "failed" => Some(PostStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A created or fetched post.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: u64,
    pub content: String,
    pub status: PostStatus,
    pub account_ids: Vec<u64>,
    pub publish_at: Option<NaiveDateTime>,
    pub attachments: Option<Vec<Value>>,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

impl Post {
    pub fn from_value(value: &Value) -> Self {
        let map = as_object(value);

        let status = pick_str(&map, &["status"])
            .and_then(|raw| PostStatus::parse(&raw))
            .unwrap_or_else(|| Self::derive_status(&map));

        Self {
            id: pick_u64(&map, &["id"]).unwrap_or(0),
            content: pick_str(&map, &["content"]).unwrap_or_default(),
            status,
            account_ids: Self::parse_account_ids(&map),
            publish_at: pick_str(&map, &["publish_at", "publishAt"])
                .and_then(|raw| parse_datetime(&raw)),
            attachments: pick(&map, &["attachments"])
                .and_then(|v| v.as_array().cloned()),
            created_at: pick_str(&map, &["created_at", "createdAt"])
                .and_then(|raw| parse_datetime(&raw))
                .unwrap_or_else(|| Utc::now().naive_utc()),
            updated_at: pick_str(&map, &["updated_at", "updatedAt"])
                .and_then(|raw| parse_datetime(&raw)),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".to_string(), json!(self.id));
        map.insert("content".to_string(), json!(self.content));
        map.insert("status".to_string(), json!(self.status.as_str()));
        map.insert("account_ids".to_string(), json!(self.account_ids));
        if let Some(publish_at) = self.publish_at {
            map.insert(
                "publish_at".to_string(),
                json!(publish_at.format(DATETIME_FORMAT).to_string()),
            );
        }
        if let Some(attachments) = &self.attachments {
            map.insert("attachments".to_string(), json!(attachments));
        }
        map.insert(
            "created_at".to_string(),
            json!(self.created_at.format(DATETIME_FORMAT).to_string()),
        );
        if let Some(updated_at) = self.updated_at {
            map.insert(
                "updated_at".to_string(),
                json!(updated_at.format(DATETIME_FORMAT).to_string()),
            );
        }
        Value::Object(map)
    }

    pub fn is_scheduled(&self) -> bool {
        self.publish_at
            .is_some_and(|at| at > Utc::now().naive_utc())
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    pub fn is_draft(&self) -> bool {
        self.status == PostStatus::Draft
    }

    /// Derive a status from boolean flags when no `status` field is present.
    fn derive_status(map: &Map<String, Value>) -> PostStatus {
        if pick_bool(map, &["draft"]).unwrap_or(false) {
            return PostStatus::Draft;
        }
        if pick_bool(map, &["published"]).unwrap_or(false) {
            return PostStatus::Published;
        }
        if pick_bool(map, &["approved"]) == Some(false) {
            return PostStatus::AwaitingApproval;
        }
        if pick(map, &["publish_at", "publishAt"]).is_some() {
            return PostStatus::Scheduled;
        }
        PostStatus::Draft
    }

    fn parse_account_ids(map: &Map<String, Value>) -> Vec<u64> {
        if let Some(ids) = pick(map, &["account_ids", "accountIds"]).and_then(Value::as_array) {
            return ids.iter().filter_map(Value::as_u64).collect();
        }

        if let Some(id) = pick_u64(map, &["account_id", "accountId"]) {
            return vec![id];
        }

        if let Some(accounts) = map.get("accounts").and_then(Value::as_array) {
            return accounts
                .iter()
                .filter_map(|entry| match entry {
                    Value::Object(obj) => pick_u64(obj, &["id"]),
                    other => other.as_u64(),
                })
                .collect();
        }

        Vec::new()
    }
}

// ============================================================================
// MediaUpload
// ============================================================================

/// Result of a successful media upload.
///
/// The `upload_token` is the only field the post-creation call needs.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaUpload {
    pub upload_token: String,
    pub key: String,
    pub url: String,
    pub secure_key: String,
    pub mime_type: String,
    pub name: String,
}

impl MediaUpload {
    pub fn from_value(value: &Value) -> Self {
        let map = as_object(value);
        Self {
            upload_token: pick_str(&map, &["upload_token", "uploadToken"]).unwrap_or_default(),
            key: pick_str(&map, &["key"]).unwrap_or_default(),
            url: pick_str(&map, &["url"]).unwrap_or_default(),
            secure_key: pick_str(&map, &["secure_key", "secureKey"]).unwrap_or_default(),
            mime_type: pick_str(&map, &["mime_type", "mimeType"])
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            name: pick_str(&map, &["name"]).unwrap_or_default(),
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "upload_token": self.upload_token,
            "key": self.key,
            "url": self.url,
            "secure_key": self.secure_key,
            "mime_type": self.mime_type,
            "name": self.name,
        })
    }

    /// The minimal shape used when attaching this upload to a post payload.
    pub fn to_attachment(&self) -> Value {
        json!({ "upload_token": self.upload_token })
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }
}

// ============================================================================
// PaginatedResponse
// ============================================================================

/// One page of a paginated listing, with enough metadata to walk the rest.
#[derive(Debug, Clone)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub current_page: u64,
    pub last_page: u64,
    pub per_page: u64,
    pub total: u64,
}

impl<T> PaginatedResponse<T> {
    /// Parse a page from a raw response, mapping each raw item through `parse`.
    ///
    /// Items live under `items_key`, `items` or `data`; pagination metadata
    /// under `pagination`, `meta` or at the top level.
    pub fn from_value(value: &Value, items_key: &str, parse: impl Fn(&Value) -> T) -> Self {
        let map = as_object(value);

        let raw_items: Vec<Value> = pick(&map, &[items_key, "items", "data"])
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let pagination = pick(&map, &["pagination", "meta"])
            .map(as_object)
            .unwrap_or_else(|| map.clone());

        let total = pick_u64(&pagination, &["total"]).unwrap_or(raw_items.len() as u64);

        Self {
            items: raw_items.iter().map(parse).collect(),
            current_page: pick_u64(&pagination, &["currentPage", "current_page"]).unwrap_or(1),
            last_page: pick_u64(&pagination, &["lastPage", "last_page"]).unwrap_or(1),
            per_page: pick_u64(&pagination, &["perPage", "per_page"]).unwrap_or(15),
            total,
        }
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page
    }

    pub fn next_page(&self) -> Option<u64> {
        self.has_more_pages().then(|| self.current_page + 1)
    }

    pub fn previous_page(&self) -> Option<u64> {
        (self.current_page > 1).then(|| self.current_page - 1)
    }

    pub fn is_first_page(&self) -> bool {
        self.current_page == 1
    }

    pub fn is_last_page(&self) -> bool {
        self.current_page == self.last_page
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
