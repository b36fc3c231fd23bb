//! SocialBu API client library
//!
//! This library provides a typed client for the SocialBu social-media
//! scheduling API: a fluent post builder with per-account capability
//! validation, resource accessors for posts, accounts and insights, a
//! three-step media upload pipeline, and a webhook receiver that turns
//! inbound callbacks into typed events.

pub mod builder;
pub mod capabilities;
pub mod client;
pub mod config;
pub mod error;
pub mod insights;
pub mod logging;
pub mod media;
pub mod testing;
pub mod types;
pub mod webhooks;

// Re-export commonly used types
pub use builder::{IntoScheduleTime, PostBuilder};
pub use client::{CreatePostRequest, SocialBuApi, SocialBuClient};
pub use config::Config;
pub use error::{Result, SocialBuError, UploadStep};
pub use insights::{AccountMetrics, InsightStats, PostInsight, TimeSeriesPoint, TopPost};
pub use media::{FileResolver, ResolvedFile};
pub use testing::FakeSocialBu;
pub use types::{Account, MediaUpload, PaginatedResponse, Post, PostStatus};
pub use webhooks::{WebhookEvent, WebhookReceiver};
