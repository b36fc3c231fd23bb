//! Insights and analytics accessors
//!
//! Dashboard stats, per-day post counts, post and account metric time
//! series, and top-performing posts. Metric values arrive as integers or
//! floats depending on the metric, so everything is carried as `f64`.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};

use crate::client::SocialBuClient;
use crate::error::Result;
use crate::types::{as_object, pick, pick_bool, pick_str, pick_u64};

/// Date format the insights endpoints accept for range bounds.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A report date in any accepted input shape, normalized to `YYYY-MM-DD`.
pub trait IntoReportDate {
    fn into_report_date(self) -> String;
}

impl IntoReportDate for String {
    fn into_report_date(self) -> String {
        self
    }
}

impl IntoReportDate for &str {
    fn into_report_date(self) -> String {
        self.to_string()
    }
}

impl IntoReportDate for NaiveDate {
    fn into_report_date(self) -> String {
        self.format(DATE_FORMAT).to_string()
    }
}

impl IntoReportDate for DateTime<Utc> {
    fn into_report_date(self) -> String {
        self.format(DATE_FORMAT).to_string()
    }
}

fn pick_f64(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    pick(map, keys).and_then(Value::as_f64)
}

// ============================================================================
// DTOs
// ============================================================================

/// Dashboard counters for the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InsightStats {
    pub unread_feeds: u64,
    pub user_automations: u64,
    pub user_pending_posts: u64,
    pub user_failed_posts: u64,
    pub inactive_accounts: u64,
}

impl InsightStats {
    pub fn from_value(value: &Value) -> Self {
        let map = as_object(value);
        Self {
            unread_feeds: pick_u64(&map, &["unreadFeeds", "unread_feeds"]).unwrap_or(0),
            user_automations: pick_u64(&map, &["userAutomations", "user_automations"])
                .unwrap_or(0),
            user_pending_posts: pick_u64(&map, &["userPendingPosts", "user_pending_posts"])
                .unwrap_or(0),
            user_failed_posts: pick_u64(&map, &["userFailedPosts", "user_failed_posts"])
                .unwrap_or(0),
            inactive_accounts: pick_u64(&map, &["inactiveAccounts", "inactive_accounts"])
                .unwrap_or(0),
        }
    }

    /// Anything requiring attention: failed posts or disconnected accounts.
    pub fn has_issues(&self) -> bool {
        self.user_failed_posts > 0 || self.inactive_accounts > 0
    }
}

/// One date bucket in a metric time series.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesPoint {
    pub date: String,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn from_value(value: &Value) -> Self {
        let map = as_object(value);
        Self {
            date: pick_str(&map, &["date"]).unwrap_or_default(),
            value: pick_f64(&map, &["value", "count"]).unwrap_or(0.0),
        }
    }
}

/// One named metric value attached to a top post.
#[derive(Debug, Clone, PartialEq)]
pub struct PostInsight {
    pub kind: String,
    pub value: f64,
}

impl PostInsight {
    pub fn from_value(value: &Value) -> Self {
        let map = as_object(value);
        Self {
            kind: pick_str(&map, &["type"]).unwrap_or_default(),
            value: pick_f64(&map, &["value"]).unwrap_or(0.0),
        }
    }
}

/// A top-performing post with its ranking metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct TopPost {
    pub id: u64,
    pub content: String,
    pub account_id: u64,
    pub account_type: String,
    pub post_type: String,
    pub attachments: Option<Vec<Value>>,
    pub publish_at: Option<String>,
    pub published_at: Option<String>,
    pub published: bool,
    pub permalink: Option<String>,
    pub insights: Vec<PostInsight>,
}

impl TopPost {
    pub fn from_value(value: &Value) -> Self {
        let map = as_object(value);
        let insights = map
            .get("insights")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(PostInsight::from_value).collect())
            .unwrap_or_default();

        Self {
            id: pick_u64(&map, &["id"]).unwrap_or(0),
            content: pick_str(&map, &["content"]).unwrap_or_default(),
            account_id: pick_u64(&map, &["account_id", "accountId"]).unwrap_or(0),
            account_type: pick_str(&map, &["account_type", "accountType"]).unwrap_or_default(),
            post_type: pick_str(&map, &["type"]).unwrap_or_default(),
            attachments: map
                .get("attachments")
                .and_then(Value::as_array)
                .map(|items| items.to_vec()),
            publish_at: pick_str(&map, &["publish_at", "publishAt"]),
            published_at: pick_str(&map, &["published_at", "publishedAt"]),
            published: pick_bool(&map, &["published"]).unwrap_or(false),
            permalink: pick_str(&map, &["permalink"]),
            insights,
        }
    }

    /// Value of a specific insight metric, if present.
    pub fn insight_value(&self, kind: &str) -> Option<f64> {
        self.insights
            .iter()
            .find(|insight| insight.kind == kind)
            .map(|insight| insight.value)
    }
}

/// Metric time series for one account.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountMetrics {
    pub account_id: u64,
    pub metrics: BTreeMap<String, Vec<TimeSeriesPoint>>,
}

impl AccountMetrics {
    pub fn from_value(value: &Value) -> Self {
        let map = as_object(value);
        let metrics = map
            .get("metrics")
            .and_then(Value::as_object)
            .map(|series| {
                series
                    .iter()
                    .filter_map(|(name, points)| {
                        let points = points.as_array()?;
                        Some((
                            name.clone(),
                            points.iter().map(TimeSeriesPoint::from_value).collect(),
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            account_id: pick_u64(&map, &["account_id", "accountId"]).unwrap_or(0),
            metrics,
        }
    }

    /// Time series for one metric name, if present.
    pub fn metric(&self, name: &str) -> Option<&[TimeSeriesPoint]> {
        self.metrics.get(name).map(Vec::as_slice)
    }
}

// ============================================================================
// Client accessors
// ============================================================================

impl SocialBuClient {
    /// Dashboard stats for the authenticated user.
    pub async fn stats(&self) -> Result<InsightStats> {
        let response = self.get("/insights/stats", &[]).await?;
        Ok(InsightStats::from_value(&response))
    }

    /// Post counts per day within a date range.
    pub async fn post_counts(
        &self,
        start: impl IntoReportDate,
        end: impl IntoReportDate,
        accounts: Option<&[u64]>,
        post_type: Option<&str>,
        team: Option<u64>,
    ) -> Result<Vec<TimeSeriesPoint>> {
        let mut query = range_query(start, end);
        push_filters(&mut query, None, accounts, post_type, team);

        let response = self.get("/insights/posts/counts", &query).await?;
        Ok(items_list(&response)
            .iter()
            .map(TimeSeriesPoint::from_value)
            .collect())
    }

    /// Named metric time series for posts within a date range.
    pub async fn post_metrics(
        &self,
        start: impl IntoReportDate,
        end: impl IntoReportDate,
        metrics: &[&str],
        post_type: Option<&str>,
        accounts: Option<&[u64]>,
        team: Option<u64>,
    ) -> Result<BTreeMap<String, Vec<TimeSeriesPoint>>> {
        let mut query = range_query(start, end);
        push_filters(&mut query, Some(metrics), accounts, post_type, team);

        let response = self.get("/insights/posts/metrics", &query).await?;

        // An empty range comes back as {"data": []}; a populated one nests
        // the keyed series directly or under "items".
        let data = response.get("data").unwrap_or(&response);
        let Some(map) = data.as_object() else {
            return Ok(BTreeMap::new());
        };
        let series = map
            .get("items")
            .and_then(Value::as_object)
            .unwrap_or(map);

        Ok(series
            .iter()
            .filter_map(|(name, points)| {
                let points = points.as_array()?;
                Some((
                    name.clone(),
                    points.iter().map(TimeSeriesPoint::from_value).collect(),
                ))
            })
            .collect())
    }

    /// Top-performing posts within a date range, ranked by the given metrics.
    pub async fn top_posts(
        &self,
        start: impl IntoReportDate,
        end: impl IntoReportDate,
        metrics: &[&str],
        accounts: Option<&[u64]>,
        team: Option<u64>,
    ) -> Result<Vec<TopPost>> {
        let mut query = range_query(start, end);
        push_filters(&mut query, Some(metrics), accounts, None, team);

        let response = self.get("/insights/posts/top_posts", &query).await?;
        Ok(items_list(&response)
            .iter()
            .map(TopPost::from_value)
            .collect())
    }

    /// Named metric time series per account within a date range.
    pub async fn account_metrics(
        &self,
        start: impl IntoReportDate,
        end: impl IntoReportDate,
        metrics: &[&str],
        accounts: Option<&[u64]>,
        calculate_growth: Option<bool>,
        team: Option<u64>,
    ) -> Result<Vec<AccountMetrics>> {
        let mut query = range_query(start, end);
        push_filters(&mut query, Some(metrics), accounts, None, team);
        if let Some(growth) = calculate_growth {
            query.push(("calculate_growth", growth.to_string()));
        }

        let response = self.get("/insights/accounts/metrics", &query).await?;
        Ok(items_list(&response)
            .iter()
            .map(AccountMetrics::from_value)
            .collect())
    }
}

fn range_query(
    start: impl IntoReportDate,
    end: impl IntoReportDate,
) -> Vec<(&'static str, String)> {
    vec![
        ("start", start.into_report_date()),
        ("end", end.into_report_date()),
    ]
}

fn push_filters(
    query: &mut Vec<(&'static str, String)>,
    metrics: Option<&[&str]>,
    accounts: Option<&[u64]>,
    post_type: Option<&str>,
    team: Option<u64>,
) {
    if let Some(metrics) = metrics {
        query.push(("metrics", metrics.join(",")));
    }
    if let Some(accounts) = accounts {
        let joined = accounts
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        query.push(("accounts", joined));
    }
    if let Some(post_type) = post_type {
        query.push(("post_type", post_type.to_string()));
    }
    if let Some(team) = team {
        query.push(("team", team.to_string()));
    }
}

/// List payload from a response that may nest it under `data`. Anything that
/// is not a list (including keyed maps returned on errors) yields empty.
fn items_list(response: &Value) -> Vec<Value> {
    response
        .get("data")
        .unwrap_or(response)
        .as_array()
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insight_stats_aliases_and_defaults() {
        let camel = InsightStats::from_value(&json!({
            "unreadFeeds": 5,
            "userAutomations": 2,
            "userPendingPosts": 3,
            "userFailedPosts": 1,
            "inactiveAccounts": 0,
        }));
        assert_eq!(camel.unread_feeds, 5);
        assert_eq!(camel.user_failed_posts, 1);

        let snake = InsightStats::from_value(&json!({
            "unread_feeds": 10,
            "user_automations": 4,
        }));
        assert_eq!(snake.unread_feeds, 10);
        assert_eq!(snake.user_automations, 4);
        assert_eq!(snake.user_pending_posts, 0);

        let empty = InsightStats::from_value(&json!({}));
        assert_eq!(empty, InsightStats::default());
    }

    #[test]
    fn test_insight_stats_has_issues() {
        let failed = InsightStats {
            user_failed_posts: 2,
            ..Default::default()
        };
        assert!(failed.has_issues());

        let inactive = InsightStats {
            inactive_accounts: 1,
            ..Default::default()
        };
        assert!(inactive.has_issues());

        let healthy = InsightStats {
            unread_feeds: 50,
            user_pending_posts: 10,
            ..Default::default()
        };
        assert!(!healthy.has_issues());
    }

    #[test]
    fn test_time_series_point_value_or_count() {
        let value = TimeSeriesPoint::from_value(&json!({"date": "2025-06-01", "value": 3.5}));
        assert_eq!(value.date, "2025-06-01");
        assert_eq!(value.value, 3.5);

        let count = TimeSeriesPoint::from_value(&json!({"date": "2025-06-02", "count": 7}));
        assert_eq!(count.value, 7.0);
    }

    #[test]
    fn test_top_post_insight_value() {
        let post = TopPost::from_value(&json!({
            "id": 42,
            "content": "Hot take",
            "account_id": 3,
            "account_type": "twitter",
            "type": "text",
            "published": true,
            "permalink": "https://example.com/42",
            "insights": [
                {"type": "likes", "value": 120},
                {"type": "comments", "value": 8},
            ],
        }));

        assert_eq!(post.id, 42);
        assert!(post.published);
        assert_eq!(post.insight_value("likes"), Some(120.0));
        assert_eq!(post.insight_value("comments"), Some(8.0));
        assert_eq!(post.insight_value("shares"), None);
    }

    #[test]
    fn test_account_metrics_named_series() {
        let metrics = AccountMetrics::from_value(&json!({
            "accountId": 9,
            "metrics": {
                "followers": [
                    {"date": "2025-06-01", "value": 100},
                    {"date": "2025-06-02", "value": 104},
                ],
                "total_views": [],
            },
        }));

        assert_eq!(metrics.account_id, 9);
        let followers = metrics.metric("followers").unwrap();
        assert_eq!(followers.len(), 2);
        assert_eq!(followers[1].value, 104.0);
        assert_eq!(metrics.metric("total_views").unwrap().len(), 0);
        assert!(metrics.metric("engagement").is_none());
    }

    #[test]
    fn test_items_list_shapes() {
        assert_eq!(items_list(&json!({"data": [1, 2]})), vec![json!(1), json!(2)]);
        assert_eq!(items_list(&json!([3])), vec![json!(3)]);
        assert!(items_list(&json!({"data": {}})).is_empty());
        assert!(items_list(&json!({})).is_empty());
    }

    #[test]
    fn test_report_date_normalization() {
        assert_eq!("2025-06-01".into_report_date(), "2025-06-01");
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(date.into_report_date(), "2025-06-01");
    }
}
