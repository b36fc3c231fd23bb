//! Per-account capability checks for draft posts
//!
//! Pure functions: a draft's content and attachment count are checked
//! against one account's declared limits, appending field-scoped messages.
//! Errors accumulate across accounts rather than short-circuiting, so a
//! caller targeting several accounts sees every violation at once.

use std::collections::BTreeMap;

use crate::types::Account;

/// Check one account's capabilities against the draft state.
///
/// Content length is measured in Unicode characters, not bytes. Accounts
/// with no declared limits produce no errors.
pub fn check_account(
    content: &str,
    media_count: usize,
    account: &Account,
    errors: &mut BTreeMap<String, Vec<String>>,
) {
    if let Some(limit) = account.post_max_length {
        let length = content.chars().count();
        if length > limit as usize {
            errors.entry("content".to_string()).or_default().push(format!(
                "Content ({} chars) exceeds limit for {} (max {}).",
                length, account.name, limit
            ));
        }
    }

    if account.requires_media() && media_count == 0 {
        errors.entry("media".to_string()).or_default().push(format!(
            "{} requires at least one media attachment.",
            account.name
        ));
    }

    if let Some(limit) = account.max_attachments {
        if media_count > limit as usize {
            errors
                .entry("attachments".to_string())
                .or_default()
                .push(format!(
                    "Too many attachments for {} (max {}, got {}).",
                    account.name, limit, media_count
                ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn account(value: serde_json::Value) -> Account {
        Account::from_value(&value)
    }

    #[test]
    fn test_content_length_over_limit() {
        let account = account(json!({
            "id": 1, "name": "Birdsite", "type": "twitter", "post_maxlength": 20,
        }));
        let content = "a".repeat(44);
        let mut errors = BTreeMap::new();

        check_account(&content, 0, &account, &mut errors);

        let messages = &errors["content"];
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("44 chars"));
        assert!(messages[0].contains("Birdsite"));
        assert!(messages[0].contains("max 20"));
    }

    #[test]
    fn test_content_length_counts_characters_not_bytes() {
        let account = account(json!({
            "id": 1, "name": "Short", "type": "twitter", "post_maxlength": 10,
        }));
        // Ten multi-byte characters: within the limit despite 40 bytes
        let content = "\u{1F600}".repeat(10);
        let mut errors = BTreeMap::new();

        check_account(&content, 0, &account, &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_media_required_with_no_media() {
        let account = account(json!({"id": 1, "name": "Gram", "type": "instagram"}));
        let mut errors = BTreeMap::new();

        check_account("Hi", 0, &account, &mut errors);

        assert!(errors["media"][0].contains("Gram"));
        assert!(errors["media"][0].contains("requires at least one media attachment"));
    }

    #[test]
    fn test_media_required_satisfied() {
        let account = account(json!({"id": 1, "name": "Gram", "type": "instagram"}));
        let mut errors = BTreeMap::new();

        check_account("Hi", 1, &account, &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_too_many_attachments() {
        let account = account(json!({
            "id": 1, "name": "Pin", "type": "pinterest", "max_attachments": 2,
        }));
        let mut errors = BTreeMap::new();

        check_account("Hi", 3, &account, &mut errors);

        let messages = &errors["attachments"];
        assert!(messages[0].contains("Pin"));
        assert!(messages[0].contains("max 2"));
        assert!(messages[0].contains("got 3"));
    }

    #[test]
    fn test_account_without_limits_produces_no_errors() {
        let account = account(json!({"id": 1, "name": "Toot", "type": "mastodon"}));
        let mut errors = BTreeMap::new();

        check_account(&"x".repeat(100_000), 50, &account, &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_errors_accumulate_across_accounts() {
        let first = account(json!({
            "id": 1, "name": "A", "type": "twitter", "post_maxlength": 5,
        }));
        let second = account(json!({
            "id": 2, "name": "B", "type": "twitter", "post_maxlength": 8,
        }));
        let mut errors = BTreeMap::new();

        check_account("this is too long", 0, &first, &mut errors);
        check_account("this is too long", 0, &second, &mut errors);

        assert_eq!(errors["content"].len(), 2);
        assert!(errors["content"][0].contains("A"));
        assert!(errors["content"][1].contains("B"));
    }
}
