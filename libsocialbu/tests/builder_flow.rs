//! End-to-end builder flows against the in-memory fake.

use libsocialbu::{Account, FakeSocialBu, PostStatus, SocialBuError};
use serde_json::json;

fn account(value: serde_json::Value) -> Account {
    Account::from_value(&value)
}

/// An account with no declared limits, so capability checks pass.
fn plain(id: u64) -> Account {
    account(json!({"id": id, "name": format!("acct-{id}"), "type": "mastodon"}))
}

#[tokio::test]
async fn send_merges_and_deduplicates_targets_in_first_seen_order() {
    let fake = FakeSocialBu::new().with_accounts((1..=5).map(plain));

    fake.compose()
        .content("Hi")
        .to([1, 2])
        .to([3, 4])
        .to([5, 3])
        .send()
        .await
        .unwrap();

    fake.assert_published_to(&[1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn send_falls_back_to_default_accounts() {
    let fake = FakeSocialBu::new().with_accounts((1..=3).map(plain));

    fake.compose().content("Hi").send().await.unwrap();

    fake.assert_published_to(&[1, 2, 3]);
}

#[tokio::test]
async fn dry_run_makes_no_calls_and_lists_pending_uploads() {
    let fake = FakeSocialBu::new();

    let payload = fake
        .compose()
        .content("Preview me")
        .media("photo.jpg")
        .media("clip.mp4")
        .to([9])
        .dry_run()
        .unwrap();

    assert_eq!(payload["content"], json!("Preview me"));
    assert_eq!(payload["accounts"], json!([9]));
    assert_eq!(payload["pending_uploads"], json!(["photo.jpg", "clip.mp4"]));

    fake.assert_nothing_published();
    fake.assert_uploaded_count(0);
}

#[tokio::test]
async fn blank_content_is_a_validation_error() {
    let fake = FakeSocialBu::new();

    let err = fake.compose().content("   ").send().await.unwrap_err();

    assert_eq!(err.exit_code(), 3);
    let errors = err.validation_errors().unwrap();
    assert_eq!(errors["content"], vec!["Content is required.".to_string()]);
    // Local failure, not an HTTP 422
    assert_eq!(err.status_code(), None);
    fake.assert_nothing_published();
}

#[tokio::test]
async fn no_targets_and_no_defaults_is_a_validation_error() {
    let fake = FakeSocialBu::new().with_default_accounts(vec![]);

    let err = fake.compose().content("Hi").send().await.unwrap_err();

    let errors = err.validation_errors().unwrap();
    assert_eq!(
        errors["accounts"],
        vec!["At least one account ID is required.".to_string()]
    );
}

#[tokio::test]
async fn capability_violations_accumulate_across_accounts() {
    let fake = FakeSocialBu::new();

    let err = fake
        .compose()
        .content("This content is definitely longer than five characters")
        .to_accounts([
            account(json!({
                "id": 1, "name": "Tiny", "type": "twitter", "post_maxlength": 5,
            })),
            account(json!({"id": 2, "name": "Gram", "type": "instagram"})),
        ])
        .send()
        .await
        .unwrap_err();

    let errors = err.validation_errors().unwrap();
    assert!(errors["content"][0].contains("Tiny"));
    assert!(errors["media"][0].contains("Gram"));
    fake.assert_nothing_published();
}

#[tokio::test]
async fn capability_validation_fetches_accounts_not_supplied() {
    let fake = FakeSocialBu::new().with_accounts([account(json!({
        "id": 50, "name": "Fetched", "type": "twitter", "post_maxlength": 3,
    }))]);

    let err = fake
        .compose()
        .content("too long")
        .to([50])
        .send()
        .await
        .unwrap_err();

    let errors = err.validation_errors().unwrap();
    assert!(errors["content"][0].contains("Fetched"));
}

#[tokio::test]
async fn unknown_target_account_surfaces_not_found() {
    let fake = FakeSocialBu::new();

    let err = fake.compose().content("Hi").to([404]).send().await.unwrap_err();

    assert!(matches!(err, SocialBuError::NotFound { .. }));
}

#[tokio::test]
async fn scheduled_post_with_media_builds_the_full_payload() {
    let fake = FakeSocialBu::new().with_accounts([plain(100), plain(200)]);

    let post = fake
        .compose()
        .content("Hello!")
        .to([100, 200])
        .scheduled_at("2025-06-15 14:00:00")
        .media("photo.jpg")
        .send()
        .await
        .unwrap();

    assert_eq!(post.status, PostStatus::Scheduled);

    let payload = &fake.published()[0];
    assert_eq!(payload["content"], json!("Hello!"));
    assert_eq!(payload["accounts"], json!([100, 200]));
    assert_eq!(payload["publish_at"], json!("2025-06-15 14:00:00"));
    assert_eq!(
        payload["existing_attachments"],
        json!([{"upload_token": "fake-token-1"}])
    );
    assert!(payload.get("draft").is_none());

    fake.assert_uploaded("photo.jpg");
}

#[tokio::test]
async fn draft_flag_reaches_the_payload_and_status() {
    let fake = FakeSocialBu::new().with_accounts([plain(1)]);

    let post = fake
        .compose()
        .content("WIP")
        .to([1])
        .as_draft()
        .send()
        .await
        .unwrap();

    assert_eq!(post.status, PostStatus::Draft);
    assert_eq!(fake.published()[0]["draft"], json!(true));
}

#[tokio::test]
async fn upload_failure_aborts_before_publish() {
    let fake = FakeSocialBu::new().with_accounts([plain(1)]);
    fake.fail_next_upload(SocialBuError::Network("connection reset".to_string()));

    let err = fake
        .compose()
        .content("Hi")
        .to([1])
        .media("photo.jpg")
        .send()
        .await
        .unwrap_err();

    assert!(matches!(err, SocialBuError::Network(_)));
    fake.assert_nothing_published();
}

#[tokio::test]
async fn uploads_run_in_attachment_order() {
    let fake = FakeSocialBu::new().with_accounts([plain(1)]);

    fake.compose()
        .content("Gallery")
        .to([1])
        .media("first.jpg")
        .media("second.jpg")
        .media("third.jpg")
        .send()
        .await
        .unwrap();

    assert_eq!(fake.uploads(), vec!["first.jpg", "second.jpg", "third.jpg"]);
    assert_eq!(
        fake.published()[0]["existing_attachments"],
        json!([
            {"upload_token": "fake-token-1"},
            {"upload_token": "fake-token-2"},
            {"upload_token": "fake-token-3"},
        ])
    );
}

#[tokio::test]
async fn publish_failure_surfaces_rate_limit_details() {
    let fake = FakeSocialBu::new().with_accounts([plain(1)]);
    fake.fail_next_publish(SocialBuError::RateLimit {
        message: "slow down".to_string(),
        retry_after: Some(30),
        response: None,
        request: None,
    });

    let err = fake.compose().content("Hi").to([1]).send().await.unwrap_err();

    assert_eq!(err.retry_after(), Some(30));
}
