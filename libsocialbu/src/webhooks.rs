//! Inbound webhook receiver
//!
//! The remote service notifies of asynchronous state changes (post
//! published, account disconnected) through two POST callbacks. The router
//! parses the loosely-shaped payloads into typed [`WebhookEvent`]s and fans
//! them out on a broadcast channel. When a shared secret is configured,
//! requests must carry a hex-encoded HMAC-SHA256 signature of the raw body
//! in the `X-Socialbu-Signature` header.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use axum::Router;
use hmac::{Hmac, Mac};
use serde_json::{json, Map, Value};
use sha2::Sha256;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::types::{pick_str, pick_u64};

pub const SIGNATURE_HEADER: &str = "x-socialbu-signature";

/// A typed domain event produced from an inbound webhook.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    PostStatusChanged {
        post_id: u64,
        account_id: u64,
        status: String,
        payload: Value,
    },
    AccountStatusChanged {
        account_id: u64,
        account_type: String,
        account_name: String,
        action: String,
        payload: Value,
    },
}

/// Tolerant view over a webhook body.
///
/// Payloads are flat, but older deliveries wrapped everything one level
/// under a `data` key; both shapes are accepted.
#[derive(Debug, Clone)]
pub struct WebhookPayload {
    pub data: Map<String, Value>,
}

impl WebhookPayload {
    pub fn from_value(value: &Value) -> Self {
        let outer = value.as_object().cloned().unwrap_or_default();
        let data = match outer.get("data").and_then(Value::as_object) {
            Some(inner) => inner.clone(),
            None => outer,
        };
        Self { data }
    }

    pub fn post_id(&self) -> Option<u64> {
        pick_u64(&self.data, &["post_id", "postId"])
    }

    pub fn account_id(&self) -> Option<u64> {
        pick_u64(&self.data, &["account_id", "accountId"])
    }

    pub fn status(&self) -> Option<String> {
        pick_str(&self.data, &["status"])
    }

    /// The account action (added, updated, connected, disconnected).
    pub fn account_action(&self) -> Option<String> {
        pick_str(&self.data, &["account_action", "action"])
    }

    pub fn account_type(&self) -> Option<String> {
        pick_str(&self.data, &["account_type", "type", "platform"])
    }

    pub fn account_name(&self) -> Option<String> {
        pick_str(&self.data, &["account_name", "name"])
    }
}

/// Receives webhook callbacks and publishes typed events.
#[derive(Debug, Clone)]
pub struct WebhookReceiver {
    secret: Option<String>,
    events: broadcast::Sender<WebhookEvent>,
}

impl WebhookReceiver {
    pub fn new(secret: Option<String>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self { secret, events }
    }

    /// Subscribe to events produced by this receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<WebhookEvent> {
        self.events.subscribe()
    }

    /// Router with POST `/post` and POST `/account`, ready to nest under
    /// whatever prefix the host application uses.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/post", post(handle_post))
            .route("/account", post(handle_account))
            .with_state(self.clone())
    }

    fn emit(&self, event: WebhookEvent) {
        // No subscribers is fine; events are fire-and-forget.
        let _ = self.events.send(event);
    }
}

/// Compute the hex-encoded HMAC-SHA256 signature for a body, as the remote
/// service does when a shared secret is configured.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length
        Err(_) => unreachable!(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

fn verify_signature(secret: &str, body: &[u8], headers: &HeaderMap) -> bool {
    let Some(provided) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };

    let Ok(expected) = hex::decode(provided.trim()) else {
        return false;
    };

    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

enum Reply {
    Received,
    InvalidPayload,
    BadSignature,
}

impl IntoResponse for Reply {
    fn into_response(self) -> axum::response::Response {
        match self {
            Reply::Received => (StatusCode::OK, Json(json!({"received": true}))).into_response(),
            Reply::InvalidPayload => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid payload"})),
            )
                .into_response(),
            Reply::BadSignature => (
                StatusCode::FORBIDDEN,
                Json(json!({"error": "Invalid signature"})),
            )
                .into_response(),
        }
    }
}

fn authorize_and_parse(
    state: &WebhookReceiver,
    headers: &HeaderMap,
    body: &Bytes,
) -> std::result::Result<WebhookPayload, Reply> {
    if let Some(secret) = &state.secret {
        if !verify_signature(secret, body, headers) {
            warn!("webhook rejected: missing or invalid signature");
            return Err(Reply::BadSignature);
        }
    }

    let value: Value = serde_json::from_slice(body).map_err(|_| Reply::InvalidPayload)?;
    Ok(WebhookPayload::from_value(&value))
}

/// Handle a post status change callback.
async fn handle_post(
    State(state): State<WebhookReceiver>,
    headers: HeaderMap,
    body: Bytes,
) -> Reply {
    let payload = match authorize_and_parse(&state, &headers, &body) {
        Ok(payload) => payload,
        Err(reply) => return reply,
    };

    let (Some(post_id), Some(account_id), Some(status)) =
        (payload.post_id(), payload.account_id(), payload.status())
    else {
        return Reply::InvalidPayload;
    };

    debug!(post_id, account_id, %status, "post status webhook received");
    state.emit(WebhookEvent::PostStatusChanged {
        post_id,
        account_id,
        status,
        payload: Value::Object(payload.data),
    });

    Reply::Received
}

/// Handle an account status change callback.
async fn handle_account(
    State(state): State<WebhookReceiver>,
    headers: HeaderMap,
    body: Bytes,
) -> Reply {
    let payload = match authorize_and_parse(&state, &headers, &body) {
        Ok(payload) => payload,
        Err(reply) => return reply,
    };

    let (Some(account_id), Some(action)) = (payload.account_id(), payload.account_action())
    else {
        return Reply::InvalidPayload;
    };

    let account_type = payload
        .account_type()
        .unwrap_or_else(|| "unknown".to_string());
    let account_name = payload.account_name().unwrap_or_default();

    debug!(account_id, %action, "account status webhook received");
    state.emit(WebhookEvent::AccountStatusChanged {
        account_id,
        account_type,
        account_name,
        action,
        payload: Value::Object(payload.data),
    });

    Reply::Received
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_unwraps_data_key() {
        let wrapped = WebhookPayload::from_value(&json!({
            "data": {"post_id": 5, "account_id": 2, "status": "published"}
        }));
        assert_eq!(wrapped.post_id(), Some(5));
        assert_eq!(wrapped.status().as_deref(), Some("published"));

        let flat = WebhookPayload::from_value(&json!({
            "post_id": 7, "account_id": 3, "status": "failed"
        }));
        assert_eq!(flat.post_id(), Some(7));
        assert_eq!(flat.status().as_deref(), Some("failed"));
    }

    #[test]
    fn test_payload_account_field_aliases() {
        let payload = WebhookPayload::from_value(&json!({
            "account_id": 9,
            "action": "disconnected",
            "platform": "facebook",
            "name": "My Page",
        }));
        assert_eq!(payload.account_action().as_deref(), Some("disconnected"));
        assert_eq!(payload.account_type().as_deref(), Some("facebook"));
        assert_eq!(payload.account_name().as_deref(), Some("My Page"));

        let canonical = WebhookPayload::from_value(&json!({
            "account_id": 9,
            "account_action": "added",
            "account_type": "twitter",
            "account_name": "Bird",
        }));
        assert_eq!(canonical.account_action().as_deref(), Some("added"));
        assert_eq!(canonical.account_type().as_deref(), Some("twitter"));
        assert_eq!(canonical.account_name().as_deref(), Some("Bird"));
    }

    #[test]
    fn test_sign_and_verify_round_trip() {
        let body = br#"{"post_id": 1}"#;
        let signature = sign_payload("secret", body);

        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, signature.parse().unwrap());
        assert!(verify_signature("secret", body, &headers));

        // Wrong secret fails
        assert!(!verify_signature("other", body, &headers));

        // Tampered body fails
        assert!(!verify_signature("secret", br#"{"post_id": 2}"#, &headers));
    }

    #[test]
    fn test_verify_rejects_missing_or_malformed_header() {
        let headers = HeaderMap::new();
        assert!(!verify_signature("secret", b"body", &headers));

        let mut bad = HeaderMap::new();
        bad.insert(SIGNATURE_HEADER, "not-hex!".parse().unwrap());
        assert!(!verify_signature("secret", b"body", &bad));
    }

    #[tokio::test]
    async fn test_subscribe_receives_emitted_events() {
        let receiver = WebhookReceiver::new(None);
        let mut events = receiver.subscribe();

        receiver.emit(WebhookEvent::PostStatusChanged {
            post_id: 1,
            account_id: 2,
            status: "published".to_string(),
            payload: json!({}),
        });

        match events.recv().await.unwrap() {
            WebhookEvent::PostStatusChanged { post_id, status, .. } => {
                assert_eq!(post_id, 1);
                assert_eq!(status, "published");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
