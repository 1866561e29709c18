//! Payment gateway client and webhook verification.
//!
//! The gateway hosts the actual payment page: we create a checkout session
//! for the user's cart, redirect the browser to it, and later learn the
//! outcome through a signed webhook. The signature scheme is the usual
//! `t=<unix ts>,v1=<hex hmac>` header, HMAC-SHA256 over `"{t}.{payload}"`
//! with a shared secret, with a replay window on the timestamp.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use thiserror::Error;

use mercantile_core::UserId;

use crate::config::CheckoutConfig;
use crate::models::cart::CartItemWithProduct;
use crate::models::order::ShippingAddress;

type HmacSha256 = Hmac<Sha256>;

/// Webhook timestamps older or newer than this are rejected.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Event type the gateway sends when a payment completes.
pub const SESSION_COMPLETED: &str = "checkout.session.completed";

/// Errors from gateway calls and webhook verification.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("gateway request failed: {0}")]
    Gateway(#[from] reqwest::Error),

    #[error("gateway returned {status}: {body}")]
    GatewayStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Signature header missing pieces or not in `t=...,v1=...` form.
    #[error("malformed webhook signature header")]
    SignatureFormat,

    /// The HMAC did not match the payload.
    #[error("webhook signature mismatch")]
    SignatureMismatch,

    /// Signed timestamp outside the replay window.
    #[error("webhook timestamp outside tolerance")]
    TimestampOutOfTolerance,

    #[error("unreadable webhook payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// A checkout session created at the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Gateway session id, later echoed back in the webhook.
    pub id: String,
    /// Hosted payment page the browser should be sent to.
    pub url: String,
}

/// A webhook delivery from the gateway.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    /// Event type, e.g. `checkout.session.completed`.
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: SessionObject,
}

/// The session object carried by a completed-checkout event.
#[derive(Debug, Deserialize)]
pub struct SessionObject {
    pub id: String,
    #[serde(default)]
    pub metadata: SessionMetadata,
    pub shipping: Option<SessionShipping>,
}

/// Metadata we attached when creating the session.
#[derive(Debug, Default, Deserialize)]
pub struct SessionMetadata {
    /// The user who checked out, stringified.
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionShipping {
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
}

impl From<SessionShipping> for ShippingAddress {
    fn from(shipping: SessionShipping) -> Self {
        Self {
            shipping_address: shipping.address,
            shipping_city: shipping.city,
            shipping_country: shipping.country,
            shipping_postal: shipping.postal_code,
        }
    }
}

/// Client for the payment gateway.
#[derive(Clone)]
pub struct CheckoutService {
    client: reqwest::Client,
    gateway_url: String,
    api_key: SecretString,
    webhook_secret: SecretString,
}

impl CheckoutService {
    /// Build a gateway client from the checkout configuration.
    #[must_use]
    pub fn new(config: &CheckoutConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            gateway_url: config.gateway_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    /// Create a checkout session for a cart.
    ///
    /// The user id rides along as session metadata so the completion
    /// webhook can be tied back to the cart it pays for.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Gateway` or `CheckoutError::GatewayStatus`
    /// when the gateway call fails.
    pub async fn create_session(
        &self,
        user_id: UserId,
        items: &[CartItemWithProduct],
        base_url: &str,
    ) -> Result<CheckoutSession, CheckoutError> {
        let line_items: Vec<_> = items
            .iter()
            .map(|item| {
                json!({
                    "name": item.name,
                    "amount": item.price,
                    "quantity": item.quantity,
                    "image": item.image_cover,
                })
            })
            .collect();

        let body = json!({
            "success_url": format!("{base_url}/checkout/success"),
            "cancel_url": format!("{base_url}/cart"),
            "metadata": { "user_id": i32::from(user_id).to_string() },
            "line_items": line_items,
        });

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.gateway_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CheckoutError::GatewayStatus { status, body });
        }
        Ok(response.json().await?)
    }

    /// Verify a webhook delivery's signature header against its raw body.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::SignatureFormat`, `TimestampOutOfTolerance`,
    /// or `SignatureMismatch` depending on which check fails.
    pub fn verify_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> Result<(), CheckoutError> {
        let (timestamp, signature) = parse_signature_header(signature_header)?;

        if (now.timestamp() - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
            return Err(CheckoutError::TimestampOutOfTolerance);
        }

        let expected =
            hex::decode(signature).map_err(|_| CheckoutError::SignatureFormat)?;

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.expose_secret().as_bytes())
            .map_err(|_| CheckoutError::SignatureFormat)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected)
            .map_err(|_| CheckoutError::SignatureMismatch)
    }

    /// Parse a verified webhook body.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Payload` for undecodable JSON.
    pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, CheckoutError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Split `t=<ts>,v1=<hex>` into its parts.
fn parse_signature_header(header: &str) -> Result<(i64, &str), CheckoutError> {
    let mut timestamp = None;
    let mut signature = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signature = Some(value),
            _ => {}
        }
    }
    match (timestamp, signature) {
        (Some(t), Some(v1)) => Ok((t, v1)),
        _ => Err(CheckoutError::SignatureFormat),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_kP2mxW8qR5tnY3vB7jdF1gH9sL4z";

    fn service() -> CheckoutService {
        CheckoutService::new(&crate::config::CheckoutConfig {
            gateway_url: "https://gateway.example.com/".to_owned(),
            api_key: SecretString::from("gk_test_abc"),
            webhook_secret: SecretString::from(SECRET),
        })
    }

    fn sign(payload: &[u8], timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature_accepted() {
        let service = service();
        let now = Utc::now();
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = sign(payload, now.timestamp());
        assert!(service.verify_signature(payload, &header, now).is_ok());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let service = service();
        let now = Utc::now();
        let header = sign(b"original", now.timestamp());
        assert!(matches!(
            service.verify_signature(b"tampered", &header, now),
            Err(CheckoutError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let service = service();
        let now = Utc::now();
        let stale = now.timestamp() - SIGNATURE_TOLERANCE_SECS - 1;
        let payload = b"payload";
        let header = sign(payload, stale);
        assert!(matches!(
            service.verify_signature(payload, &header, now),
            Err(CheckoutError::TimestampOutOfTolerance)
        ));
    }

    #[test]
    fn test_malformed_header_rejected() {
        let service = service();
        let now = Utc::now();
        for header in ["", "t=notanumber,v1=ab", "v1=ab", "t=12345"] {
            assert!(matches!(
                service.verify_signature(b"x", header, now),
                Err(CheckoutError::SignatureFormat | CheckoutError::TimestampOutOfTolerance)
            ));
        }
    }

    #[test]
    fn test_parse_completed_event() {
        let payload = br#"{
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_123",
                    "metadata": { "user_id": "42" },
                    "shipping": {
                        "address": "1 Main St",
                        "city": "Springfield",
                        "country": "US",
                        "postal_code": "12345"
                    }
                }
            }
        }"#;
        let event = CheckoutService::parse_event(payload).unwrap();
        assert_eq!(event.event_type, SESSION_COMPLETED);
        assert_eq!(event.data.object.id, "cs_123");
        assert_eq!(event.data.object.metadata.user_id.as_deref(), Some("42"));
        let shipping: ShippingAddress = event.data.object.shipping.unwrap().into();
        assert_eq!(shipping.shipping_city.as_deref(), Some("Springfield"));
    }

    #[test]
    fn test_parse_event_without_metadata() {
        let payload = br#"{"type":"other.event","data":{"object":{"id":"cs_9"}}}"#;
        let event = CheckoutService::parse_event(payload).unwrap();
        assert!(event.data.object.metadata.user_id.is_none());
        assert!(event.data.object.shipping.is_none());
    }
}
