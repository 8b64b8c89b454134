use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use quizhub_types::api::{Claims, SubscriptionStatusResponse, WebhookAck};
use quizhub_types::events::BillingEvent;

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, blocking};

pub const SIGNATURE_HEADER: &str = "x-billing-signature";

type HmacSha256 = Hmac<Sha256>;

pub async fn status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<SubscriptionStatusResponse>> {
    let user = state.current_user(claims.sub).await?;
    let is_active = state.services.limiter.is_active_premium(&user, Utc::now());

    Ok(Json(SubscriptionStatusResponse {
        subscription_type: user.subscription_type,
        billing_customer_id: user.billing_customer_id,
        subscription_ends_at: user.subscription_ends_at,
        is_active,
    }))
}

/// Billing provider callback. The raw body must carry a hex HMAC-SHA256
/// signature made with the shared webhook secret.
pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> ApiResult<Json<WebhookAck>> {
    let secret = state
        .billing_secret
        .as_deref()
        .ok_or(ApiError::Unavailable("Billing"))?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    if !verify_signature(secret, &body, signature) {
        warn!("Rejected billing webhook with a bad signature");
        return Err(ApiError::Unauthorized);
    }

    let event: BillingEvent =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(format!("Unrecognised billing event: {e}")))?;

    blocking(move || state.services.billing.apply(&event)).await?;

    Ok(Json(WebhookAck { received: true }))
}

#[cfg(test)]
pub(crate) fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_round_trip() {
        let body = br#"{"type":"subscription_deleted","data":{"customer_id":"cus_1"}}"#;
        let sig = sign("whsec", body);
        assert_eq!(sig.len(), 64);
        assert!(verify_signature("whsec", body, &sig));
        assert!(!verify_signature("other", body, &sig));
        assert!(!verify_signature("whsec", b"tampered", &sig));
        assert!(!verify_signature("whsec", body, "not-hex"));
    }
}
