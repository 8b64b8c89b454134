use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification payloads, one variant per notification type.
///
/// Stored as two columns: `type` holds the tag and `data` holds the JSON of the
/// variant fields. Each variant carries what a client needs to render the
/// event without a follow-up lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NotificationPayload {
    /// Someone asked to be friends with the recipient
    FriendRequest {
        friendship_id: i64,
        from_user_id: i64,
        from_username: String,
    },

    /// The recipient's request was accepted (explicitly or by a mutual request)
    FriendAccepted {
        friendship_id: i64,
        by_user_id: i64,
        by_username: String,
    },

    /// The recipient's request was declined
    FriendDeclined {
        friendship_id: i64,
        by_user_id: i64,
        by_username: String,
    },
}

impl NotificationPayload {
    /// The value of the `type` column.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FriendRequest { .. } => "friend_request",
            Self::FriendAccepted { .. } => "friend_accepted",
            Self::FriendDeclined { .. } => "friend_declined",
        }
    }

    /// The value of the `data` column.
    pub fn data(&self) -> serde_json::Result<serde_json::Value> {
        let mut tagged = serde_json::to_value(self)?;
        Ok(tagged
            .get_mut("data")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null))
    }

    /// Rebuild a payload from its stored `type` and `data` columns.
    pub fn from_parts(kind: &str, data: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(serde_json::json!({ "type": kind, "data": data }))
    }
}

/// Events delivered by the billing provider's webhook. These are the only
/// writes to a user's subscription fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BillingEvent {
    /// A checkout finished; the user becomes premium until `current_period_end`
    CheckoutCompleted {
        user_id: i64,
        customer_id: String,
        subscription_id: String,
        current_period_end: DateTime<Utc>,
    },

    /// The subscription was renewed or otherwise changed
    SubscriptionUpdated {
        customer_id: String,
        current_period_end: DateTime<Utc>,
    },

    /// The subscription ended; the user goes back to free
    SubscriptionDeleted { customer_id: String },
}
