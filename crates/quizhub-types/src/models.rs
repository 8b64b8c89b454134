use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::NotificationPayload;

/// Returned by the `FromStr` impls below when a stored tag is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

// -- Accounts --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Premium,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }
}

impl FromStr for SubscriptionTier {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "premium" => Ok(Self::Premium),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// A user as seen by the rest of the system. The password hash never leaves
/// the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub subscription_type: SubscriptionTier,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub billing_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Display identity embedded in friend lists and search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLite {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserLite {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

// -- Friendships --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
    Declined,
}

impl FriendshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }
}

impl FromStr for FriendshipStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// The addressee's answer to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accepted,
    Declined,
}

impl From<Decision> for FriendshipStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accepted => Self::Accepted,
            Decision::Declined => Self::Declined,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friendship {
    pub id: i64,
    pub requester_id: i64,
    pub addressee_id: i64,
    pub status: FriendshipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Friendship {
    pub fn involves(&self, user_id: i64) -> bool {
        self.requester_id == user_id || self.addressee_id == user_id
    }

    /// The other side of the relationship from `user_id`'s point of view.
    pub fn counterpart(&self, user_id: i64) -> i64 {
        if self.requester_id == user_id {
            self.addressee_id
        } else {
            self.requester_id
        }
    }
}

/// Which side of a relationship a listing is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendshipRole {
    /// Accepted, either direction.
    Friends,
    /// Pending, user is the addressee.
    Incoming,
    /// Pending, user is the requester.
    Outgoing,
}

/// A relationship paired with the display identity of the other user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendshipView {
    pub friendship: Friendship,
    pub other: UserLite,
}

// -- Notifications --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub actor_user_id: Option<i64>,
    #[serde(flatten)]
    pub payload: NotificationPayload,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// -- Subscriptions --

/// What a user is entitled to right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    #[serde(rename = "type")]
    pub tier: SubscriptionTier,
    pub daily_limit: u32,
    pub can_access_premium: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub can_generate: bool,
    pub subscription_type: SubscriptionTier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSheet {
    pub daily_generation_limit: u32,
    pub unlimited_browsing: bool,
    pub pdf_export: bool,
    pub premium_content: bool,
    pub custom_quizzes: bool,
    pub priority_support: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsInfo {
    pub subscription_type: SubscriptionTier,
    pub is_premium: bool,
    pub daily_generation_limit: u32,
    pub can_export_pdf: bool,
    pub can_access_premium_content: bool,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub features: FeatureSheet,
}

// -- Quizzes --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub owner_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub language: String,
    pub difficulty: String,
    pub questions: Vec<Question>,
    pub is_public: bool,
    pub is_premium: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a new or duplicated quiz is created from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub language: String,
    pub difficulty: String,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_premium: bool,
}

/// A ready-made quiz a user can start editing from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizTemplate {
    pub id: String,
    pub title: String,
    pub description: String,
    pub language: String,
    pub difficulty: String,
    pub questions: Vec<Question>,
}

impl QuizTemplate {
    /// A private draft with the template's content.
    pub fn to_draft(&self) -> QuizDraft {
        QuizDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            language: self.language.clone(),
            difficulty: self.difficulty.clone(),
            questions: self.questions.clone(),
            is_public: false,
            is_premium: false,
        }
    }
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub difficulty: Option<String>,
    pub questions: Option<Vec<Question>>,
    pub is_public: Option<bool>,
    pub is_premium: Option<bool>,
}

// -- Scores --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub score: i64,
    pub max_score: i64,
    pub answers: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: i64,
    pub username: String,
    pub score: i64,
    pub max_score: i64,
    pub achieved_at: DateTime<Utc>,
}
