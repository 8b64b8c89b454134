use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Decision, Friendship, FriendshipStatus, FriendshipView, Question, SubscriptionTier, UserLite};

// -- JWT Claims --

/// JWT claims issued at login and checked by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: i64,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ForgotPasswordResponse {
    pub message: String,
    /// Only set when the server is configured to echo reset tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// -- Friends --

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FriendRequestBody {
    pub addressee_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RespondRequest {
    pub status: Decision,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FriendshipResponse {
    pub id: i64,
    pub requester_id: i64,
    pub addressee_id: i64,
    pub status: FriendshipStatus,
}

impl From<&Friendship> for FriendshipResponse {
    fn from(f: &Friendship) -> Self {
        Self {
            id: f.id,
            requester_id: f.requester_id,
            addressee_id: f.addressee_id,
            status: f.status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FriendListItem {
    pub id: i64,
    pub status: FriendshipStatus,
    pub friend_user: UserLite,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PendingRequestItem {
    pub id: i64,
    pub status: FriendshipStatus,
    pub requester_user: UserLite,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutgoingRequestItem {
    pub id: i64,
    pub status: FriendshipStatus,
    pub addressee_user: UserLite,
}

impl From<FriendshipView> for FriendListItem {
    fn from(v: FriendshipView) -> Self {
        Self {
            id: v.friendship.id,
            status: v.friendship.status,
            friend_user: v.other,
        }
    }
}

impl From<FriendshipView> for PendingRequestItem {
    fn from(v: FriendshipView) -> Self {
        Self {
            id: v.friendship.id,
            status: v.friendship.status,
            requester_user: v.other,
        }
    }
}

impl From<FriendshipView> for OutgoingRequestItem {
    fn from(v: FriendshipView) -> Self {
        Self {
            id: v.friendship.id,
            status: v.friendship.status,
            addressee_user: v.other,
        }
    }
}

// -- Paging --

/// `?offset=&limit=` for notification and quiz listings.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub offset: u32,
    #[serde(default = "default_page_limit")]
    pub limit: u32,
}

fn default_page_limit() -> u32 {
    20
}

// -- Notifications --

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub unread: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadAllResponse {
    pub updated: usize,
}

// -- Generation --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateQuizRequest {
    pub topic: String,
    pub difficulty: String,
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeneratedQuizResponse {
    pub id: i64,
    pub title: String,
    pub language: String,
    pub difficulty: String,
    pub questions: Vec<Question>,
}

// -- Quizzes --

#[derive(Debug, Serialize, Deserialize)]
pub struct QuizCountResponse {
    pub count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub errors: Vec<String>,
}

// -- Scores --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoreCreate {
    pub score: i64,
    pub max_score: i64,
    #[serde(default)]
    pub answers: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default = "default_leaderboard_limit")]
    pub limit: u32,
}

fn default_leaderboard_limit() -> u32 {
    10
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttemptsResponse {
    pub attempts: u32,
}

// -- Subscription --

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionStatusResponse {
    pub subscription_type: SubscriptionTier,
    pub billing_customer_id: Option<String>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
}

// -- Misc --

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
