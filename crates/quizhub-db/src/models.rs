//! Database row types. Rows that carry storage-only fields (password hashes,
//! raw JSON columns) get their own type here; the rest map straight onto the
//! quizhub-types models.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

use quizhub_types::models::{SubscriptionTier, User};

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub subscription_type: SubscriptionTier,
    pub billing_customer_id: Option<String>,
    pub billing_subscription_id: Option<String>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            subscription_type: row.subscription_type,
            subscription_ends_at: row.subscription_ends_at,
            billing_customer_id: row.billing_customer_id,
            created_at: row.created_at,
        }
    }
}

pub struct ResetTokenRow {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

pub struct NotificationRow {
    pub id: i64,
    pub user_id: i64,
    pub actor_user_id: Option<i64>,
    pub kind: String,
    pub data: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Best attempt of one user on one quiz.
pub struct BestScoreRow {
    pub user_id: i64,
    pub username: String,
    pub score: i64,
    pub max_score: i64,
    pub created_at: DateTime<Utc>,
}

// -- Column helpers --

/// Timestamps are stored as fixed-width RFC 3339 UTC text, so string order in
/// SQL comparisons is chronological order.
pub fn to_db_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_time(idx, &raw)
}

pub(crate) fn opt_time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_time(idx, &s)).transpose()
}

fn parse_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn json_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
