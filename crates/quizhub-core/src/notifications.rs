use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::debug;

use quizhub_db::{Connection, Database};
use quizhub_db::models::NotificationRow;
use quizhub_db::notifications as store;
use quizhub_types::events::NotificationPayload;
use quizhub_types::models::Notification;

use crate::error::{CoreError, CoreResult};

pub const MAX_PAGE_SIZE: u32 = 100;

/// Append a notification for `recipient` on the caller's connection.
///
/// Callers run this inside the same transaction as the state change being
/// reported, so the change and its notification commit together.
pub fn emit(
    conn: &Connection,
    recipient: i64,
    actor: Option<i64>,
    payload: NotificationPayload,
    now: DateTime<Utc>,
) -> CoreResult<Notification> {
    let data = payload.data().map_err(anyhow::Error::from)?;
    let row = store::insert(conn, recipient, actor, payload.kind(), &data.to_string(), now)?;

    debug!("Notification {} ({}) queued for user {}", row.id, row.kind, recipient);
    Ok(Notification {
        id: row.id,
        user_id: row.user_id,
        actor_user_id: row.actor_user_id,
        payload,
        is_read: false,
        created_at: row.created_at,
    })
}

/// Read side of the recipient's notification log.
#[derive(Clone)]
pub struct NotificationService {
    db: Arc<Database>,
}

impl NotificationService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Newest-first page. `limit` is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn list(&self, recipient: i64, offset: u32, limit: u32) -> CoreResult<Vec<Notification>> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let rows = self.db.with_conn(|conn| store::list(conn, recipient, offset, limit))?;
        rows.into_iter().map(to_notification).collect()
    }

    pub fn count_unread(&self, recipient: i64) -> CoreResult<u32> {
        Ok(self.db.with_conn(|conn| store::count_unread(conn, recipient))?)
    }

    /// Idempotent. A notification owned by someone else is reported as
    /// `NotFound`, same as one that does not exist.
    pub fn mark_read(&self, recipient: i64, id: i64) -> CoreResult<Notification> {
        let row = self.db.with_tx(|conn| {
            let mut row = store::get_owned(conn, recipient, id)?.ok_or(CoreError::NotFound)?;
            if !row.is_read {
                store::mark_read(conn, recipient, id)?;
                row.is_read = true;
            }
            Ok::<_, CoreError>(row)
        })?;
        to_notification(row)
    }

    /// Returns how many notifications flipped to read.
    pub fn mark_all_read(&self, recipient: i64) -> CoreResult<usize> {
        Ok(self.db.with_conn(|conn| store::mark_all_read(conn, recipient))?)
    }
}

fn to_notification(row: NotificationRow) -> CoreResult<Notification> {
    let data: serde_json::Value = serde_json::from_str(&row.data)
        .map_err(|e| anyhow!("Corrupt data on notification {}: {}", row.id, e))?;
    let payload = NotificationPayload::from_parts(&row.kind, data)
        .map_err(|e| anyhow!("Unreadable notification {} of type '{}': {}", row.id, row.kind, e))?;

    Ok(Notification {
        id: row.id,
        user_id: row.user_id,
        actor_user_id: row.actor_user_id,
        payload,
        is_read: row.is_read,
        created_at: row.created_at,
    })
}
