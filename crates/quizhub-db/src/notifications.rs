use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

use crate::OptionalExt;
use crate::models::{NotificationRow, time_col, to_db_time};

pub fn insert(
    conn: &Connection,
    user_id: i64,
    actor_user_id: Option<i64>,
    kind: &str,
    data: &str,
    now: DateTime<Utc>,
) -> Result<NotificationRow> {
    conn.execute(
        "INSERT INTO notifications (user_id, actor_user_id, type, data, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![user_id, actor_user_id, kind, data, to_db_time(now)],
    )?;

    Ok(NotificationRow {
        id: conn.last_insert_rowid(),
        user_id,
        actor_user_id,
        kind: kind.to_string(),
        data: data.to_string(),
        is_read: false,
        created_at: now,
    })
}

/// Newest-first page of `user_id`'s notifications.
pub fn list(conn: &Connection, user_id: i64, offset: u32, limit: u32) -> Result<Vec<NotificationRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, actor_user_id, type, data, is_read, created_at
         FROM notifications
         WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2 OFFSET ?3",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![user_id, limit, offset], map_notification)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Only returns the row when it belongs to `user_id`.
pub fn get_owned(conn: &Connection, user_id: i64, id: i64) -> Result<Option<NotificationRow>> {
    conn.query_row(
        "SELECT id, user_id, actor_user_id, type, data, is_read, created_at
         FROM notifications WHERE id = ?1 AND user_id = ?2",
        [id, user_id],
        map_notification,
    )
    .optional()
}

pub fn count_unread(conn: &Connection, user_id: i64) -> Result<u32> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(n)
}

pub fn mark_read(conn: &Connection, user_id: i64, id: i64) -> Result<usize> {
    let n = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
        [id, user_id],
    )?;
    Ok(n)
}

pub fn mark_all_read(conn: &Connection, user_id: i64) -> Result<usize> {
    let n = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
        [user_id],
    )?;
    Ok(n)
}

fn map_notification(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        actor_user_id: row.get(2)?,
        kind: row.get(3)?,
        data: row.get(4)?,
        is_read: row.get(5)?,
        created_at: time_col(row, 6)?,
    })
}
