use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::models::to_db_time;

pub fn insert(conn: &Connection, user_id: i64, now: DateTime<Utc>) -> Result<i64> {
    conn.execute(
        "INSERT INTO generations (user_id, created_at) VALUES (?1, ?2)",
        rusqlite::params![user_id, to_db_time(now)],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Generation events of `user_id` in the half-open window `[start, end)`.
pub fn count_in_window(
    conn: &Connection,
    user_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<u32> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM generations
         WHERE user_id = ?1 AND created_at >= ?2 AND created_at < ?3",
        rusqlite::params![user_id, to_db_time(start), to_db_time(end)],
        |row| row.get(0),
    )?;
    Ok(n)
}
