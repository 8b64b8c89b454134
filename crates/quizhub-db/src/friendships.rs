use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

use quizhub_types::models::{Friendship, FriendshipRole, FriendshipStatus, FriendshipView, UserLite};

use crate::OptionalExt;
use crate::models::{enum_col, time_col, to_db_time};

const FRIENDSHIP_COLUMNS: &str = "id, requester_id, addressee_id, status, created_at, updated_at";

/// The relationship between `a` and `b`, in either direction.
pub fn find_by_pair(conn: &Connection, a: i64, b: i64) -> Result<Option<Friendship>> {
    let sql = format!(
        "SELECT {FRIENDSHIP_COLUMNS} FROM friendships
         WHERE (requester_id = ?1 AND addressee_id = ?2)
            OR (requester_id = ?2 AND addressee_id = ?1)"
    );
    conn.query_row(&sql, [a, b], map_friendship).optional()
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Friendship>> {
    let sql = format!("SELECT {FRIENDSHIP_COLUMNS} FROM friendships WHERE id = ?1");
    conn.query_row(&sql, [id], map_friendship).optional()
}

pub fn insert_pending(
    conn: &Connection,
    requester_id: i64,
    addressee_id: i64,
    now: DateTime<Utc>,
) -> Result<Friendship> {
    let ts = to_db_time(now);
    conn.execute(
        "INSERT INTO friendships (requester_id, addressee_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        rusqlite::params![requester_id, addressee_id, FriendshipStatus::Pending.as_str(), ts],
    )?;

    Ok(Friendship {
        id: conn.last_insert_rowid(),
        requester_id,
        addressee_id,
        status: FriendshipStatus::Pending,
        created_at: now,
        updated_at: now,
    })
}

pub fn update_status(
    conn: &Connection,
    id: i64,
    status: FriendshipStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE friendships SET status = ?2, updated_at = ?3 WHERE id = ?1",
        rusqlite::params![id, status.as_str(), to_db_time(now)],
    )?;
    Ok(())
}

/// Turn an existing record back into a fresh pending request, pointed from
/// `requester_id` to `addressee_id`.
pub fn reopen(
    conn: &Connection,
    id: i64,
    requester_id: i64,
    addressee_id: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    let ts = to_db_time(now);
    conn.execute(
        "UPDATE friendships
         SET requester_id = ?2, addressee_id = ?3, status = ?4, created_at = ?5, updated_at = ?5
         WHERE id = ?1",
        rusqlite::params![id, requester_id, addressee_id, FriendshipStatus::Pending.as_str(), ts],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: i64) -> Result<usize> {
    let n = conn.execute("DELETE FROM friendships WHERE id = ?1", [id])?;
    Ok(n)
}

/// Relationships of `user_id` in the given role, each joined with the other
/// user's display identity.
pub fn list_for(conn: &Connection, user_id: i64, role: FriendshipRole) -> Result<Vec<FriendshipView>> {
    let (filter, order) = match role {
        FriendshipRole::Friends => (
            "f.status = 'accepted' AND (f.requester_id = ?1 OR f.addressee_id = ?1)",
            "f.updated_at DESC, f.id DESC",
        ),
        FriendshipRole::Incoming => (
            "f.status = 'pending' AND f.addressee_id = ?1",
            "f.created_at DESC, f.id DESC",
        ),
        FriendshipRole::Outgoing => (
            "f.status = 'pending' AND f.requester_id = ?1",
            "f.created_at DESC, f.id DESC",
        ),
    };

    // JOIN on the counterpart so each row already carries its display identity
    let sql = format!(
        "SELECT f.id, f.requester_id, f.addressee_id, f.status, f.created_at, f.updated_at,
                u.id, u.username, u.email
         FROM friendships f
         JOIN users u
           ON u.id = CASE WHEN f.requester_id = ?1 THEN f.addressee_id ELSE f.requester_id END
         WHERE {filter}
         ORDER BY {order}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id], |row| {
            Ok(FriendshipView {
                friendship: map_friendship(row)?,
                other: UserLite {
                    id: row.get(6)?,
                    username: row.get(7)?,
                    email: row.get(8)?,
                },
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Ids of everyone `user_id` has an accepted relationship with.
pub fn friend_ids(conn: &Connection, user_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT CASE WHEN requester_id = ?1 THEN addressee_id ELSE requester_id END
         FROM friendships
         WHERE status = 'accepted' AND (requester_id = ?1 OR addressee_id = ?1)",
    )?;
    let ids = stmt
        .query_map([user_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

fn map_friendship(row: &Row<'_>) -> rusqlite::Result<Friendship> {
    Ok(Friendship {
        id: row.get(0)?,
        requester_id: row.get(1)?,
        addressee_id: row.get(2)?,
        status: enum_col(row, 3)?,
        created_at: time_col(row, 4)?,
        updated_at: time_col(row, 5)?,
    })
}
