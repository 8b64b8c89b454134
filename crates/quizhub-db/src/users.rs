use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

use quizhub_types::models::{SubscriptionTier, UserLite};

use crate::models::{ResetTokenRow, UserRow, enum_col, opt_time_col, time_col, to_db_time};
use crate::{Database, OptionalExt};

const USER_COLUMNS: &str = "id, username, email, password, subscription_type, billing_customer_id, \
     billing_subscription_id, subscription_ends_at, created_at";

impl Database {
    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| get_by_id(conn, id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| get_by_email(conn, email))
    }
}

pub fn insert(
    conn: &Connection,
    username: &str,
    email: &str,
    password_hash: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (username, email, password, created_at) VALUES (?1, ?2, ?3, ?4)",
        (username, email, password_hash, to_db_time(now)),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    conn.query_row(&sql, [id], map_user).optional()
}

pub fn get_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
    conn.query_row(&sql, [email], map_user).optional()
}

pub fn get_by_billing_customer(conn: &Connection, customer_id: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE billing_customer_id = ?1");
    conn.query_row(&sql, [customer_id], map_user).optional()
}

pub fn get_lite(conn: &Connection, id: i64) -> Result<Option<UserLite>> {
    conn.query_row(
        "SELECT id, username, email FROM users WHERE id = ?1",
        [id],
        map_lite,
    )
    .optional()
}

/// Substring match over username and email. SQLite's `LIKE` and `NOCASE`
/// fold ASCII letters only, so matching is case-insensitive for ASCII and
/// exact for everything else.
pub fn search(conn: &Connection, query: &str, exclude_id: i64, limit: u32) -> Result<Vec<UserLite>> {
    let pattern = format!("%{}%", escape_like(query));
    let mut stmt = conn.prepare(
        "SELECT id, username, email FROM users
         WHERE id <> ?2
           AND (username LIKE ?1 ESCAPE '\\' OR email LIKE ?1 ESCAPE '\\')
         ORDER BY username COLLATE NOCASE ASC, id ASC
         LIMIT ?3",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![pattern, exclude_id, limit], map_lite)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn update_password(conn: &Connection, user_id: i64, password_hash: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET password = ?2 WHERE id = ?1",
        rusqlite::params![user_id, password_hash],
    )?;
    Ok(())
}

// -- Subscription fields (written only by billing events) --

pub fn set_premium(
    conn: &Connection,
    user_id: i64,
    customer_id: &str,
    subscription_id: &str,
    ends_at: DateTime<Utc>,
) -> Result<usize> {
    let n = conn.execute(
        "UPDATE users
         SET subscription_type = 'premium', billing_customer_id = ?2,
             billing_subscription_id = ?3, subscription_ends_at = ?4
         WHERE id = ?1",
        rusqlite::params![user_id, customer_id, subscription_id, to_db_time(ends_at)],
    )?;
    Ok(n)
}

pub fn set_subscription_end(conn: &Connection, user_id: i64, ends_at: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE users SET subscription_ends_at = ?2 WHERE id = ?1",
        rusqlite::params![user_id, to_db_time(ends_at)],
    )?;
    Ok(())
}

pub fn downgrade_to_free(conn: &Connection, user_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE users
         SET subscription_type = ?2, billing_subscription_id = NULL, subscription_ends_at = NULL
         WHERE id = ?1",
        rusqlite::params![user_id, SubscriptionTier::Free.as_str()],
    )?;
    Ok(())
}

// -- Password reset tokens --

pub fn insert_reset_token(
    conn: &Connection,
    user_id: i64,
    token: &str,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO password_reset_tokens (user_id, token, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![user_id, token, to_db_time(expires_at), to_db_time(now)],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Marks every unused token of `user_id` as used. Returns how many were open.
pub fn invalidate_reset_tokens(conn: &Connection, user_id: i64, now: DateTime<Utc>) -> Result<usize> {
    let n = conn.execute(
        "UPDATE password_reset_tokens SET used_at = ?2 WHERE user_id = ?1 AND used_at IS NULL",
        rusqlite::params![user_id, to_db_time(now)],
    )?;
    Ok(n)
}

pub fn get_reset_token(conn: &Connection, token: &str) -> Result<Option<ResetTokenRow>> {
    conn.query_row(
        "SELECT id, user_id, token, expires_at, used_at FROM password_reset_tokens WHERE token = ?1",
        [token],
        |row| {
            Ok(ResetTokenRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                token: row.get(2)?,
                expires_at: time_col(row, 3)?,
                used_at: opt_time_col(row, 4)?,
            })
        },
    )
    .optional()
}

pub fn mark_reset_token_used(conn: &Connection, id: i64, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE password_reset_tokens SET used_at = ?2 WHERE id = ?1",
        rusqlite::params![id, to_db_time(now)],
    )?;
    Ok(())
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        subscription_type: enum_col(row, 4)?,
        billing_customer_id: row.get(5)?,
        billing_subscription_id: row.get(6)?,
        subscription_ends_at: opt_time_col(row, 7)?,
        created_at: time_col(row, 8)?,
    })
}

fn map_lite(row: &Row<'_>) -> rusqlite::Result<UserLite> {
    Ok(UserLite {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
    })
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_insert_and_lookup() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .with_conn(|conn| insert(conn, "ada", "ada@example.com", "hash", now()))
            .unwrap();

        let by_email = db.get_user_by_email("ada@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, id);
        assert_eq!(by_email.subscription_type, SubscriptionTier::Free);
        assert!(by_email.subscription_ends_at.is_none());
        assert_eq!(by_email.created_at, now());

        assert!(db.get_user_by_id(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_is_constraint_violation() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| insert(conn, "ada", "ada@example.com", "h", now()))
            .unwrap();

        let err = db
            .with_conn(|conn| insert(conn, "ada2", "ada@example.com", "h", now()))
            .unwrap_err();
        assert!(crate::is_constraint_violation(&err));
    }

    #[test]
    fn test_search_is_case_insensitive_and_excludes_caller() {
        let db = Database::open_in_memory().unwrap();
        let (me, _, _) = db
            .with_conn(|conn| {
                Ok((
                    insert(conn, "AliceQuiz", "alice@example.com", "h", now())?,
                    insert(conn, "alina", "alina@example.com", "h", now())?,
                    insert(conn, "bob", "bob@ALI.org", "h", now())?,
                ))
            })
            .unwrap();

        let found = db.with_conn(|conn| search(conn, "ALI", me, 20)).unwrap();
        let names: Vec<_> = found.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alina", "bob"]);
    }

    #[test]
    fn test_search_folds_ascii_case_only() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            insert(conn, "Émile", "emile@example.com", "h", now())?;
            insert(conn, "zoe", "ZOE@EXAMPLE.COM", "h", now())?;
            Ok(())
        })
        .unwrap();

        let names = |q: &str| -> Vec<String> {
            db.with_conn(|conn| search(conn, q, 0, 20))
                .unwrap()
                .into_iter()
                .map(|u| u.username)
                .collect()
        };

        assert_eq!(names("ZOE"), vec!["zoe"]);
        assert_eq!(names("zoe@example"), vec!["zoe"]);
        assert_eq!(names("Émi"), vec!["Émile"]);
        // non-ASCII letters are compared exactly
        assert!(names("émi").is_empty());
    }

    #[test]
    fn test_search_treats_wildcards_literally() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            insert(conn, "under_score", "u@example.com", "h", now())?;
            insert(conn, "underxscore", "x@example.com", "h", now())?;
            Ok(())
        })
        .unwrap();

        let found = db.with_conn(|conn| search(conn, "r_s", 0, 20)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "under_score");
    }
}
