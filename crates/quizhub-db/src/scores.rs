use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use quizhub_types::models::Score;

use crate::models::{BestScoreRow, json_col, time_col, to_db_time};

pub fn insert(
    conn: &Connection,
    quiz_id: i64,
    user_id: i64,
    score: i64,
    max_score: i64,
    answers: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<Score> {
    conn.execute(
        "INSERT INTO user_scores (quiz_id, user_id, score, max_score, answers, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![quiz_id, user_id, score, max_score, answers.to_string(), to_db_time(now)],
    )?;

    Ok(Score {
        id: conn.last_insert_rowid(),
        quiz_id,
        user_id,
        score,
        max_score,
        answers: answers.clone(),
        created_at: now,
    })
}

/// Attempts of one user on one quiz, best first.
pub fn list_for_user(conn: &Connection, quiz_id: i64, user_id: i64) -> Result<Vec<Score>> {
    let mut stmt = conn.prepare(
        "SELECT id, quiz_id, user_id, score, max_score, answers, created_at
         FROM user_scores
         WHERE quiz_id = ?1 AND user_id = ?2
         ORDER BY score DESC, created_at ASC, id ASC",
    )?;

    let rows = stmt
        .query_map([quiz_id, user_id], |row| {
            Ok(Score {
                id: row.get(0)?,
                quiz_id: row.get(1)?,
                user_id: row.get(2)?,
                score: row.get(3)?,
                max_score: row.get(4)?,
                answers: json_col(row, 5)?,
                created_at: time_col(row, 6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// One row per user: their best attempt (earliest wins a tie), ordered for a
/// leaderboard.
pub fn best_per_user(conn: &Connection, quiz_id: i64) -> Result<Vec<BestScoreRow>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, username, score, max_score, created_at FROM (
             SELECT s.user_id, u.username, s.score, s.max_score, s.created_at,
                    ROW_NUMBER() OVER (
                        PARTITION BY s.user_id
                        ORDER BY s.score DESC, s.created_at ASC, s.id ASC
                    ) AS rn
             FROM user_scores s
             JOIN users u ON u.id = s.user_id
             WHERE s.quiz_id = ?1
         )
         WHERE rn = 1
         ORDER BY score DESC, created_at ASC, user_id ASC",
    )?;

    let rows = stmt
        .query_map([quiz_id], |row| {
            Ok(BestScoreRow {
                user_id: row.get(0)?,
                username: row.get(1)?,
                score: row.get(2)?,
                max_score: row.get(3)?,
                created_at: time_col(row, 4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn count_attempts(conn: &Connection, quiz_id: i64) -> Result<u32> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM user_scores WHERE quiz_id = ?1",
        [quiz_id],
        |row| row.get(0),
    )?;
    Ok(n)
}
