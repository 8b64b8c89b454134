use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

use quizhub_types::models::{Quiz, QuizDraft};

use crate::OptionalExt;
use crate::models::{json_col, time_col, to_db_time};

const QUIZ_COLUMNS: &str = "id, owner_id, title, description, language, difficulty, questions, \
     is_public, is_premium, created_at, updated_at";

pub fn insert(conn: &Connection, owner_id: Option<i64>, draft: &QuizDraft, now: DateTime<Utc>) -> Result<i64> {
    let questions = serde_json::to_string(&draft.questions)?;
    let ts = to_db_time(now);
    conn.execute(
        "INSERT INTO quizzes
            (owner_id, title, description, language, difficulty, questions,
             is_public, is_premium, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        rusqlite::params![
            owner_id,
            draft.title,
            draft.description,
            draft.language,
            draft.difficulty,
            questions,
            draft.is_public,
            draft.is_premium,
            ts,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Quiz>> {
    let sql = format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = ?1");
    conn.query_row(&sql, [id], map_quiz).optional()
}

/// Overwrite every editable column of `quiz` and bump `updated_at`.
pub fn update(conn: &Connection, quiz: &Quiz, now: DateTime<Utc>) -> Result<()> {
    let questions = serde_json::to_string(&quiz.questions)?;
    conn.execute(
        "UPDATE quizzes
         SET title = ?2, description = ?3, language = ?4, difficulty = ?5, questions = ?6,
             is_public = ?7, is_premium = ?8, updated_at = ?9
         WHERE id = ?1",
        rusqlite::params![
            quiz.id,
            quiz.title,
            quiz.description,
            quiz.language,
            quiz.difficulty,
            questions,
            quiz.is_public,
            quiz.is_premium,
            to_db_time(now),
        ],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: i64) -> Result<usize> {
    let n = conn.execute("DELETE FROM quizzes WHERE id = ?1", [id])?;
    Ok(n)
}

pub fn list_by_owner(conn: &Connection, owner_id: i64) -> Result<Vec<Quiz>> {
    let sql = format!(
        "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE owner_id = ?1 ORDER BY created_at DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([owner_id], map_quiz)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Newest-first page of public quizzes. Premium ones are left out unless
/// `include_premium`, so paging only counts rows the caller may open.
pub fn list_public(conn: &Connection, offset: u32, limit: u32, include_premium: bool) -> Result<Vec<Quiz>> {
    let sql = format!(
        "SELECT {QUIZ_COLUMNS} FROM quizzes
         WHERE is_public = 1 AND (is_premium = 0 OR ?3)
         ORDER BY created_at DESC, id DESC
         LIMIT ?1 OFFSET ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params![limit, offset, include_premium], map_quiz)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_public(conn: &Connection) -> Result<u32> {
    let n = conn.query_row("SELECT COUNT(*) FROM quizzes WHERE is_public = 1", [], |row| row.get(0))?;
    Ok(n)
}

fn map_quiz(row: &Row<'_>) -> rusqlite::Result<Quiz> {
    Ok(Quiz {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        language: row.get(4)?,
        difficulty: row.get(5)?,
        questions: json_col(row, 6)?,
        is_public: row.get(7)?,
        is_premium: row.get(8)?,
        created_at: time_col(row, 9)?,
        updated_at: time_col(row, 10)?,
    })
}
