use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use quizhub_db::models::to_db_time;
use quizhub_db::{Database, users};
use quizhub_types::models::{Question, QuizDraft, User};

/// A fixed instant on 2025-06-01.
pub fn at(hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, hour, min, sec).unwrap()
}

/// In-memory database with `n` free users named `user0..`.
pub fn seed_users(n: usize) -> (Arc<Database>, Vec<i64>) {
    let db = Database::open_in_memory().unwrap();
    let ids = db
        .with_conn(|conn| {
            (0..n)
                .map(|i| users::insert(conn, &format!("user{i}"), &format!("user{i}@example.com"), "x", at(0, 0, 0)))
                .collect()
        })
        .unwrap();
    (Arc::new(db), ids)
}

pub fn user(db: &Database, id: i64) -> User {
    db.get_user_by_id(id).unwrap().unwrap().into()
}

pub fn make_premium(db: &Database, id: i64, ends_at: Option<DateTime<Utc>>) -> User {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE users SET subscription_type = 'premium', subscription_ends_at = ?2 WHERE id = ?1",
            (id, ends_at.map(to_db_time)),
        )?;
        Ok(())
    })
    .unwrap();
    user(db, id)
}

pub fn draft(title: &str, is_public: bool, is_premium: bool) -> QuizDraft {
    QuizDraft {
        title: title.to_string(),
        description: String::new(),
        language: "en".into(),
        difficulty: "easy".into(),
        questions: vec![Question {
            question: "2 + 2?".into(),
            options: vec!["3".into(), "4".into()],
            answer: "4".into(),
        }],
        is_public,
        is_premium,
    }
}
