use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use quizhub_db::models::BestScoreRow;
use quizhub_db::{Database, friendships, quizzes, scores};
use quizhub_types::models::{LeaderboardEntry, Score, User};

use crate::access::QuizGate;
use crate::error::{CoreError, CoreResult};

pub const MAX_LEADERBOARD: u32 = 100;

/// Quiz attempts and the leaderboards built from them. Every call checks
/// that the caller may open the quiz.
#[derive(Clone)]
pub struct ScoreService {
    db: Arc<Database>,
    gate: QuizGate,
}

impl ScoreService {
    pub fn new(db: Arc<Database>, gate: QuizGate) -> Self {
        Self { db, gate }
    }

    pub fn submit(
        &self,
        user: &User,
        quiz_id: i64,
        score: i64,
        max_score: i64,
        answers: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> CoreResult<Score> {
        if max_score <= 0 {
            return Err(CoreError::Validation("max_score must be positive".into()));
        }
        if !(0..=max_score).contains(&score) {
            return Err(CoreError::Validation(format!("score must be between 0 and {max_score}")));
        }

        let saved = self.db.with_tx(|conn| -> CoreResult<Score> {
            let quiz = quizzes::get(conn, quiz_id)?.ok_or(CoreError::NotFound)?;
            self.gate.check(user, &quiz, now)?;
            Ok(scores::insert(conn, quiz_id, user.id, score, max_score, answers, now)?)
        })?;

        info!("Score {}/{} recorded for user {} on quiz {}", score, max_score, user.id, quiz_id);
        Ok(saved)
    }

    /// The caller's own attempts, best first.
    pub fn mine(&self, user: &User, quiz_id: i64, now: DateTime<Utc>) -> CoreResult<Vec<Score>> {
        self.check_quiz(user, quiz_id, now)?;
        Ok(self.db.with_conn(|conn| scores::list_for_user(conn, quiz_id, user.id))?)
    }

    pub fn leaderboard(&self, user: &User, quiz_id: i64, limit: u32, now: DateTime<Utc>) -> CoreResult<Vec<LeaderboardEntry>> {
        self.check_quiz(user, quiz_id, now)?;
        let limit = limit.clamp(1, MAX_LEADERBOARD) as usize;
        let rows = self.db.with_conn(|conn| scores::best_per_user(conn, quiz_id))?;
        Ok(rank(rows.into_iter().take(limit)))
    }

    /// Leaderboard restricted to the caller and their accepted friends.
    pub fn friends_leaderboard(&self, user: &User, quiz_id: i64, now: DateTime<Utc>) -> CoreResult<Vec<LeaderboardEntry>> {
        self.check_quiz(user, quiz_id, now)?;
        let (rows, friend_ids) = self.db.with_conn(|conn| {
            Ok((scores::best_per_user(conn, quiz_id)?, friendships::friend_ids(conn, user.id)?))
        })?;

        let mut circle: HashSet<i64> = friend_ids.into_iter().collect();
        circle.insert(user.id);
        Ok(rank(rows.into_iter().filter(|row| circle.contains(&row.user_id))))
    }

    pub fn attempts(&self, user: &User, quiz_id: i64, now: DateTime<Utc>) -> CoreResult<u32> {
        self.check_quiz(user, quiz_id, now)?;
        Ok(self.db.with_conn(|conn| scores::count_attempts(conn, quiz_id))?)
    }

    fn check_quiz(&self, user: &User, quiz_id: i64, now: DateTime<Utc>) -> CoreResult<()> {
        let quiz = self
            .db
            .with_conn(|conn| quizzes::get(conn, quiz_id))?
            .ok_or(CoreError::NotFound)?;
        self.gate.check(user, &quiz, now)
    }
}

fn rank(rows: impl Iterator<Item = BestScoreRow>) -> Vec<LeaderboardEntry> {
    rows.enumerate()
        .map(|(i, row)| LeaderboardEntry {
            rank: i as u32 + 1,
            user_id: row.user_id,
            username: row.username,
            score: row.score,
            max_score: row.max_score,
            achieved_at: row.created_at,
        })
        .collect()
}
