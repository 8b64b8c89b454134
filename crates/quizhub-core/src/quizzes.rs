use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use quizhub_db::{Connection, Database, quizzes};
use quizhub_types::models::{Question, Quiz, QuizDraft, QuizPatch, QuizTemplate, User};

use crate::access::QuizGate;
use crate::error::{CoreError, CoreResult};
use crate::subscription::record_generation;

pub const MAX_BROWSE_PAGE: u32 = 100;

/// Problems with a quiz draft, empty when it can be saved.
pub fn validate(draft: &QuizDraft) -> Vec<String> {
    let mut errors = Vec::new();

    if draft.title.trim().is_empty() {
        errors.push("Title must not be empty".to_string());
    }
    if draft.questions.is_empty() {
        errors.push("Quiz must have at least one question".to_string());
    }
    for (i, q) in draft.questions.iter().enumerate() {
        let n = i + 1;
        if q.question.trim().is_empty() {
            errors.push(format!("Question {n} has no text"));
        }
        if q.options.len() < 2 {
            errors.push(format!("Question {n} needs at least two options"));
        }
        if !q.options.contains(&q.answer) {
            errors.push(format!("Question {n} answer is not one of its options"));
        }
    }

    errors
}

fn question(text: &str, options: [&str; 4], answer: &str) -> Question {
    Question {
        question: text.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        answer: answer.to_string(),
    }
}

fn template(id: &str, title: &str, description: &str, difficulty: &str, questions: Vec<Question>) -> QuizTemplate {
    QuizTemplate {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        language: "English".to_string(),
        difficulty: difficulty.to_string(),
        questions,
    }
}

/// Starter quizzes offered by the editor.
pub fn templates() -> Vec<QuizTemplate> {
    vec![
        template(
            "general-knowledge",
            "General Knowledge Template",
            "A basic general knowledge quiz template",
            "easy",
            vec![
                question("What is the capital of France?", ["London", "Berlin", "Paris", "Madrid"], "Paris"),
                question("Which planet is known as the Red Planet?", ["Venus", "Mars", "Jupiter", "Saturn"], "Mars"),
            ],
        ),
        template(
            "science-basic",
            "Basic Science Template",
            "A basic science quiz template",
            "medium",
            vec![
                question("What is the chemical symbol for water?", ["H2O", "CO2", "NaCl", "O2"], "H2O"),
                question(
                    "What force keeps planets in orbit around the sun?",
                    ["Magnetism", "Gravity", "Friction", "Inertia"],
                    "Gravity",
                ),
            ],
        ),
        template(
            "history-world",
            "World History Template",
            "A world history quiz template",
            "hard",
            vec![
                question("In which year did World War II end?", ["1944", "1945", "1946", "1947"], "1945"),
                question(
                    "Who was the first person to walk on the moon?",
                    ["Buzz Aldrin", "Neil Armstrong", "John Glenn", "Alan Shepard"],
                    "Neil Armstrong",
                ),
            ],
        ),
    ]
}

fn ensure_valid(draft: &QuizDraft) -> CoreResult<()> {
    let errors = validate(draft);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation(errors.join("; ")))
    }
}

fn draft_of(quiz: &Quiz) -> QuizDraft {
    QuizDraft {
        title: quiz.title.clone(),
        description: quiz.description.clone(),
        language: quiz.language.clone(),
        difficulty: quiz.difficulty.clone(),
        questions: quiz.questions.clone(),
        is_public: quiz.is_public,
        is_premium: quiz.is_premium,
    }
}

#[derive(Clone)]
pub struct QuizService {
    db: Arc<Database>,
    gate: QuizGate,
}

impl QuizService {
    pub fn new(db: Arc<Database>, gate: QuizGate) -> Self {
        Self { db, gate }
    }

    pub fn create(&self, owner_id: i64, draft: &QuizDraft, now: DateTime<Utc>) -> CoreResult<Quiz> {
        ensure_valid(draft)?;
        let quiz = self
            .db
            .with_tx(|conn| insert_quiz(conn, owner_id, draft, now))?;
        info!("Quiz {} created by user {}", quiz.id, owner_id);
        Ok(quiz)
    }

    pub fn get(&self, user: &User, quiz_id: i64, now: DateTime<Utc>) -> CoreResult<Quiz> {
        let quiz = self
            .db
            .with_conn(|conn| quizzes::get(conn, quiz_id))?
            .ok_or(CoreError::NotFound)?;
        self.gate.check(user, &quiz, now)?;
        Ok(quiz)
    }

    /// Owner-only; anyone else sees `NotFound`.
    pub fn update(&self, owner_id: i64, quiz_id: i64, patch: QuizPatch, now: DateTime<Utc>) -> CoreResult<Quiz> {
        let quiz = self.db.with_tx(|conn| -> CoreResult<Quiz> {
            let mut quiz = quizzes::get(conn, quiz_id)?
                .filter(|q| q.owner_id == Some(owner_id))
                .ok_or(CoreError::NotFound)?;

            if let Some(title) = patch.title {
                quiz.title = title;
            }
            if let Some(description) = patch.description {
                quiz.description = description;
            }
            if let Some(language) = patch.language {
                quiz.language = language;
            }
            if let Some(difficulty) = patch.difficulty {
                quiz.difficulty = difficulty;
            }
            if let Some(questions) = patch.questions {
                quiz.questions = questions;
            }
            if let Some(is_public) = patch.is_public {
                quiz.is_public = is_public;
            }
            if let Some(is_premium) = patch.is_premium {
                quiz.is_premium = is_premium;
            }

            ensure_valid(&draft_of(&quiz))?;
            quizzes::update(conn, &quiz, now)?;
            quiz.updated_at = now;
            Ok(quiz)
        })?;

        info!("Quiz {} updated by user {}", quiz_id, owner_id);
        Ok(quiz)
    }

    pub fn delete(&self, owner_id: i64, quiz_id: i64) -> CoreResult<()> {
        self.db.with_tx(|conn| -> CoreResult<()> {
            quizzes::get(conn, quiz_id)?
                .filter(|q| q.owner_id == Some(owner_id))
                .ok_or(CoreError::NotFound)?;
            quizzes::delete(conn, quiz_id)?;
            Ok(())
        })?;
        info!("Quiz {} deleted by user {}", quiz_id, owner_id);
        Ok(())
    }

    /// Private, non-premium copy of a quiz the caller can read.
    pub fn duplicate(&self, user: &User, quiz_id: i64, now: DateTime<Utc>) -> CoreResult<Quiz> {
        let source = self.get(user, quiz_id, now)?;

        let mut draft = draft_of(&source);
        draft.title = format!("{} (Copy)", source.title);
        draft.is_public = false;
        draft.is_premium = false;

        let copy = self.create(user.id, &draft, now)?;
        info!("Quiz {} duplicated as {} for user {}", quiz_id, copy.id, user.id);
        Ok(copy)
    }

    pub fn mine(&self, owner_id: i64) -> CoreResult<Vec<Quiz>> {
        Ok(self.db.with_conn(|conn| quizzes::list_by_owner(conn, owner_id))?)
    }

    /// Public quizzes the caller may open, newest first. Entitlement is
    /// applied before paging, so a page is only short at the end.
    pub fn browse(&self, user: &User, offset: u32, limit: u32, now: DateTime<Utc>) -> CoreResult<Vec<Quiz>> {
        let limit = limit.clamp(1, MAX_BROWSE_PAGE);
        let entitled = self.gate.premium_entitled(user, now);
        let page = self
            .db
            .with_conn(|conn| quizzes::list_public(conn, offset, limit, entitled))?;
        Ok(self.gate.filter_accessible(user, page, now))
    }

    pub fn count(&self) -> CoreResult<u32> {
        Ok(self.db.with_conn(quizzes::count_public)?)
    }

    /// Store a freshly generated quiz as a private quiz of its requester and
    /// count the generation against their quota, in one transaction.
    pub fn save_generated(
        &self,
        owner_id: i64,
        topic: &str,
        difficulty: &str,
        language: &str,
        questions: Vec<Question>,
        now: DateTime<Utc>,
    ) -> CoreResult<Quiz> {
        let draft = QuizDraft {
            title: format!("{topic} Quiz"),
            description: format!("Auto-generated {difficulty} quiz about {topic}"),
            language: language.to_string(),
            difficulty: difficulty.to_string(),
            questions,
            is_public: false,
            is_premium: false,
        };
        ensure_valid(&draft)?;

        let quiz = self.db.with_tx(|conn| -> CoreResult<Quiz> {
            let quiz = insert_quiz(conn, owner_id, &draft, now)?;
            record_generation(conn, owner_id, now)?;
            Ok(quiz)
        })?;
        info!("Generated quiz {} saved for user {}", quiz.id, owner_id);
        Ok(quiz)
    }
}

fn insert_quiz(conn: &Connection, owner_id: i64, draft: &QuizDraft, now: DateTime<Utc>) -> CoreResult<Quiz> {
    let id = quizzes::insert(conn, Some(owner_id), draft, now)?;
    quizzes::get(conn, id)?.ok_or(CoreError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::{PlanLimits, SubscriptionLimiter};
    use crate::testutil::{at, draft, make_premium, seed_users, user};
    use chrono::Duration;

    fn service(db: Arc<Database>) -> QuizService {
        let gate = QuizGate::new(SubscriptionLimiter::new(db.clone(), PlanLimits::default()));
        QuizService::new(db, gate)
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut d = draft("", true, false);
        d.questions.push(Question {
            question: "Capital of France?".into(),
            options: vec!["Paris".into()],
            answer: "Lyon".into(),
        });

        let errors = validate(&d);
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("Title"));
        assert!(errors[1].contains("Question 2 needs at least two options"));
        assert!(errors[2].contains("Question 2 answer"));

        assert!(validate(&draft("ok", true, false)).is_empty());

        let mut empty = draft("ok", true, false);
        empty.questions.clear();
        assert_eq!(validate(&empty), vec!["Quiz must have at least one question".to_string()]);
    }

    #[test]
    fn test_templates_are_valid() {
        let all = templates();
        assert_eq!(all.len(), 3);
        for t in &all {
            assert!(validate(&t.to_draft()).is_empty(), "template {} is invalid", t.id);
        }

        let ids: Vec<_> = all.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["general-knowledge", "science-basic", "history-world"]);
    }

    #[test]
    fn test_create_rejects_invalid_draft() {
        let (db, ids) = seed_users(1);
        let quizzes = service(db);
        let err = quizzes.create(ids[0], &draft("  ", true, false), at(9, 0, 0)).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_owner_only_update_and_delete() {
        let (db, ids) = seed_users(2);
        let quizzes = service(db.clone());
        let quiz = quizzes.create(ids[0], &draft("Rivers", true, false), at(9, 0, 0)).unwrap();

        let patch = QuizPatch {
            title: Some("Lakes".into()),
            ..Default::default()
        };
        assert!(matches!(
            quizzes.update(ids[1], quiz.id, patch.clone(), at(10, 0, 0)),
            Err(CoreError::NotFound)
        ));

        let updated = quizzes.update(ids[0], quiz.id, patch, at(10, 0, 0)).unwrap();
        assert_eq!(updated.title, "Lakes");
        assert_eq!(updated.updated_at, at(10, 0, 0));
        assert_eq!(updated.created_at, at(9, 0, 0));

        // a patch that breaks the quiz is refused and nothing is written
        let bad = QuizPatch {
            questions: Some(vec![]),
            ..Default::default()
        };
        assert!(matches!(quizzes.update(ids[0], quiz.id, bad, at(11, 0, 0)), Err(CoreError::Validation(_))));
        assert_eq!(quizzes.get(&user(&db, ids[0]), quiz.id, at(11, 0, 0)).unwrap().questions.len(), 1);

        assert!(matches!(quizzes.delete(ids[1], quiz.id), Err(CoreError::NotFound)));
        quizzes.delete(ids[0], quiz.id).unwrap();
        assert!(matches!(quizzes.get(&user(&db, ids[0]), quiz.id, at(12, 0, 0)), Err(CoreError::NotFound)));
    }

    #[test]
    fn test_get_goes_through_the_gate() {
        let (db, ids) = seed_users(2);
        let quizzes = service(db.clone());
        let now = at(12, 0, 0);
        let private = quizzes.create(ids[0], &draft("Mine", false, false), now).unwrap();
        let premium = quizzes.create(ids[0], &draft("Gold", true, true), now).unwrap();

        let other = user(&db, ids[1]);
        assert!(matches!(quizzes.get(&other, private.id, now), Err(CoreError::NotFound)));
        assert!(matches!(quizzes.get(&other, premium.id, now), Err(CoreError::PremiumRequired)));

        let other = make_premium(&db, ids[1], Some(now + Duration::days(1)));
        assert!(quizzes.get(&other, premium.id, now).is_ok());
    }

    #[test]
    fn test_duplicate_is_private_copy() {
        let (db, ids) = seed_users(2);
        let quizzes = service(db.clone());
        let now = at(12, 0, 0);
        let source = quizzes.create(ids[0], &draft("Planets", true, false), now).unwrap();

        let copy = quizzes.duplicate(&user(&db, ids[1]), source.id, now).unwrap();
        assert_eq!(copy.title, "Planets (Copy)");
        assert_eq!(copy.owner_id, Some(ids[1]));
        assert!(!copy.is_public);
        assert!(!copy.is_premium);
        assert_eq!(copy.questions, source.questions);

        let private = quizzes.create(ids[0], &draft("Secret", false, false), now).unwrap();
        assert!(matches!(
            quizzes.duplicate(&user(&db, ids[1]), private.id, now),
            Err(CoreError::NotFound)
        ));
    }

    #[test]
    fn test_browse_filters_and_orders() {
        let (db, ids) = seed_users(2);
        let quizzes = service(db.clone());
        let a = quizzes.create(ids[0], &draft("A", true, false), at(9, 0, 0)).unwrap();
        quizzes.create(ids[0], &draft("B", true, true), at(10, 0, 0)).unwrap();
        quizzes.create(ids[0], &draft("C", false, false), at(11, 0, 0)).unwrap();
        let d = quizzes.create(ids[0], &draft("D", true, false), at(12, 0, 0)).unwrap();

        let now = at(13, 0, 0);
        let seen: Vec<_> = quizzes
            .browse(&user(&db, ids[1]), 0, 20, now)
            .unwrap()
            .into_iter()
            .map(|q| q.id)
            .collect();
        assert_eq!(seen, vec![d.id, a.id]);

        // public count includes premium quizzes
        assert_eq!(quizzes.count().unwrap(), 3);
        assert_eq!(quizzes.mine(ids[0]).unwrap().len(), 4);
        assert!(quizzes.mine(ids[1]).unwrap().is_empty());
    }

    #[test]
    fn test_browse_pages_are_full_for_free_users() {
        let (db, ids) = seed_users(2);
        let quizzes = service(db.clone());
        let open_a = quizzes.create(ids[0], &draft("Open A", true, false), at(8, 0, 0)).unwrap();
        let open_b = quizzes.create(ids[0], &draft("Open B", true, false), at(8, 30, 0)).unwrap();
        for (i, hour) in [9, 10, 11].into_iter().enumerate() {
            quizzes
                .create(ids[0], &draft(&format!("Gold {i}"), true, true), at(hour, 0, 0))
                .unwrap();
        }

        let now = at(13, 0, 0);
        let free = user(&db, ids[1]);
        let first: Vec<_> = quizzes.browse(&free, 0, 3, now).unwrap().into_iter().map(|q| q.id).collect();
        assert_eq!(first, vec![open_b.id, open_a.id]);
        assert!(quizzes.browse(&free, 3, 3, now).unwrap().is_empty());

        let premium = make_premium(&db, ids[1], Some(now + Duration::days(1)));
        let page = quizzes.browse(&premium, 0, 3, now).unwrap();
        assert_eq!(page.len(), 3);
        assert!(page.iter().all(|q| q.is_premium));
        assert_eq!(quizzes.browse(&premium, 3, 3, now).unwrap().len(), 2);
    }

    #[test]
    fn test_save_generated_spends_quota_with_the_quiz() {
        let (db, ids) = seed_users(1);
        let quizzes = service(db.clone());
        let limiter = SubscriptionLimiter::new(db.clone(), PlanLimits::default());
        let owner = user(&db, ids[0]);
        let questions = draft("x", false, false).questions;

        let quiz = quizzes
            .save_generated(ids[0], "Volcanoes", "hard", "en", questions, at(9, 0, 0))
            .unwrap();
        assert_eq!(quiz.title, "Volcanoes Quiz");
        assert_eq!(quiz.description, "Auto-generated hard quiz about Volcanoes");
        assert_eq!(quiz.owner_id, Some(ids[0]));
        assert!(!quiz.is_public);
        assert_eq!(limiter.usage_today(&owner, at(10, 0, 0)).unwrap().used, 1);

        // nothing saved, nothing spent
        let err = quizzes
            .save_generated(ids[0], "Nothing", "easy", "en", vec![], at(9, 5, 0))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(limiter.usage_today(&owner, at(10, 0, 0)).unwrap().used, 1);
        assert_eq!(quizzes.mine(ids[0]).unwrap().len(), 1);
    }

    #[test]
    fn test_save_generated_rolls_back_when_quota_cannot_be_recorded() {
        let (db, ids) = seed_users(1);
        let quizzes = service(db.clone());
        let questions = draft("x", false, false).questions;

        db.with_conn(|conn| {
            conn.execute_batch("DROP TABLE generations")?;
            Ok(())
        })
        .unwrap();

        let err = quizzes
            .save_generated(ids[0], "Volcanoes", "hard", "en", questions, at(9, 0, 0))
            .unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
        assert!(quizzes.mine(ids[0]).unwrap().is_empty());
    }
}
