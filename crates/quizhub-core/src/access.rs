use chrono::{DateTime, Utc};

use quizhub_types::models::{Quiz, User};

use crate::error::{CoreError, CoreResult};
use crate::subscription::SubscriptionLimiter;

/// Read access to quizzes: visibility, ownership and premium entitlement.
#[derive(Clone)]
pub struct QuizGate {
    limiter: SubscriptionLimiter,
}

impl QuizGate {
    pub fn new(limiter: SubscriptionLimiter) -> Self {
        Self { limiter }
    }

    /// Rules apply in order: public non-premium is open to all; premium
    /// needs an active entitlement whatever the visibility; private is owner
    /// only.
    pub fn can_access(&self, user: &User, quiz: &Quiz, now: DateTime<Utc>) -> bool {
        if quiz.is_public && !quiz.is_premium {
            return true;
        }
        if quiz.is_premium {
            return self.premium_entitled(user, now);
        }
        quiz.owner_id == Some(user.id)
    }

    /// Whether `user` may open premium quizzes at `now`.
    pub fn premium_entitled(&self, user: &User, now: DateTime<Utc>) -> bool {
        self.limiter.tier_of(user, now).can_access_premium
    }

    /// Like `can_access`, but says why. Private quizzes of other users are
    /// reported as `NotFound` so their existence does not leak.
    pub fn check(&self, user: &User, quiz: &Quiz, now: DateTime<Utc>) -> CoreResult<()> {
        if self.can_access(user, quiz, now) {
            Ok(())
        } else if quiz.is_premium {
            Err(CoreError::PremiumRequired)
        } else {
            Err(CoreError::NotFound)
        }
    }

    pub fn filter_accessible(&self, user: &User, quizzes: Vec<Quiz>, now: DateTime<Utc>) -> Vec<Quiz> {
        quizzes
            .into_iter()
            .filter(|quiz| self.can_access(user, quiz, now))
            .collect()
    }
}
