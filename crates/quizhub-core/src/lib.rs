pub mod access;
pub mod accounts;
pub mod billing;
pub mod error;
pub mod friends;
pub mod notifications;
pub mod quizzes;
pub mod scores;
pub mod subscription;

#[cfg(test)]
mod testutil;

use std::sync::Arc;

use quizhub_db::Database;

pub use error::{CoreError, CoreResult, Rejection};

use access::QuizGate;
use accounts::AccountService;
use billing::BillingService;
use friends::FriendService;
use notifications::NotificationService;
use quizzes::QuizService;
use scores::ScoreService;
use subscription::{PlanLimits, SubscriptionLimiter};

/// Every domain service over one shared database handle.
#[derive(Clone)]
pub struct Services {
    pub accounts: AccountService,
    pub friends: FriendService,
    pub notifications: NotificationService,
    pub limiter: SubscriptionLimiter,
    pub quizzes: QuizService,
    pub scores: ScoreService,
    pub billing: BillingService,
}

impl Services {
    pub fn new(db: Arc<Database>, limits: PlanLimits) -> Self {
        let limiter = SubscriptionLimiter::new(db.clone(), limits);
        let gate = QuizGate::new(limiter.clone());

        Self {
            accounts: AccountService::new(db.clone()),
            friends: FriendService::new(db.clone()),
            notifications: NotificationService::new(db.clone()),
            quizzes: QuizService::new(db.clone(), gate.clone()),
            scores: ScoreService::new(db.clone(), gate),
            billing: BillingService::new(db),
            limiter,
        }
    }
}
