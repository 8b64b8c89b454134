use std::sync::Arc;

use tracing::{info, warn};

use quizhub_db::{Database, users};
use quizhub_types::events::BillingEvent;

use crate::error::CoreResult;

/// Applies billing-provider events to users' subscription fields. Nothing
/// else in the system writes those fields.
#[derive(Clone)]
pub struct BillingService {
    db: Arc<Database>,
}

impl BillingService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Returns the affected user id, or `None` when the event names a user
    /// or customer we do not know. Unknown ones are acknowledged so the
    /// provider stops retrying.
    pub fn apply(&self, event: &BillingEvent) -> CoreResult<Option<i64>> {
        self.db.with_tx(|conn| -> CoreResult<Option<i64>> {
            let affected = match event {
                BillingEvent::CheckoutCompleted {
                    user_id,
                    customer_id,
                    subscription_id,
                    current_period_end,
                } => {
                    let n = users::set_premium(conn, *user_id, customer_id, subscription_id, *current_period_end)?;
                    (n > 0).then_some(*user_id)
                }
                BillingEvent::SubscriptionUpdated {
                    customer_id,
                    current_period_end,
                } => match users::get_by_billing_customer(conn, customer_id)? {
                    Some(user) => {
                        users::set_subscription_end(conn, user.id, *current_period_end)?;
                        Some(user.id)
                    }
                    None => None,
                },
                BillingEvent::SubscriptionDeleted { customer_id } => {
                    match users::get_by_billing_customer(conn, customer_id)? {
                        Some(user) => {
                            users::downgrade_to_free(conn, user.id)?;
                            Some(user.id)
                        }
                        None => None,
                    }
                }
            };

            match affected {
                Some(user_id) => info!("Billing event {:?} applied to user {}", event, user_id),
                None => warn!("Billing event {:?} matched no user, ignoring", event),
            }
            Ok(affected)
        })
    }
}
