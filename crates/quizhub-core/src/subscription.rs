use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tracing::{info, warn};

use quizhub_db::{Connection, Database, generations};
use quizhub_types::models::{Entitlement, FeatureSheet, LimitsInfo, SubscriptionTier, Usage, User};

use crate::error::{CoreError, CoreResult};

/// Daily generation allowance per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    pub free_daily: u32,
    pub premium_daily: u32,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            free_daily: 5,
            premium_daily: 50,
        }
    }
}

/// Entitlement checks and the generation quota.
///
/// Built once at start-up and cloned into whoever needs it. Every method takes
/// the request's `now` so that tier and quota window agree within one call.
#[derive(Clone)]
pub struct SubscriptionLimiter {
    db: Arc<Database>,
    limits: PlanLimits,
}

impl SubscriptionLimiter {
    pub fn new(db: Arc<Database>, limits: PlanLimits) -> Self {
        Self { db, limits }
    }

    /// Premium only while the stored tier is premium and the end date, if
    /// any, is still ahead. An expired premium reads as free here; the stored
    /// record is left for the billing webhook to downgrade.
    pub fn is_active_premium(&self, user: &User, now: DateTime<Utc>) -> bool {
        user.subscription_type == SubscriptionTier::Premium
            && user.subscription_ends_at.is_none_or(|ends| ends > now)
    }

    pub fn tier_of(&self, user: &User, now: DateTime<Utc>) -> Entitlement {
        if self.is_active_premium(user, now) {
            Entitlement {
                tier: SubscriptionTier::Premium,
                daily_limit: self.limits.premium_daily,
                can_access_premium: true,
            }
        } else {
            Entitlement {
                tier: SubscriptionTier::Free,
                daily_limit: self.limits.free_daily,
                can_access_premium: false,
            }
        }
    }

    /// Generations used in the current UTC day.
    pub fn usage_today(&self, user: &User, now: DateTime<Utc>) -> CoreResult<Usage> {
        let entitlement = self.tier_of(user, now);
        let (start, end) = day_window(now);

        let used = self
            .db
            .with_conn(|conn| generations::count_in_window(conn, user.id, start, end))?;
        let remaining = entitlement.daily_limit.saturating_sub(used);

        Ok(Usage {
            used,
            limit: entitlement.daily_limit,
            remaining,
            can_generate: remaining > 0,
            subscription_type: entitlement.tier,
        })
    }

    /// Check the quota without consuming it. `record_generation` runs only
    /// once the generation itself has succeeded.
    ///
    /// Two concurrent callers can both pass before either records, so the
    /// daily limit may be overshot by the number of in-flight generations.
    pub fn authorize_generation(&self, user: &User, now: DateTime<Utc>) -> CoreResult<Usage> {
        let usage = self.usage_today(user, now)?;
        if !usage.can_generate {
            warn!(
                "User {} hit the {} daily limit ({}/{})",
                user.id,
                usage.subscription_type.as_str(),
                usage.used,
                usage.limit
            );
            return Err(CoreError::QuotaExceeded {
                tier: usage.subscription_type,
                used: usage.used,
                limit: usage.limit,
            });
        }
        Ok(usage)
    }

    pub fn can_export_pdf(&self, user: &User, now: DateTime<Utc>) -> bool {
        self.is_active_premium(user, now)
    }

    pub fn limits_info(&self, user: &User, now: DateTime<Utc>) -> LimitsInfo {
        let entitlement = self.tier_of(user, now);
        let premium = entitlement.tier == SubscriptionTier::Premium;

        LimitsInfo {
            subscription_type: entitlement.tier,
            is_premium: premium,
            daily_generation_limit: entitlement.daily_limit,
            can_export_pdf: self.can_export_pdf(user, now),
            can_access_premium_content: entitlement.can_access_premium,
            subscription_ends_at: if premium { user.subscription_ends_at } else { None },
            features: FeatureSheet {
                daily_generation_limit: entitlement.daily_limit,
                unlimited_browsing: premium,
                pdf_export: premium,
                premium_content: entitlement.can_access_premium,
                custom_quizzes: true,
                priority_support: premium,
            },
        }
    }
}

/// Count one generation against `user_id`'s quota, on the caller's
/// connection. Runs in the transaction that saves the generated quiz.
pub fn record_generation(conn: &Connection, user_id: i64, now: DateTime<Utc>) -> CoreResult<()> {
    let id = generations::insert(conn, user_id, now)?;
    info!("Generation {} recorded for user {}", id, user_id);
    Ok(())
}

/// The UTC calendar day containing `now`, as `[start, end)`.
pub fn day_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}
