use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use quizhub_db::{Database, friendships, is_constraint_violation, users};
use quizhub_types::events::NotificationPayload;
use quizhub_types::models::{
    Decision, Friendship, FriendshipRole, FriendshipStatus, FriendshipView, UserLite,
};

use crate::error::{CoreError, CoreResult, Rejection};
use crate::notifications::emit;

pub const SEARCH_LIMIT: u32 = 20;

/// What a `request` call did to the relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// No prior record; a new pending request was created.
    Created(Friendship),
    /// A declined record was turned back into a pending request.
    Reopened(Friendship),
    /// The other user had already asked; the pair is now friends.
    AutoAccepted(Friendship),
}

impl RequestOutcome {
    pub fn friendship(&self) -> &Friendship {
        match self {
            Self::Created(f) | Self::Reopened(f) | Self::AutoAccepted(f) => f,
        }
    }

    pub fn into_friendship(self) -> Friendship {
        match self {
            Self::Created(f) | Self::Reopened(f) | Self::AutoAccepted(f) => f,
        }
    }
}

/// Friend-request state machine over the relationship store.
///
/// Per unordered pair the states are absent, pending (directed), accepted and
/// declined. Every transition and the notification it produces commit in one
/// transaction; a rejected call writes nothing.
#[derive(Clone)]
pub struct FriendService {
    db: Arc<Database>,
}

impl FriendService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn request(&self, requester_id: i64, addressee_id: i64, now: DateTime<Utc>) -> CoreResult<RequestOutcome> {
        if requester_id == addressee_id {
            return Err(Rejection::SelfRequest.into());
        }

        let outcome = self
            .db
            .with_tx(|conn| -> CoreResult<RequestOutcome> {
                let actor = users::get_lite(conn, requester_id)?.ok_or(CoreError::NotFound)?;
                if users::get_lite(conn, addressee_id)?.is_none() {
                    return Err(CoreError::NotFound);
                }

                let Some(existing) = friendships::find_by_pair(conn, requester_id, addressee_id)? else {
                    let created = friendships::insert_pending(conn, requester_id, addressee_id, now)?;
                    emit(conn, addressee_id, Some(requester_id), request_payload(&created, &actor), now)?;
                    return Ok(RequestOutcome::Created(created));
                };

                match existing.status {
                    // They already asked us: the mutual request resolves at once
                    FriendshipStatus::Pending if existing.requester_id == addressee_id => {
                        friendships::update_status(conn, existing.id, FriendshipStatus::Accepted, now)?;
                        let accepted = Friendship {
                            status: FriendshipStatus::Accepted,
                            updated_at: now,
                            ..existing
                        };
                        let payload = NotificationPayload::FriendAccepted {
                            friendship_id: accepted.id,
                            by_user_id: actor.id,
                            by_username: actor.username.clone(),
                        };
                        emit(conn, addressee_id, Some(requester_id), payload, now)?;
                        Ok(RequestOutcome::AutoAccepted(accepted))
                    }
                    FriendshipStatus::Pending => Err(Rejection::AlreadyPending.into()),
                    FriendshipStatus::Accepted => Err(Rejection::AlreadyFriends.into()),
                    FriendshipStatus::Declined => {
                        friendships::reopen(conn, existing.id, requester_id, addressee_id, now)?;
                        let reopened = Friendship {
                            id: existing.id,
                            requester_id,
                            addressee_id,
                            status: FriendshipStatus::Pending,
                            created_at: now,
                            updated_at: now,
                        };
                        emit(conn, addressee_id, Some(requester_id), request_payload(&reopened, &actor), now)?;
                        Ok(RequestOutcome::Reopened(reopened))
                    }
                }
            })
            .map_err(|e| match e {
                CoreError::Storage(err) if is_constraint_violation(&err) => Rejection::Duplicate.into(),
                other => other,
            })?;

        let f = outcome.friendship();
        info!(
            "Friendship {} {} -> {} is now {}",
            f.id,
            f.requester_id,
            f.addressee_id,
            f.status.as_str()
        );
        Ok(outcome)
    }

    /// Accept or decline a pending request. Only the addressee may act.
    pub fn respond(
        &self,
        friendship_id: i64,
        acting_user_id: i64,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> CoreResult<Friendship> {
        let updated = self.db.with_tx(|conn| -> CoreResult<Friendship> {
            let existing = friendships::get(conn, friendship_id)?
                .filter(|f| f.involves(acting_user_id))
                .ok_or(CoreError::NotFound)?;

            if existing.addressee_id != acting_user_id {
                return Err(Rejection::NotAddressee.into());
            }
            if existing.status != FriendshipStatus::Pending {
                return Err(Rejection::NotPending.into());
            }

            let status = FriendshipStatus::from(decision);
            friendships::update_status(conn, existing.id, status, now)?;

            let actor = users::get_lite(conn, acting_user_id)?.ok_or(CoreError::NotFound)?;
            let payload = match decision {
                Decision::Accepted => NotificationPayload::FriendAccepted {
                    friendship_id: existing.id,
                    by_user_id: actor.id,
                    by_username: actor.username,
                },
                Decision::Declined => NotificationPayload::FriendDeclined {
                    friendship_id: existing.id,
                    by_user_id: actor.id,
                    by_username: actor.username,
                },
            };
            emit(conn, existing.requester_id, Some(acting_user_id), payload, now)?;

            Ok(Friendship {
                status,
                updated_at: now,
                ..existing
            })
        })?;

        info!(
            "Friendship {} {} by user {}",
            updated.id,
            updated.status.as_str(),
            acting_user_id
        );
        Ok(updated)
    }

    /// Cancel a pending request or dissolve a friendship. Either party may do
    /// it, whatever the state.
    pub fn remove(&self, friendship_id: i64, acting_user_id: i64) -> CoreResult<Friendship> {
        let removed = self.db.with_tx(|conn| {
            let existing = friendships::get(conn, friendship_id)?
                .filter(|f| f.involves(acting_user_id))
                .ok_or(CoreError::NotFound)?;
            friendships::delete(conn, existing.id)?;
            Ok::<_, CoreError>(existing)
        })?;

        info!("Friendship {} removed by user {}", removed.id, acting_user_id);
        Ok(removed)
    }

    pub fn list_friends(&self, user_id: i64) -> CoreResult<Vec<FriendshipView>> {
        self.list(user_id, FriendshipRole::Friends)
    }

    pub fn list_incoming(&self, user_id: i64) -> CoreResult<Vec<FriendshipView>> {
        self.list(user_id, FriendshipRole::Incoming)
    }

    pub fn list_outgoing(&self, user_id: i64) -> CoreResult<Vec<FriendshipView>> {
        self.list(user_id, FriendshipRole::Outgoing)
    }

    fn list(&self, user_id: i64, role: FriendshipRole) -> CoreResult<Vec<FriendshipView>> {
        Ok(self.db.with_conn(|conn| friendships::list_for(conn, user_id, role))?)
    }

    /// Case-insensitive substring search over username and email, never
    /// returning the caller.
    pub fn search(&self, query: &str, caller_id: i64) -> CoreResult<Vec<UserLite>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Rejection::EmptyQuery.into());
        }

        let found = self
            .db
            .with_conn(|conn| users::search(conn, query, caller_id, SEARCH_LIMIT))?;
        debug!("User search '{}' by {} matched {}", query, caller_id, found.len());
        Ok(found)
    }
}

fn request_payload(friendship: &Friendship, actor: &UserLite) -> NotificationPayload {
    NotificationPayload::FriendRequest {
        friendship_id: friendship.id,
        from_user_id: actor.id,
        from_username: actor.username.clone(),
    }
}
