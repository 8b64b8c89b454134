use quizhub_types::models::SubscriptionTier;

/// Why an otherwise well-formed action was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("You cannot send a friend request to yourself")]
    SelfRequest,
    #[error("A friend request between you is already pending")]
    AlreadyPending,
    #[error("You are already friends")]
    AlreadyFriends,
    #[error("A relationship between these users already exists")]
    Duplicate,
    #[error("Only the recipient can respond to this request")]
    NotAddressee,
    #[error("This request is no longer pending")]
    NotPending,
    #[error("Search query must not be empty")]
    EmptyQuery,
    #[error("An account with this email already exists")]
    EmailTaken,
    #[error("Invalid or expired reset token")]
    InvalidResetToken,
}

impl Rejection {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SelfRequest => "self_request",
            Self::AlreadyPending => "already_pending",
            Self::AlreadyFriends => "already_friends",
            Self::Duplicate => "duplicate",
            Self::NotAddressee => "not_addressee",
            Self::NotPending => "not_pending",
            Self::EmptyQuery => "empty_query",
            Self::EmailTaken => "email_taken",
            Self::InvalidResetToken => "invalid_reset_token",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    InvalidOperation(Rejection),

    /// Unknown id, or an id the actor has no claim on.
    #[error("Not found")]
    NotFound,

    #[error("Daily limit of {limit} quiz generations reached")]
    QuotaExceeded {
        tier: SubscriptionTier,
        used: u32,
        limit: u32,
    },

    #[error("This quiz requires a premium subscription")]
    PremiumRequired,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<Rejection> for CoreError {
    fn from(reason: Rejection) -> Self {
        Self::InvalidOperation(reason)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
