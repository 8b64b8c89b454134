pub mod auth;
pub mod error;
pub mod friends;
pub mod generator;
pub mod llm;
pub mod middleware;
pub mod notifications;
pub mod quizzes;
pub mod router;
pub mod scores;
pub mod state;
pub mod subscription;

pub use router::build_router;
pub use state::{AppState, AppStateInner};
