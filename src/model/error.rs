use crate::model::SessionId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("missing or empty identity token")]
    InvalidIdentity,
    #[error("no session with id {0}")]
    SessionNotFound(SessionId),
    #[error("unauthorized")]
    Unauthorized,
    #[error("malformed event payload")]
    MalformedEvent,
    #[error("internal error: {0}")]
    Internal(String),
}
