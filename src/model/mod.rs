mod connection;
pub mod deck;
mod error;
mod event;
mod player;
mod session;

pub use connection::{ConnectionId, SessionId};
pub use error::GameError;
pub use event::{AdminResult, AdminSnapshot, ClientEvent, JoinRequest, ServerEvent};
pub use player::Player;
pub use session::{GameOutcome, GameSession, SessionState, DRAW_MARKER, MAX_PLAYERS};
