pub mod model;
pub mod server;

pub mod prelude {
    pub use crate::model::ClientEvent;
    pub use crate::model::ConnectionId;
    pub use crate::model::GameError;
    pub use crate::model::GameOutcome;
    pub use crate::model::GameSession;
    pub use crate::model::JoinRequest;
    pub use crate::model::Player;
    pub use crate::model::ServerEvent;
    pub use crate::model::SessionId;
    pub use crate::model::SessionState;
    pub use crate::server::ConnectionHandler;
    pub use crate::server::Registry;
    pub use crate::server::ServerConfig;
}
