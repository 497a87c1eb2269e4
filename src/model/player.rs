use crate::model::ConnectionId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub connection_id: ConnectionId,
    pub username: String,
    pub score: u32,
    pub ready: bool,
}

impl Player {
    pub fn new(connection_id: ConnectionId, username: impl Into<String>) -> Self {
        Player {
            connection_id,
            username: username.into(),
            score: 0,
            ready: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_player() {
        let player = Player::new(ConnectionId::from("conn-1"), "alice");

        assert_eq!(player.connection_id.as_str(), "conn-1");
        assert_eq!(player.username, "alice");
        assert_eq!(player.score, 0);
        assert!(!player.ready);
    }
}
