use crate::model::{ConnectionId, GameError, GameOutcome, GameSession, Player, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub username: String,
    #[serde(default)]
    pub is_invite: bool,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub create_invite: bool,
}

/// The closed set of inbound events. Frames that fail to parse into this
/// enum are malformed and dropped by the gateway, never dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "join")]
    Join(JoinRequest),
    #[serde(rename = "playerReady")]
    PlayerReady,
    /// Opaque relay: the acting client ended its turn.
    #[serde(rename = "turnOver")]
    TurnOver(Value),
    /// The acting client reports a successful pair reveal.
    #[serde(rename = "match")]
    Match,
    /// Opaque relay: a card was flipped face-up.
    #[serde(rename = "cardClick")]
    CardClick(Value),
    #[serde(rename = "restartGame")]
    RestartGame,
    #[serde(rename = "adminLogin")]
    AdminLogin { secret: String },
    #[serde(rename = "admin_getServerInfo")]
    AdminGetServerInfo { token: String },
}

impl ClientEvent {
    /// Parses one inbound frame. Unknown event names and unparseable
    /// payloads are a single `MalformedEvent` outcome; the gateway drops
    /// them without dispatching.
    pub fn parse(text: &str) -> Result<Self, GameError> {
        serde_json::from_str(text).map_err(|_| GameError::MalformedEvent)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "joinAck", rename_all = "camelCase")]
    JoinAck {
        session_id: SessionId,
        card_indexes: Vec<usize>,
    },
    #[serde(rename = "readyAck")]
    ReadyAck { players: ConnectionId },
    #[serde(rename = "startGame", rename_all = "camelCase")]
    StartGame {
        players: HashMap<ConnectionId, Player>,
        first_player: ConnectionId,
    },
    #[serde(rename = "playerTurn")]
    PlayerTurn(Value),
    #[serde(rename = "addScore")]
    AddScore,
    #[serde(rename = "flipCard")]
    FlipCard(Value),
    #[serde(rename = "gameOver")]
    GameOver(GameOutcome),
    #[serde(rename = "mainScene")]
    MainScene,
    #[serde(rename = "admin_updateData")]
    AdminUpdateData(AdminSnapshot),
    #[serde(rename = "adminResult")]
    AdminResult(AdminResult),
}

/// Full registry mirror pushed to observers on every mutation. A
/// snapshot, not a diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AdminSnapshot {
    pub games: Vec<GameSession>,
    pub connections: Vec<ConnectionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub games: Option<Vec<GameSession>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<Vec<ConnectionId>>,
}

impl AdminResult {
    pub fn granted(token: Uuid, snapshot: AdminSnapshot) -> Self {
        AdminResult {
            success: true,
            message: None,
            token: Some(token),
            games: Some(snapshot.games),
            connections: Some(snapshot.connections),
        }
    }

    pub fn info(snapshot: AdminSnapshot) -> Self {
        AdminResult {
            success: true,
            message: None,
            token: None,
            games: Some(snapshot.games),
            connections: Some(snapshot.connections),
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        AdminResult {
            success: false,
            message: Some(message.into()),
            token: None,
            games: None,
            connections: None,
        }
    }
}
