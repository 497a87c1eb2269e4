use crate::model::{deck, ConnectionId, Player, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Capacity of one match. The matchmaker must never route a third join
/// to a full session; `add_player` guards the invariant regardless.
pub const MAX_PLAYERS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    WaitingForPlayers,
    FullNotReady,
    FullReady,
    Resolved,
}

/// Outcome of a resolved game: the higher-scoring player's connection id,
/// or a draw. Serialized on the wire as that id string or the literal
/// `"draw"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum GameOutcome {
    Winner(ConnectionId),
    Draw,
}

pub const DRAW_MARKER: &str = "draw";

impl From<GameOutcome> for String {
    fn from(outcome: GameOutcome) -> Self {
        match outcome {
            GameOutcome::Winner(id) => id.into(),
            GameOutcome::Draw => DRAW_MARKER.to_string(),
        }
    }
}

impl From<String> for GameOutcome {
    fn from(value: String) -> Self {
        if value == DRAW_MARKER {
            GameOutcome::Draw
        } else {
            GameOutcome::Winner(ConnectionId::new(value))
        }
    }
}

/// One two-player match: card layout, scores, turn readiness and the
/// invite flag. Owned by the registry; mutated only by gateway handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub session_id: SessionId,
    pub players: HashMap<ConnectionId, Player>,
    pub card_indexes: Vec<usize>,
    pub pairs_remaining: usize,
    pub is_invite: bool,
}

impl GameSession {
    pub fn new(is_invite: bool) -> Self {
        Self::with_pairs(deck::DEFAULT_PAIRS, is_invite)
    }

    pub fn with_pairs(pairs: usize, is_invite: bool) -> Self {
        GameSession {
            session_id: Uuid::new_v4(),
            players: HashMap::new(),
            card_indexes: deck::shuffled_deck(pairs),
            pairs_remaining: pairs,
            is_invite,
        }
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    /// Eligible for open matchmaking: has a free slot and was not created
    /// for a specific pair of players.
    pub fn is_open(&self) -> bool {
        !self.is_full() && !self.is_invite
    }

    pub fn state(&self) -> SessionState {
        if self.pairs_remaining == 0 {
            SessionState::Resolved
        } else if !self.is_full() {
            SessionState::WaitingForPlayers
        } else if self.all_ready() {
            SessionState::FullReady
        } else {
            SessionState::FullNotReady
        }
    }

    pub fn contains_player(&self, connection_id: &ConnectionId) -> bool {
        self.players.contains_key(connection_id)
    }

    /// Adds a player unless the session is full or the id is already
    /// present. Returns whether the player was inserted.
    pub fn add_player(&mut self, player: Player) -> bool {
        if self.is_full() || self.contains_player(&player.connection_id) {
            return false;
        }
        self.players.insert(player.connection_id.clone(), player);
        true
    }

    pub fn remove_player(&mut self, connection_id: &ConnectionId) -> Option<Player> {
        self.players.remove(connection_id)
    }

    /// Marks the player ready. Returns whether the player exists.
    pub fn set_ready(&mut self, connection_id: &ConnectionId) -> bool {
        match self.players.get_mut(connection_id) {
            Some(player) => {
                player.ready = true;
                true
            }
            None => false,
        }
    }

    pub fn all_ready(&self) -> bool {
        self.is_full() && self.players.values().all(|p| p.ready)
    }

    /// Credits a revealed pair to the acting player and consumes one pair
    /// from the board. Returns the pairs still on the board, or `None`
    /// when the player is not part of this session or the board is
    /// already cleared. A stray `match` arriving in the window between
    /// resolution and the deferred broadcast must not move any score.
    pub fn record_match(&mut self, connection_id: &ConnectionId) -> Option<usize> {
        if self.pairs_remaining == 0 {
            return None;
        }
        let player = self.players.get_mut(connection_id)?;
        player.score += 1;
        self.pairs_remaining = self.pairs_remaining.saturating_sub(1);
        Some(self.pairs_remaining)
    }

    /// Winner by score once the board is cleared. Equal scores are a
    /// draw; a session drained to one player yields that player.
    pub fn outcome(&self) -> Option<GameOutcome> {
        if self.pairs_remaining > 0 || self.players.is_empty() {
            return None;
        }

        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by(|a, b| b.score.cmp(&a.score));

        match players.as_slice() {
            [first, second, ..] if first.score == second.score => Some(GameOutcome::Draw),
            [first, ..] => Some(GameOutcome::Winner(first.connection_id.clone())),
            [] => None,
        }
    }

    /// Invite sessions survive resolution: readiness clears and the board
    /// refills so the same pair can replay. Scores accumulate across
    /// rematches.
    pub fn reset_for_rematch(&mut self) {
        for player in self.players.values_mut() {
            player.ready = false;
        }
        self.pairs_remaining = self.card_indexes.len() / 2;
    }
}
