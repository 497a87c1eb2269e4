use crate::model::{AdminSnapshot, ConnectionId, GameError, GameSession, Player, SessionId};
use axum::extract::ws::Message;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};
use uuid::Uuid;

pub type EventSender = UnboundedSender<Message>;

/// Transport-side record of one admitted connection: its outbound queue
/// and, once joined, the session it belongs to.
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    pub connection_id: ConnectionId,
    pub sender: EventSender,
    pub session_id: Option<SessionId>,
}

impl ConnectionEntry {
    pub fn new(connection_id: ConnectionId, sender: EventSender) -> Self {
        ConnectionEntry {
            connection_id,
            sender,
            session_id: None,
        }
    }
}

/// The single source of truth for live state: active sessions, admitted
/// connections, registered admin observers and the pending deferred
/// game-over tasks. Constructed once at startup and shared by every
/// handler; nothing here survives a process restart.
pub struct Registry {
    sessions: RwLock<HashMap<SessionId, GameSession>>,
    connections: RwLock<HashMap<ConnectionId, ConnectionEntry>>,
    observers: RwLock<HashMap<ConnectionId, Uuid>>,
    pending_game_over: Mutex<HashMap<SessionId, JoinHandle<()>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            sessions: RwLock::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
            observers: RwLock::new(HashMap::new()),
            pending_game_over: Mutex::new(HashMap::new()),
        }
    }

    #[instrument(skip(self, entry), fields(connection_id = %entry.connection_id))]
    pub fn add_connection(&self, entry: ConnectionEntry) -> Result<(), GameError> {
        match self.connections.write() {
            Ok(mut connections) => {
                connections.insert(entry.connection_id.clone(), entry);
                debug!("connection admitted");
                Ok(())
            }
            Err(e) => {
                error!(%e, "failed to add connection");
                Err(GameError::Internal(e.to_string()))
            }
        }
    }

    #[instrument(skip(self))]
    pub fn remove_connection(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<Option<ConnectionEntry>, GameError> {
        match self.connections.write() {
            Ok(mut connections) => {
                let removed = connections.remove(connection_id);
                debug!(was_present = removed.is_some(), "connection removed");
                Ok(removed)
            }
            Err(e) => {
                error!(%e, "failed to remove connection");
                Err(GameError::Internal(e.to_string()))
            }
        }
    }

    pub fn connection(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<Option<ConnectionEntry>, GameError> {
        let connections = self
            .connections
            .read()
            .map_err(|e| GameError::Internal(e.to_string()))?;
        Ok(connections.get(connection_id).cloned())
    }

    pub fn connection_ids(&self) -> Result<Vec<ConnectionId>, GameError> {
        let connections = self
            .connections
            .read()
            .map_err(|e| GameError::Internal(e.to_string()))?;
        Ok(connections.keys().cloned().collect())
    }

    /// Records which session group a connection belongs to. A connection
    /// is a member of at most one session at a time.
    #[instrument(skip(self))]
    pub fn attach_session(
        &self,
        connection_id: &ConnectionId,
        session_id: SessionId,
    ) -> Result<(), GameError> {
        let mut connections = self
            .connections
            .write()
            .map_err(|e| GameError::Internal(e.to_string()))?;
        if let Some(entry) = connections.get_mut(connection_id) {
            entry.session_id = Some(session_id);
        }
        Ok(())
    }

    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    pub fn insert_session(&self, session: GameSession) -> Result<(), GameError> {
        match self.sessions.write() {
            Ok(mut sessions) => {
                sessions.insert(session.session_id, session);
                debug!("session created");
                Ok(())
            }
            Err(e) => {
                error!(%e, "failed to insert session");
                Err(GameError::Internal(e.to_string()))
            }
        }
    }

    /// Deletes a session and cancels its pending game-over broadcast, if
    /// any. Aborting an already-finished task is a no-op.
    #[instrument(skip(self))]
    pub fn remove_session(&self, session_id: &SessionId) -> Result<Option<GameSession>, GameError> {
        if let Some(handle) = self.clear_pending_game_over(session_id) {
            handle.abort();
        }
        match self.sessions.write() {
            Ok(mut sessions) => {
                let removed = sessions.remove(session_id);
                debug!(was_present = removed.is_some(), "session removed");
                Ok(removed)
            }
            Err(e) => {
                error!(%e, "failed to remove session");
                Err(GameError::Internal(e.to_string()))
            }
        }
    }

    pub fn session(&self, session_id: &SessionId) -> Result<Option<GameSession>, GameError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|e| GameError::Internal(e.to_string()))?;
        Ok(sessions.get(session_id).cloned())
    }

    pub fn contains_session(&self, session_id: &SessionId) -> Result<bool, GameError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|e| GameError::Internal(e.to_string()))?;
        Ok(sessions.contains_key(session_id))
    }

    /// Claims a slot in the first session open matchmaking may use, all
    /// under one write lock so two concurrent joins can never both take
    /// the same last slot. A player already seated somewhere rejoins
    /// that session instead. Scan order is map order, deliberately
    /// unspecified: any open slot is equally valid. Returns the joined
    /// session and its card layout, or `None` when no open slot exists.
    pub fn join_open_session(
        &self,
        player: Player,
    ) -> Result<Option<(SessionId, Vec<usize>)>, GameError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| GameError::Internal(e.to_string()))?;

        if let Some(session) = sessions
            .values()
            .find(|session| session.contains_player(&player.connection_id))
        {
            return Ok(Some((session.session_id, session.card_indexes.clone())));
        }

        for session in sessions.values_mut() {
            if session.is_open() && session.add_player(player.clone()) {
                debug!(session_id = %session.session_id, "claimed open slot");
                return Ok(Some((session.session_id, session.card_indexes.clone())));
            }
        }
        Ok(None)
    }

    /// Claims a slot in (or confirms membership of) one named session,
    /// under the write lock. Returns `None` when the session is gone or
    /// full, so the caller can substitute a fresh one.
    pub fn join_session(
        &self,
        session_id: &SessionId,
        player: Player,
    ) -> Result<Option<(SessionId, Vec<usize>)>, GameError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| GameError::Internal(e.to_string()))?;
        match sessions.get_mut(session_id) {
            Some(session) => {
                if session.contains_player(&player.connection_id) || session.add_player(player) {
                    Ok(Some((session.session_id, session.card_indexes.clone())))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    /// Runs a mutation against one session under the write lock. Returns
    /// `None` when the session no longer exists.
    pub fn with_session_mut<R>(
        &self,
        session_id: &SessionId,
        f: impl FnOnce(&mut GameSession) -> R,
    ) -> Result<Option<R>, GameError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| GameError::Internal(e.to_string()))?;
        Ok(sessions.get_mut(session_id).map(f))
    }

    /// Connection entries currently attached to a session group.
    pub fn session_members(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ConnectionEntry>, GameError> {
        let connections = self
            .connections
            .read()
            .map_err(|e| GameError::Internal(e.to_string()))?;
        Ok(connections
            .values()
            .filter(|entry| entry.session_id == Some(*session_id))
            .cloned()
            .collect())
    }

    #[instrument(skip(self, token))]
    pub fn register_observer(
        &self,
        connection_id: &ConnectionId,
        token: Uuid,
    ) -> Result<(), GameError> {
        match self.observers.write() {
            Ok(mut observers) => {
                observers.insert(connection_id.clone(), token);
                debug!("admin observer registered");
                Ok(())
            }
            Err(e) => {
                error!(%e, "failed to register observer");
                Err(GameError::Internal(e.to_string()))
            }
        }
    }

    pub fn revoke_observer(&self, connection_id: &ConnectionId) -> Result<(), GameError> {
        let mut observers = self
            .observers
            .write()
            .map_err(|e| GameError::Internal(e.to_string()))?;
        observers.remove(connection_id);
        Ok(())
    }

    pub fn observer_token(&self, connection_id: &ConnectionId) -> Result<Option<Uuid>, GameError> {
        let observers = self
            .observers
            .read()
            .map_err(|e| GameError::Internal(e.to_string()))?;
        Ok(observers.get(connection_id).copied())
    }

    /// Connection entries of every registered observer, for the
    /// state-mirror push.
    pub fn observer_entries(&self) -> Result<Vec<ConnectionEntry>, GameError> {
        let observers = self
            .observers
            .read()
            .map_err(|e| GameError::Internal(e.to_string()))?;
        let connections = self
            .connections
            .read()
            .map_err(|e| GameError::Internal(e.to_string()))?;
        Ok(observers
            .keys()
            .filter_map(|id| connections.get(id).cloned())
            .collect())
    }

    pub fn snapshot(&self) -> Result<AdminSnapshot, GameError> {
        let games = {
            let sessions = self
                .sessions
                .read()
                .map_err(|e| GameError::Internal(e.to_string()))?;
            sessions.values().cloned().collect()
        };
        Ok(AdminSnapshot {
            games,
            connections: self.connection_ids()?,
        })
    }

    /// Owns the deferred game-over broadcast for a session. Replacing a
    /// still-pending task cancels the old one.
    pub fn set_pending_game_over(&self, session_id: SessionId, handle: JoinHandle<()>) {
        let mut pending = match self.pending_game_over.lock() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(old) = pending.insert(session_id, handle) {
            old.abort();
        }
    }

    pub fn clear_pending_game_over(&self, session_id: &SessionId) -> Option<JoinHandle<()>> {
        let mut pending = match self.pending_game_over.lock() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending.remove(session_id)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> ConnectionEntry {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        ConnectionEntry::new(ConnectionId::from(id), tx)
    }

    #[tokio::test]
    async fn add_and_remove_connection() {
        let registry = Registry::new();
        registry.add_connection(entry("a")).unwrap();

        assert!(registry.connection(&ConnectionId::from("a")).unwrap().is_some());
        assert_eq!(registry.connection_ids().unwrap().len(), 1);

        registry.remove_connection(&ConnectionId::from("a")).unwrap();
        assert!(registry.connection(&ConnectionId::from("a")).unwrap().is_none());
    }

    #[tokio::test]
    async fn open_slot_claim_skips_full_and_invite_sessions() {
        let registry = Registry::new();

        let mut full = GameSession::with_pairs(2, false);
        full.add_player(Player::new(ConnectionId::from("a"), "alice"));
        full.add_player(Player::new(ConnectionId::from("b"), "bob"));
        let full_id = full.session_id;
        let invite = GameSession::with_pairs(2, true);

        registry.insert_session(full).unwrap();
        registry.insert_session(invite).unwrap();
        let joiner = Player::new(ConnectionId::from("c"), "carol");
        assert_eq!(registry.join_open_session(joiner.clone()).unwrap(), None);

        let open = GameSession::with_pairs(2, false);
        let open_id = open.session_id;
        registry.insert_session(open).unwrap();

        let (joined_id, _) = registry.join_open_session(joiner).unwrap().unwrap();
        assert_eq!(joined_id, open_id);
        let session = registry.session(&open_id).unwrap().unwrap();
        assert!(session.contains_player(&ConnectionId::from("c")));
        // the full session was left untouched
        let full = registry.session(&full_id).unwrap().unwrap();
        assert_eq!(full.players.len(), 2);
    }

    #[tokio::test]
    async fn named_session_claim_refuses_full_or_missing_sessions() {
        let registry = Registry::new();

        let mut full = GameSession::with_pairs(2, true);
        full.add_player(Player::new(ConnectionId::from("a"), "alice"));
        full.add_player(Player::new(ConnectionId::from("b"), "bob"));
        let full_id = full.session_id;
        registry.insert_session(full).unwrap();

        let carol = Player::new(ConnectionId::from("c"), "carol");
        assert_eq!(registry.join_session(&full_id, carol).unwrap(), None);
        assert_eq!(
            registry
                .join_session(&Uuid::new_v4(), Player::new(ConnectionId::from("d"), "dave"))
                .unwrap(),
            None
        );

        // a seated player re-claiming its own slot is confirmed, not duplicated
        let alice = Player::new(ConnectionId::from("a"), "alice");
        let (joined_id, _) = registry.join_session(&full_id, alice).unwrap().unwrap();
        assert_eq!(joined_id, full_id);
        assert_eq!(registry.session(&full_id).unwrap().unwrap().players.len(), 2);
    }

    #[tokio::test]
    async fn session_members_are_scoped_by_attachment() {
        let registry = Registry::new();
        let session = GameSession::with_pairs(2, false);
        let session_id = session.session_id;
        registry.insert_session(session).unwrap();

        registry.add_connection(entry("a")).unwrap();
        registry.add_connection(entry("b")).unwrap();
        registry.add_connection(entry("outsider")).unwrap();
        registry
            .attach_session(&ConnectionId::from("a"), session_id)
            .unwrap();
        registry
            .attach_session(&ConnectionId::from("b"), session_id)
            .unwrap();

        let members = registry.session_members(&session_id).unwrap();
        assert_eq!(members.len(), 2);
        assert!(members
            .iter()
            .all(|m| m.connection_id.as_str() != "outsider"));
    }

    #[tokio::test]
    async fn removing_a_session_cancels_its_pending_broadcast() {
        let registry = Registry::new();
        let session = GameSession::with_pairs(1, false);
        let session_id = session.session_id;
        registry.insert_session(session).unwrap();

        let handle = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        });
        registry.set_pending_game_over(session_id, handle);

        registry.remove_session(&session_id).unwrap();
        assert!(registry.clear_pending_game_over(&session_id).is_none());
        assert!(!registry.contains_session(&session_id).unwrap());
    }

    #[tokio::test]
    async fn observer_lifecycle() {
        let registry = Registry::new();
        registry.add_connection(entry("admin")).unwrap();

        let token = Uuid::new_v4();
        let admin = ConnectionId::from("admin");
        registry.register_observer(&admin, token).unwrap();
        assert_eq!(registry.observer_token(&admin).unwrap(), Some(token));
        assert_eq!(registry.observer_entries().unwrap().len(), 1);

        registry.revoke_observer(&admin).unwrap();
        assert_eq!(registry.observer_token(&admin).unwrap(), None);
    }
}
