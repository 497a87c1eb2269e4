use crate::model::{
    AdminResult, ClientEvent, ConnectionId, GameError, GameOutcome, ServerEvent, SessionId,
};
use crate::server::{matchmaker, ConnectionEntry, EventSender, Registry, ServerConfig};
use axum::extract::ws::Message;
use rand::seq::IteratorRandom;
use rand::thread_rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Client-side reveal animations need to finish before the result screen.
pub const GAME_OVER_DELAY: Duration = Duration::from_secs(2);

const ADMIN_DENIED: &str = "invalid admin credentials";

/// Per-connection gateway: owns the connection's identity, routes every
/// inbound event to exactly one handler and provides the three send
/// primitives (unicast, session broadcast, admin broadcast). All sends
/// are fire-and-forget.
#[derive(Clone)]
pub struct ConnectionHandler {
    registry: Arc<Registry>,
    config: Arc<ServerConfig>,
    connection_id: ConnectionId,
    admin_candidate: bool,
    sender: EventSender,
}

impl ConnectionHandler {
    /// Admits a connection. The identity token is required; an admin
    /// credential matching the configured secret only marks the
    /// connection as an observer *candidate*; standing admin status
    /// additionally requires a successful `adminLogin`.
    pub fn admit(
        registry: Arc<Registry>,
        config: Arc<ServerConfig>,
        identity: &str,
        admin_credential: Option<&str>,
        sender: EventSender,
    ) -> Result<Self, GameError> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(GameError::InvalidIdentity);
        }

        let connection_id = ConnectionId::from(identity);
        let admin_candidate = admin_credential
            .map(|credential| config.admin_secret_matches(credential))
            .unwrap_or(false);

        registry.add_connection(ConnectionEntry::new(connection_id.clone(), sender.clone()))?;
        info!(%connection_id, admin_candidate, "connection admitted");

        Ok(ConnectionHandler {
            registry,
            config,
            connection_id,
            admin_candidate,
            sender,
        })
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    #[instrument(skip(self, event), fields(connection_id = %self.connection_id))]
    pub fn handle_event(&self, event: ClientEvent) -> Result<(), GameError> {
        match event {
            ClientEvent::Join(request) => {
                let outcome = matchmaker::resolve_session(&self.registry, &self.connection_id, &request)?;
                self.unicast(&ServerEvent::JoinAck {
                    session_id: outcome.session_id,
                    card_indexes: outcome.card_indexes,
                })?;
                self.push_admin_update()
            }
            ClientEvent::PlayerReady => self.handle_player_ready(),
            ClientEvent::TurnOver(payload) => self.relay_to_others(ServerEvent::PlayerTurn(payload)),
            ClientEvent::CardClick(payload) => self.relay_to_others(ServerEvent::FlipCard(payload)),
            ClientEvent::Match => self.handle_match(),
            ClientEvent::RestartGame => self.unicast(&ServerEvent::MainScene),
            ClientEvent::AdminLogin { secret } => self.handle_admin_login(&secret),
            ClientEvent::AdminGetServerInfo { token } => self.handle_admin_info(&token),
        }
    }

    fn handle_player_ready(&self) -> Result<(), GameError> {
        let Some(session_id) = self.current_session()? else {
            warn!("playerReady with no attached session, ignoring");
            return Ok(());
        };

        let outcome = self
            .registry
            .with_session_mut(&session_id, |session| {
                // a ready retransmitted after the game started must not
                // re-roll the first player or re-broadcast startGame
                let was_all_ready = session.all_ready();
                if !session.set_ready(&self.connection_id) {
                    return None;
                }
                if was_all_ready || !session.all_ready() {
                    return Some(None);
                }
                let first_player = session.players.keys().choose(&mut thread_rng()).cloned()?;
                Some(Some((session.players.clone(), first_player)))
            })?
            .flatten();

        let Some(started) = outcome else {
            warn!(%session_id, "playerReady from a non-member, ignoring");
            return Ok(());
        };

        self.unicast(&ServerEvent::ReadyAck {
            players: self.connection_id.clone(),
        })?;

        if let Some((players, first_player)) = started {
            info!(%session_id, %first_player, "all players ready, starting game");
            self.broadcast_to_session(
                &session_id,
                &ServerEvent::StartGame {
                    players,
                    first_player,
                },
                None,
            )?;
        }

        self.push_admin_update()
    }

    fn handle_match(&self) -> Result<(), GameError> {
        let Some(session_id) = self.current_session()? else {
            warn!("match with no attached session, ignoring");
            return Ok(());
        };

        let resolution = self
            .registry
            .with_session_mut(&session_id, |session| {
                let remaining = session.record_match(&self.connection_id)?;
                if remaining > 0 {
                    return Some(None);
                }
                let outcome = session.outcome();
                let is_invite = session.is_invite;
                if is_invite {
                    // rematch allowed: readiness and board reset now,
                    // scores and session survive
                    session.reset_for_rematch();
                }
                Some(outcome.map(|outcome| (outcome, is_invite)))
            })?
            .flatten();

        let Some(resolution) = resolution else {
            warn!(%session_id, "match from a non-member or an already resolved session, ignoring");
            return Ok(());
        };

        self.broadcast_to_session(&session_id, &ServerEvent::AddScore, Some(&self.connection_id))?;

        if let Some((outcome, is_invite)) = resolution {
            info!(%session_id, ?outcome, "board cleared, scheduling gameOver");
            self.schedule_game_over(session_id, outcome, is_invite);
        }

        self.push_admin_update()
    }

    /// Defers the `gameOver` broadcast so client-side animations can
    /// finish. The task handle is owned by the registry; deleting the
    /// session cancels it.
    fn schedule_game_over(&self, session_id: SessionId, outcome: GameOutcome, is_invite: bool) {
        let handler = self.clone();
        let handle: JoinHandle<()> = tokio::spawn(async move {
            tokio::time::sleep(GAME_OVER_DELAY).await;
            handler.registry.clear_pending_game_over(&session_id);
            if let Err(e) = handler.finish_game(&session_id, outcome, is_invite) {
                error!(%session_id, %e, "failed to finish game");
            }
        });
        self.registry.set_pending_game_over(session_id, handle);
    }

    fn finish_game(
        &self,
        session_id: &SessionId,
        outcome: GameOutcome,
        is_invite: bool,
    ) -> Result<(), GameError> {
        // the session may have emptied out while the timer was pending
        if !self.registry.contains_session(session_id)? {
            debug!(%session_id, "session gone before gameOver fired");
            return Ok(());
        }

        self.broadcast_to_session(session_id, &ServerEvent::GameOver(outcome), None)?;

        if !is_invite {
            self.registry.remove_session(session_id)?;
            self.push_admin_update()?;
        }
        Ok(())
    }

    /// Standing admin status needs both the handshake credential and a
    /// correct login secret; either missing is the same `Unauthorized`.
    fn authorize_login(&self, secret: &str) -> Result<(), GameError> {
        if self.admin_candidate && self.config.admin_secret_matches(secret) {
            Ok(())
        } else {
            Err(GameError::Unauthorized)
        }
    }

    fn authorize_observer(&self, token: &str) -> Result<(), GameError> {
        let issued = self
            .registry
            .observer_token(&self.connection_id)?
            .ok_or(GameError::Unauthorized)?;
        let supplied = Uuid::parse_str(token).map_err(|_| GameError::Unauthorized)?;
        if supplied == issued {
            Ok(())
        } else {
            Err(GameError::Unauthorized)
        }
    }

    fn handle_admin_login(&self, secret: &str) -> Result<(), GameError> {
        let result = match self.authorize_login(secret) {
            Ok(()) => {
                let token = Uuid::new_v4();
                self.registry.register_observer(&self.connection_id, token)?;
                info!(connection_id = %self.connection_id, "admin observer registered");
                AdminResult::granted(token, self.registry.snapshot()?)
            }
            Err(GameError::Unauthorized) => {
                debug!(connection_id = %self.connection_id, "admin login refused");
                AdminResult::denied(ADMIN_DENIED)
            }
            Err(e) => return Err(e),
        };
        self.unicast(&ServerEvent::AdminResult(result))
    }

    fn handle_admin_info(&self, token: &str) -> Result<(), GameError> {
        let result = match self.authorize_observer(token) {
            Ok(()) => AdminResult::info(self.registry.snapshot()?),
            Err(GameError::Unauthorized) => AdminResult::denied(ADMIN_DENIED),
            Err(e) => return Err(e),
        };
        self.unicast(&ServerEvent::AdminResult(result))
    }

    /// Tears down everything this connection owns: its observer grant,
    /// its registry entry and its player slot. A session drained to zero
    /// players is deleted synchronously, cancelling any pending
    /// `gameOver` broadcast.
    #[instrument(skip(self), fields(connection_id = %self.connection_id))]
    pub fn disconnect(&self) -> Result<(), GameError> {
        self.registry.revoke_observer(&self.connection_id)?;
        let entry = self.registry.remove_connection(&self.connection_id)?;

        if let Some(session_id) = entry.and_then(|entry| entry.session_id) {
            let now_empty = self.registry.with_session_mut(&session_id, |session| {
                session.remove_player(&self.connection_id);
                session.players.is_empty()
            })?;

            if now_empty == Some(true) {
                info!(%session_id, "last player left, deleting session");
                self.registry.remove_session(&session_id)?;
            }
        }

        self.push_admin_update()
    }

    fn current_session(&self) -> Result<Option<SessionId>, GameError> {
        Ok(self
            .registry
            .connection(&self.connection_id)?
            .and_then(|entry| entry.session_id))
    }

    /// Pass-through relay to the other members of the caller's session.
    fn relay_to_others(&self, event: ServerEvent) -> Result<(), GameError> {
        let Some(session_id) = self.current_session()? else {
            warn!("relay with no attached session, ignoring");
            return Ok(());
        };
        self.broadcast_to_session(&session_id, &event, Some(&self.connection_id))
    }

    fn unicast(&self, event: &ServerEvent) -> Result<(), GameError> {
        let message = encode(event)?;
        if let Err(e) = self.sender.send(message) {
            debug!(connection_id = %self.connection_id, %e, "dropping unicast to closed connection");
        }
        Ok(())
    }

    fn broadcast_to_session(
        &self,
        session_id: &SessionId,
        event: &ServerEvent,
        except: Option<&ConnectionId>,
    ) -> Result<(), GameError> {
        let message = encode(event)?;
        for member in self.registry.session_members(session_id)? {
            if except == Some(&member.connection_id) {
                continue;
            }
            if let Err(e) = member.sender.send(message.clone()) {
                debug!(connection_id = %member.connection_id, %e, "dropping broadcast to closed connection");
            }
        }
        Ok(())
    }

    fn broadcast_to_admins(&self, event: &ServerEvent) -> Result<(), GameError> {
        let message = encode(event)?;
        for observer in self.registry.observer_entries()? {
            if let Err(e) = observer.sender.send(message.clone()) {
                debug!(connection_id = %observer.connection_id, %e, "dropping admin push to closed connection");
            }
        }
        Ok(())
    }

    /// Mirrors the full registry to every observer. Called after each
    /// mutating event; a snapshot, not a diff.
    fn push_admin_update(&self) -> Result<(), GameError> {
        let snapshot = self.registry.snapshot()?;
        self.broadcast_to_admins(&ServerEvent::AdminUpdateData(snapshot))
    }
}

fn encode(event: &ServerEvent) -> Result<Message, GameError> {
    let text = serde_json::to_string(event)
        .map_err(|e| GameError::Internal(format!("failed to encode event: {e}")))?;
    Ok(Message::Text(text))
}
