use crate::model::{ConnectionId, GameError, GameSession, JoinRequest, Player, SessionId};
use crate::server::Registry;
use tracing::{debug, instrument, warn};

/// What a joining client learns about its session before anyone is
/// ready: the id to share for invites, and the card layout.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub session_id: SessionId,
    pub card_indexes: Vec<usize>,
}

/// Attaches a connection to a session per the join request:
/// an invited session when one is named, otherwise the first open
/// session, otherwise a freshly created one.
///
/// An invite targeting an unknown (or already full) session falls back
/// to a fresh invite session; the substitution is observable to the
/// caller through the differing session id in the outcome.
#[instrument(skip(registry, request), fields(username = %request.username))]
pub fn resolve_session(
    registry: &Registry,
    connection_id: &ConnectionId,
    request: &JoinRequest,
) -> Result<JoinOutcome, GameError> {
    let player = Player::new(connection_id.clone(), request.username.clone());

    // Slot claims happen inside the registry under a single write lock,
    // so two simultaneous joins can never both land in a one-slot session.
    let joined = if request.is_invite {
        match request.session_id {
            Some(session_id) => {
                let joined = registry.join_session(&session_id, player.clone())?;
                if joined.is_none() {
                    warn!(%session_id, "invited session missing or full, substituting a fresh one");
                }
                joined
            }
            None => None,
        }
    } else if !request.create_invite {
        registry.join_open_session(player.clone())?
    } else {
        None
    };

    let (session_id, card_indexes) = match joined {
        Some(joined) => joined,
        None => {
            let mut session = GameSession::new(request.is_invite || request.create_invite);
            session.add_player(player);
            let session_id = session.session_id;
            let card_indexes = session.card_indexes.clone();
            debug!(%session_id, is_invite = session.is_invite, "creating session");
            registry.insert_session(session)?;
            (session_id, card_indexes)
        }
    };

    registry.attach_session(connection_id, session_id)?;

    Ok(JoinOutcome {
        session_id,
        card_indexes,
    })
}
