//! The session manager: tracks every seated player on the server.
//!
//! Responsibilities:
//! - Issuing a session (id + secret token) when a player takes a seat
//! - Resolving "which room and seat does this caller occupy?" per message
//! - Validating reconnection tokens inside the grace window
//! - Expiring and reaping sessions whose players never came back
//!
//! # Concurrency note
//!
//! `SessionManager` is not thread-safe by itself — plain `HashMap`s,
//! no locks. The server owns exactly one instance behind a mutex at a
//! higher level; keeping this type simple avoids hidden locking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use castle_protocol::{RoomCode, Seat, SessionId, SessionToken};
use rand::Rng;

use crate::{Session, SessionConfig, SessionError, SessionState};

/// Registry of every live (or recently dropped) session.
///
/// ## Lifecycle
///
/// ```text
/// create() ──→ [Connected] ──disconnect()──→ [Disconnected]
///                   ↑                              │
///                   └──────── resume(token) ───────┤
///                                                  ▼ (grace elapses)
///                                   expire_stale() → [Expired] → cleanup_expired()
/// ```
pub struct SessionManager {
    /// All sessions, keyed by id.
    sessions: HashMap<SessionId, Session>,

    /// Index from reconnection token to session id, kept in sync with
    /// `sessions` so a resume is one lookup rather than a scan.
    tokens: HashMap<SessionToken, SessionId>,

    /// Next id to allocate.
    next_id: u64,

    config: SessionConfig,
}

impl SessionManager {
    /// Creates an empty manager with the given config.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            tokens: HashMap::new(),
            next_id: 1,
            config,
        }
    }

    /// Allocates a session id without creating a record yet.
    ///
    /// The room actor wants the occupant's id *in* the join request, but
    /// the seat isn't known until the room answers — so the gateway
    /// allocates first and binds after the grant. An id whose join was
    /// rejected is simply never bound.
    pub fn allocate(&mut self) -> SessionId {
        let id = SessionId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Issues a fresh session bound to `(room, seat)`.
    ///
    /// A session only ever exists for a player who actually holds a seat.
    pub fn create(&mut self, room: RoomCode, seat: Seat) -> &Session {
        let id = self.allocate();
        self.bind(id, room, seat)
    }

    /// Creates the record for a previously allocated id, once the room
    /// has granted a seat.
    pub fn bind(&mut self, id: SessionId, room: RoomCode, seat: Seat) -> &Session {
        let token = SessionToken::generate(&mut rand::rng());
        let session = Session {
            id,
            token: token.clone(),
            room: room.clone(),
            seat,
            state: SessionState::Connected,
        };

        self.tokens.insert(token, id);
        self.sessions.insert(id, session);

        tracing::info!(session = %id, %room, %seat, "session created");
        self.sessions.get(&id).expect("just inserted")
    }

    /// Looks up a session by id.
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// The `(room, seat)` a session occupies — the per-message caller
    /// resolution the gateway performs.
    pub fn resolve(&self, id: SessionId) -> Option<(RoomCode, Seat)> {
        self.sessions
            .get(&id)
            .map(|s| (s.room.clone(), s.seat))
    }

    /// Marks a session disconnected, starting its grace window.
    pub fn disconnect(&mut self, id: SessionId) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound(id))?;

        session.state = SessionState::Disconnected {
            since: Instant::now(),
        };

        tracing::info!(session = %id, "session disconnected, grace window open");
        Ok(())
    }

    /// Resumes a disconnected session by its token.
    ///
    /// # Errors
    /// - [`SessionError::InvalidToken`] — token not recognized
    /// - [`SessionError::SessionExpired`] — grace window elapsed
    /// - [`SessionError::AlreadyConnected`] — nothing to resume
    pub fn resume(&mut self, token: &SessionToken) -> Result<&Session, SessionError> {
        let id = self
            .tokens
            .get(token)
            .copied()
            .ok_or(SessionError::InvalidToken)?;

        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::InvalidToken)?;

        match &session.state {
            SessionState::Disconnected { since } => {
                let grace = Duration::from_secs(self.config.reconnect_grace_secs);
                if since.elapsed() > grace {
                    session.state = SessionState::Expired;
                    return Err(SessionError::SessionExpired(id));
                }
                session.state = SessionState::Connected;
                tracing::info!(session = %id, "session resumed");
                Ok(self.sessions.get(&id).expect("just modified"))
            }
            SessionState::Connected => Err(SessionError::AlreadyConnected(id)),
            SessionState::Expired => Err(SessionError::SessionExpired(id)),
        }
    }

    /// Removes a session outright (room torn down or terminated).
    /// Idempotent — removing an unknown id is a no-op.
    pub fn remove(&mut self, id: SessionId) {
        if let Some(session) = self.sessions.remove(&id) {
            self.tokens.remove(&session.token);
            tracing::debug!(session = %id, "session removed");
        }
    }

    /// Removes every session seated in `room`. Used when a room dies so
    /// its sessions don't linger until the reaper gets to them.
    pub fn remove_room(&mut self, room: &RoomCode) {
        self.sessions.retain(|_, session| {
            if session.room == *room {
                self.tokens.remove(&session.token);
                false
            } else {
                true
            }
        });
    }

    /// Expires every disconnected session whose grace window has closed.
    /// Returns the ids that expired. Driven by the server's periodic sweep.
    pub fn expire_stale(&mut self) -> Vec<SessionId> {
        let grace = Duration::from_secs(self.config.reconnect_grace_secs);
        let mut expired = Vec::new();

        for session in self.sessions.values_mut() {
            if let SessionState::Disconnected { since } = &session.state {
                if since.elapsed() > grace {
                    session.state = SessionState::Expired;
                    expired.push(session.id);
                    tracing::info!(session = %session.id, "session expired");
                }
            }
        }

        expired
    }

    /// Drops all expired sessions. Separate from [`expire_stale`] so the
    /// caller can react to an expiry (force-terminate the room) before
    /// the record disappears.
    ///
    /// [`expire_stale`]: Self::expire_stale
    pub fn cleanup_expired(&mut self) {
        self.sessions.retain(|_, session| {
            if matches!(session.state, SessionState::Expired) {
                self.tokens.remove(&session.token);
                false
            } else {
                true
            }
        });
    }

    /// Number of tracked sessions, in any state.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// `true` if no sessions are tracked.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Grace-window behavior is tested with two configs instead of
    //! sleeps: a 0-second grace (everything expires immediately) and a
    //! 1-hour grace (nothing expires during the test). Fast and
    //! deterministic.

    use super::*;

    fn manager_with_instant_expiry() -> SessionManager {
        SessionManager::new(SessionConfig {
            reconnect_grace_secs: 0,
        })
    }

    fn manager_with_long_grace() -> SessionManager {
        SessionManager::new(SessionConfig {
            reconnect_grace_secs: 3600,
        })
    }

    fn room(code: &str) -> RoomCode {
        code.parse().expect("valid test room code")
    }

    // =====================================================================
    // create() / resolve()
    // =====================================================================

    #[test]
    fn test_create_returns_connected_bound_session() {
        let mut mgr = manager_with_long_grace();

        let session = mgr.create(room("AAAAAA"), Seat::White);

        assert!(matches!(session.state, SessionState::Connected));
        assert_eq!(session.room, room("AAAAAA"));
        assert_eq!(session.seat, Seat::White);
        assert_eq!(session.token.as_str().len(), 32);
    }

    #[test]
    fn test_create_allocates_distinct_ids_and_tokens() {
        let mut mgr = manager_with_long_grace();

        let (id1, token1) = {
            let s = mgr.create(room("AAAAAA"), Seat::White);
            (s.id, s.token.clone())
        };
        let (id2, token2) = {
            let s = mgr.create(room("AAAAAA"), Seat::Black);
            (s.id, s.token.clone())
        };

        assert_ne!(id1, id2);
        assert_ne!(token1, token2, "tokens must be unique per session");
    }

    #[test]
    fn test_allocate_then_bind_matches_create() {
        let mut mgr = manager_with_long_grace();

        let id = mgr.allocate();
        assert!(mgr.get(id).is_none(), "no record until bound");

        let session = mgr.bind(id, room("AAAAAA"), Seat::Black);
        assert_eq!(session.id, id);
        assert_eq!(session.seat, Seat::Black);

        // An allocated-but-never-bound id stays invisible.
        let ghost = mgr.allocate();
        assert!(mgr.get(ghost).is_none());
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn test_resolve_returns_room_and_seat() {
        let mut mgr = manager_with_long_grace();
        let id = mgr.create(room("XY99ZZ"), Seat::Black).id;

        assert_eq!(mgr.resolve(id), Some((room("XY99ZZ"), Seat::Black)));
    }

    #[test]
    fn test_resolve_unknown_session_is_none() {
        let mgr = manager_with_long_grace();
        assert_eq!(mgr.resolve(SessionId(99)), None);
    }

    // =====================================================================
    // disconnect()
    // =====================================================================

    #[test]
    fn test_disconnect_marks_session_disconnected() {
        let mut mgr = manager_with_long_grace();
        let id = mgr.create(room("AAAAAA"), Seat::White).id;

        mgr.disconnect(id).expect("should succeed");

        let session = mgr.get(id).expect("session should still exist");
        assert!(matches!(session.state, SessionState::Disconnected { .. }));
    }

    #[test]
    fn test_disconnect_unknown_session_returns_not_found() {
        let mut mgr = manager_with_long_grace();

        let result = mgr.disconnect(SessionId(99));

        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_disconnect_preserves_token_and_binding() {
        let mut mgr = manager_with_long_grace();
        let (id, token) = {
            let s = mgr.create(room("AAAAAA"), Seat::White);
            (s.id, s.token.clone())
        };

        mgr.disconnect(id).unwrap();

        let session = mgr.get(id).unwrap();
        assert_eq!(session.token, token, "token must survive a disconnect");
        assert_eq!(session.seat, Seat::White);
    }

    // =====================================================================
    // resume()
    // =====================================================================

    #[test]
    fn test_resume_valid_token_restores_connected() {
        let mut mgr = manager_with_long_grace();
        let (id, token) = {
            let s = mgr.create(room("AAAAAA"), Seat::Black);
            (s.id, s.token.clone())
        };
        mgr.disconnect(id).unwrap();

        let session = mgr.resume(&token).expect("should succeed");

        assert!(matches!(session.state, SessionState::Connected));
        assert_eq!(session.id, id);
        assert_eq!(session.seat, Seat::Black);
    }

    #[test]
    fn test_resume_unknown_token_returns_invalid() {
        let mut mgr = manager_with_long_grace();
        let id = mgr.create(room("AAAAAA"), Seat::White).id;
        mgr.disconnect(id).unwrap();

        let result = mgr.resume(&SessionToken::from("0".repeat(32)));

        assert!(matches!(result, Err(SessionError::InvalidToken)));
    }

    #[test]
    fn test_resume_after_grace_returns_expired() {
        let mut mgr = manager_with_instant_expiry();
        let (id, token) = {
            let s = mgr.create(room("AAAAAA"), Seat::White);
            (s.id, s.token.clone())
        };
        mgr.disconnect(id).unwrap();

        let result = mgr.resume(&token);

        assert!(
            matches!(result, Err(SessionError::SessionExpired(e)) if e == id)
        );
    }

    #[test]
    fn test_resume_while_connected_returns_error() {
        let mut mgr = manager_with_long_grace();
        let token = mgr.create(room("AAAAAA"), Seat::White).token.clone();

        let result = mgr.resume(&token);

        assert!(matches!(result, Err(SessionError::AlreadyConnected(_))));
    }

    // =====================================================================
    // expire_stale() / cleanup_expired()
    // =====================================================================

    #[test]
    fn test_expire_stale_only_touches_disconnected_sessions() {
        let mut mgr = manager_with_instant_expiry();
        let id1 = mgr.create(room("AAAAAA"), Seat::White).id;
        let id2 = mgr.create(room("AAAAAA"), Seat::Black).id;
        mgr.disconnect(id1).unwrap();

        let expired = mgr.expire_stale();

        assert_eq!(expired, vec![id1]);
        assert!(matches!(
            mgr.get(id2).unwrap().state,
            SessionState::Connected
        ));
    }

    #[test]
    fn test_expire_stale_skips_sessions_within_grace() {
        let mut mgr = manager_with_long_grace();
        let id = mgr.create(room("AAAAAA"), Seat::White).id;
        mgr.disconnect(id).unwrap();

        assert!(mgr.expire_stale().is_empty());
    }

    #[test]
    fn test_cleanup_expired_removes_sessions_and_tokens() {
        let mut mgr = manager_with_instant_expiry();
        let (id, token) = {
            let s = mgr.create(room("AAAAAA"), Seat::White);
            (s.id, s.token.clone())
        };
        mgr.disconnect(id).unwrap();
        mgr.expire_stale();
        assert_eq!(mgr.len(), 1);

        mgr.cleanup_expired();

        assert!(mgr.is_empty());
        assert!(
            matches!(mgr.resume(&token), Err(SessionError::InvalidToken)),
            "reaped token must stop resolving"
        );
    }

    // =====================================================================
    // remove() / remove_room()
    // =====================================================================

    #[test]
    fn test_remove_is_idempotent() {
        let mut mgr = manager_with_long_grace();
        let id = mgr.create(room("AAAAAA"), Seat::White).id;

        mgr.remove(id);
        mgr.remove(id); // second remove: no effect, no panic

        assert!(mgr.is_empty());
    }

    #[test]
    fn test_remove_room_drops_both_seats_and_spares_others() {
        let mut mgr = manager_with_long_grace();
        mgr.create(room("AAAAAA"), Seat::White);
        mgr.create(room("AAAAAA"), Seat::Black);
        let other = mgr.create(room("BBBBBB"), Seat::White).id;

        mgr.remove_room(&room("AAAAAA"));

        assert_eq!(mgr.len(), 1);
        assert!(mgr.get(other).is_some());
    }

    // =====================================================================
    // Full lifecycle
    // =====================================================================

    #[test]
    fn test_full_lifecycle_disconnect_then_resume() {
        let mut mgr = manager_with_long_grace();
        let (id, token) = {
            let s = mgr.create(room("AAAAAA"), Seat::White);
            (s.id, s.token.clone())
        };

        mgr.disconnect(id).unwrap();
        mgr.resume(&token).unwrap();

        assert!(matches!(
            mgr.get(id).unwrap().state,
            SessionState::Connected
        ));
    }

    #[test]
    fn test_independent_sessions_do_not_interfere() {
        let mut mgr = manager_with_long_grace();
        let (id1, token1) = {
            let s = mgr.create(room("AAAAAA"), Seat::White);
            (s.id, s.token.clone())
        };
        let id2 = mgr.create(room("AAAAAA"), Seat::Black).id;

        mgr.disconnect(id1).unwrap();
        mgr.resume(&token1).unwrap();

        assert!(matches!(
            mgr.get(id2).unwrap().state,
            SessionState::Connected
        ));
    }
}
