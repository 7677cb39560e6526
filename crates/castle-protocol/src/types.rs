//! Core protocol types for Castle's wire format.
//!
//! Everything in this module either travels on the wire or identifies
//! something that does: seats, room codes, session identity, the clock
//! snapshot that rides along with every move, and the two message enums
//! the client and server exchange.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Seat
// ---------------------------------------------------------------------------

/// One of the two competing sides in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seat {
    White,
    Black,
}

impl Seat {
    /// Both seats, in assignment order (white is tried first on join).
    pub const ALL: [Seat; 2] = [Seat::White, Seat::Black];

    /// The other seat.
    pub fn opponent(self) -> Seat {
        match self {
            Seat::White => Seat::Black,
            Seat::Black => Seat::White,
        }
    }

    /// Stable index for per-seat arrays (`white = 0`, `black = 1`).
    pub fn index(self) -> usize {
        match self {
            Seat::White => 0,
            Seat::Black => 1,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seat::White => write!(f, "white"),
            Seat::Black => write!(f, "black"),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomCode
// ---------------------------------------------------------------------------

/// Characters a room code may contain.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of a room code.
pub const ROOM_CODE_LEN: usize = 6;

/// A short, human-shareable room identifier: six uppercase alphanumerics.
///
/// Codes are what players type to join a friend's game, so they are kept
/// short and unambiguous rather than collision-proof — the registry
/// regenerates on the (rare) collision instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Generates a fresh random code.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..ROOM_CODE_LEN)
            .map(|_| {
                let i = rng.random_range(0..ROOM_CODE_ALPHABET.len());
                ROOM_CODE_ALPHABET[i] as char
            })
            .collect();
        Self(code)
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() != ROOM_CODE_LEN {
            return Err(format!(
                "room code must be {ROOM_CODE_LEN} characters, got {}",
                value.len()
            ));
        }
        if !value.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)) {
            return Err("room code must be uppercase letters and digits".into());
        }
        Ok(Self(value))
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> String {
        code.0
    }
}

impl FromStr for RoomCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_owned())
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Session identity
// ---------------------------------------------------------------------------

/// A unique identifier for one player session.
///
/// Allocated by the session manager when a seat is first taken. The room
/// only ever sees this opaque id — never the connection behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// A secret token identifying a session across reconnects.
///
/// Issued once at first join and presented again on rejoin. Reconnection
/// is matched on this token, never on the transport connection — a client
/// that drops and redials gets a brand-new socket but keeps its token.
///
/// 32 lowercase hex characters (128 bits of entropy).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generates a fresh random token.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let bytes: [u8; 16] = rng.random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// The token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// Time control and clock snapshot
// ---------------------------------------------------------------------------

/// Initial time and per-move increment for a game, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeControl {
    /// Starting time on each player's clock.
    pub initial: u64,
    /// Seconds credited to the mover's clock after each completed move.
    pub increment: u64,
}

impl TimeControl {
    /// Starting time as a [`Duration`].
    pub fn initial(&self) -> Duration {
        Duration::from_secs(self.initial)
    }

    /// Increment as a [`Duration`].
    pub fn increment(&self) -> Duration {
        Duration::from_secs(self.increment)
    }
}

/// Both players' remaining time in seconds, as broadcast with every move.
///
/// Fractional because clients report sub-second remaining time; the
/// server stores it as-is and never rounds on their behalf.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockSnapshot {
    pub white: f64,
    pub black: f64,
}

// ---------------------------------------------------------------------------
// Client → server messages
// ---------------------------------------------------------------------------

/// Everything a client can ask the server to do.
///
/// Internally tagged (`{"type": "joinRoom", ...}`) with camelCase tags and
/// fields, matching what a browser client serializes naturally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Allocate a fresh room with the given time control.
    CreateRoom { time_control: TimeControl },

    /// Take a seat in a room, or resume a vacated one.
    ///
    /// `resume` carries the session token from a previous `joined`
    /// response; when present and valid it reclaims the caller's old
    /// seat ahead of any other assignment rule.
    JoinRoom {
        room_id: RoomCode,
        is_creator: bool,
        #[serde(default)]
        resume: Option<SessionToken>,
    },

    /// Play a move, reporting the mover's own remaining time in seconds.
    Move {
        room_id: RoomCode,
        #[serde(rename = "move")]
        mv: String,
        remaining_reported: f64,
    },

    /// Resign the game for `seat`.
    Resign { room_id: RoomCode, seat: Seat },

    /// Offer the opponent a draw.
    OfferDraw { room_id: RoomCode, seat: Seat },

    /// Answer an outstanding draw offer.
    DrawResponse { room_id: RoomCode, accepted: bool },

    /// Claim that `seat`'s own flag has fallen.
    TimeOut { room_id: RoomCode, seat: Seat },

    /// Tear the room down (leaving the post-game screen).
    Teardown { room_id: RoomCode },
}

// ---------------------------------------------------------------------------
// Server → client messages
// ---------------------------------------------------------------------------

/// Everything the server sends back, as replies or room broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Reply to `createRoom`.
    RoomCreated { room_id: RoomCode },

    /// Reply to `joinRoom`: the caller's seat, its reconnection token,
    /// and the room's current clock and position.
    Joined {
        seat: Seat,
        token: SessionToken,
        clock: ClockSnapshot,
        position: String,
    },

    /// Broadcast when the second seat fills and the game begins.
    Activated {
        white: SessionId,
        black: SessionId,
        clock: ClockSnapshot,
    },

    /// Broadcast after every accepted move.
    MoveApplied {
        position: String,
        #[serde(rename = "move")]
        mv: String,
        clock: ClockSnapshot,
    },

    /// Broadcast when the game reaches any terminal state.
    GameOver { result: String },

    /// Sent to the opponent only when a draw is offered.
    DrawOffered { from: Seat },

    /// Sent to a repeat offerer only: one more offer disables the feature.
    DrawWarning,

    /// Sent to the offerer only: draw offers are disabled for this seat.
    DrawDisabled,

    /// Broadcast when a seat's connection drops.
    PlayerDisconnected { seat: Seat },

    /// Unicast error reply, never broadcast. `code` follows HTTP
    /// conventions (400 bad request, 403 forbidden, 404 not found,
    /// 409 conflict).
    Error { code: u16, message: String },
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The client SDK parses these exact JSON shapes, so every message
    //! variant gets a format test — a serde attribute typo here breaks
    //! the wire, not the build.

    use super::*;

    fn json(value: &impl Serialize) -> serde_json::Value {
        serde_json::to_value(value).unwrap()
    }

    // =====================================================================
    // Seat
    // =====================================================================

    #[test]
    fn test_seat_serializes_lowercase() {
        assert_eq!(json(&Seat::White), serde_json::json!("white"));
        assert_eq!(json(&Seat::Black), serde_json::json!("black"));
    }

    #[test]
    fn test_seat_opponent_is_involutive() {
        for seat in Seat::ALL {
            assert_eq!(seat.opponent().opponent(), seat);
            assert_ne!(seat.opponent(), seat);
        }
    }

    #[test]
    fn test_seat_display() {
        assert_eq!(Seat::White.to_string(), "white");
        assert_eq!(Seat::Black.to_string(), "black");
    }

    // =====================================================================
    // RoomCode
    // =====================================================================

    #[test]
    fn test_room_code_generate_uses_declared_alphabet() {
        let mut rng = rand::rng();
        for _ in 0..100 {
            let code = RoomCode::generate(&mut rng);
            assert_eq!(code.as_str().len(), ROOM_CODE_LEN);
            assert!(
                code.as_str()
                    .bytes()
                    .all(|b| ROOM_CODE_ALPHABET.contains(&b)),
                "unexpected character in {code}"
            );
        }
    }

    #[test]
    fn test_room_code_parses_valid_code() {
        let code: RoomCode = "AB12CD".parse().unwrap();
        assert_eq!(code.as_str(), "AB12CD");
    }

    #[test]
    fn test_room_code_rejects_wrong_length() {
        assert!("ABC".parse::<RoomCode>().is_err());
        assert!("ABCDEFG".parse::<RoomCode>().is_err());
    }

    #[test]
    fn test_room_code_rejects_lowercase_and_symbols() {
        assert!("ab12cd".parse::<RoomCode>().is_err());
        assert!("AB-2CD".parse::<RoomCode>().is_err());
    }

    #[test]
    fn test_room_code_serializes_as_plain_string() {
        let code: RoomCode = "QWERTY".parse().unwrap();
        assert_eq!(json(&code), serde_json::json!("QWERTY"));
    }

    #[test]
    fn test_room_code_deserialize_validates() {
        let result: Result<RoomCode, _> = serde_json::from_str("\"nope\"");
        assert!(result.is_err());
    }

    // =====================================================================
    // Session identity
    // =====================================================================

    #[test]
    fn test_session_id_serializes_as_plain_number() {
        assert_eq!(json(&SessionId(42)), serde_json::json!(42));
    }

    #[test]
    fn test_session_id_display() {
        assert_eq!(SessionId(7).to_string(), "S-7");
    }

    #[test]
    fn test_session_token_is_32_hex_chars() {
        let mut rng = rand::rng();
        let token = SessionToken::generate(&mut rng);
        assert_eq!(token.as_str().len(), 32);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_session_tokens_are_unique() {
        let mut rng = rand::rng();
        let a = SessionToken::generate(&mut rng);
        let b = SessionToken::generate(&mut rng);
        assert_ne!(a, b);
    }

    // =====================================================================
    // ClientMessage — one format test per variant
    // =====================================================================

    #[test]
    fn test_create_room_json_format() {
        let msg = ClientMessage::CreateRoom {
            time_control: TimeControl { initial: 300, increment: 5 },
        };
        let v = json(&msg);
        assert_eq!(v["type"], "createRoom");
        assert_eq!(v["timeControl"]["initial"], 300);
        assert_eq!(v["timeControl"]["increment"], 5);
    }

    #[test]
    fn test_join_room_json_format() {
        let msg = ClientMessage::JoinRoom {
            room_id: "AAAAAA".parse().unwrap(),
            is_creator: true,
            resume: None,
        };
        let v = json(&msg);
        assert_eq!(v["type"], "joinRoom");
        assert_eq!(v["roomId"], "AAAAAA");
        assert_eq!(v["isCreator"], true);
        assert!(v["resume"].is_null());
    }

    #[test]
    fn test_join_room_resume_defaults_when_missing() {
        let raw = r#"{"type":"joinRoom","roomId":"AAAAAA","isCreator":false}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::JoinRoom { resume: None, .. }
        ));
    }

    #[test]
    fn test_move_json_format() {
        let msg = ClientMessage::Move {
            room_id: "AAAAAA".parse().unwrap(),
            mv: "e4".into(),
            remaining_reported: 299.0,
        };
        let v = json(&msg);
        assert_eq!(v["type"], "move");
        assert_eq!(v["move"], "e4");
        assert_eq!(v["remainingReported"], 299.0);
    }

    #[test]
    fn test_resign_json_format() {
        let msg = ClientMessage::Resign {
            room_id: "AAAAAA".parse().unwrap(),
            seat: Seat::Black,
        };
        let v = json(&msg);
        assert_eq!(v["type"], "resign");
        assert_eq!(v["seat"], "black");
    }

    #[test]
    fn test_draw_messages_round_trip() {
        for msg in [
            ClientMessage::OfferDraw {
                room_id: "AAAAAA".parse().unwrap(),
                seat: Seat::White,
            },
            ClientMessage::DrawResponse {
                room_id: "AAAAAA".parse().unwrap(),
                accepted: true,
            },
            ClientMessage::TimeOut {
                room_id: "AAAAAA".parse().unwrap(),
                seat: Seat::White,
            },
            ClientMessage::Teardown {
                room_id: "AAAAAA".parse().unwrap(),
            },
        ] {
            let bytes = serde_json::to_vec(&msg).unwrap();
            let decoded: ClientMessage = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(msg, decoded);
        }
    }

    // =====================================================================
    // ServerMessage
    // =====================================================================

    #[test]
    fn test_joined_json_format() {
        let msg = ServerMessage::Joined {
            seat: Seat::White,
            token: SessionToken::from("00".repeat(16)),
            clock: ClockSnapshot { white: 300.0, black: 300.0 },
            position: "startpos".into(),
        };
        let v = json(&msg);
        assert_eq!(v["type"], "joined");
        assert_eq!(v["seat"], "white");
        assert_eq!(v["clock"]["white"], 300.0);
        assert_eq!(v["position"], "startpos");
    }

    #[test]
    fn test_move_applied_json_format() {
        let msg = ServerMessage::MoveApplied {
            position: "fen".into(),
            mv: "e4".into(),
            clock: ClockSnapshot { white: 299.0, black: 300.0 },
        };
        let v = json(&msg);
        assert_eq!(v["type"], "moveApplied");
        assert_eq!(v["move"], "e4");
        assert_eq!(v["clock"]["white"], 299.0);
        assert_eq!(v["clock"]["black"], 300.0);
    }

    #[test]
    fn test_unit_variants_serialize_with_tag_only() {
        assert_eq!(
            json(&ServerMessage::DrawWarning),
            serde_json::json!({"type": "drawWarning"})
        );
        assert_eq!(
            json(&ServerMessage::DrawDisabled),
            serde_json::json!({"type": "drawDisabled"})
        );
    }

    #[test]
    fn test_player_disconnected_json_format() {
        let msg = ServerMessage::PlayerDisconnected { seat: Seat::Black };
        let v = json(&msg);
        assert_eq!(v["type"], "playerDisconnected");
        assert_eq!(v["seat"], "black");
    }

    #[test]
    fn test_game_over_round_trip() {
        let msg = ServerMessage::GameOver {
            result: "White wins by checkmate!".into(),
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: ServerMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_error_json_format() {
        let msg = ServerMessage::Error {
            code: 404,
            message: "room not found".into(),
        };
        let v = json(&msg);
        assert_eq!(v["type"], "error");
        assert_eq!(v["code"], 404);
    }

    // =====================================================================
    // Malformed input
    // =====================================================================

    #[test]
    fn test_decode_garbage_returns_error() {
        let result: Result<ClientMessage, _> =
            serde_json::from_slice(b"not json at all");
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_unknown_message_type_returns_error() {
        let unknown = r#"{"type": "castleKingside", "roomId": "AAAAAA"}"#;
        let result: Result<ClientMessage, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }
}
