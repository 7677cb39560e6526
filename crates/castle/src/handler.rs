//! Per-connection handler: the wire adapter between one socket and the
//! room/session layers.
//!
//! The handler is a stateless translator. For every inbound message it
//! resolves the caller through the session manager, invokes exactly one
//! registry or room operation, and writes the reply. Room broadcasts
//! travel the other way: each seat owns an event channel, and a pump
//! task forwards it to the socket while the handler sits in `recv`.
//! Nothing is retried and nothing is remembered here beyond the
//! connection's own session id.

use std::sync::Arc;
use std::time::Duration;

use castle_protocol::{
    ClientMessage, Codec, RoomCode, ServerMessage, SessionId,
};
use castle_room::{RoomError, RoomHandle, RulesEngine};
use castle_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::server::ServerState;
use crate::CastleError;

/// Upper bound for a client-reported clock value, in seconds. Anything
/// above this is garbage, not a chess clock.
const MAX_REPORTED_SECS: f64 = 604_800.0;

/// What one connection knows about itself.
struct ConnCtx {
    /// The session seated through this connection, once joined.
    session: Option<SessionId>,
    /// The task pumping room events to the socket.
    pump: Option<JoinHandle<()>>,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<R, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<R, C>>,
) -> Result<(), CastleError>
where
    R: RulesEngine,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let mut ctx = ConnCtx { session: None, pump: None };

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%conn_id, "connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let msg: ClientMessage = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "undecodable message");
                if send_error(&conn, &state.codec, 400, "malformed message")
                    .await
                    .is_err()
                {
                    break;
                }
                continue;
            }
        };

        if let Err(e) = dispatch(&conn, &state, &mut ctx, msg).await {
            tracing::debug!(%conn_id, error = %e, "dropping connection");
            break;
        }
    }

    // Transport is gone. Demote the seat to vacated and let the room's
    // reconnection timer decide the rest.
    if let Some(session) = ctx.session {
        let room = {
            let mut sessions = state.sessions.lock().await;
            let resolved = sessions.resolve(session);
            if resolved.is_some() {
                let _ = sessions.disconnect(session);
            }
            resolved.map(|(room, _)| room)
        };
        if let Some(room) = room {
            let handle = state.registry.lock().await.lookup(&room);
            if let Some(handle) = handle {
                let _ = handle.disconnect(session).await;
            }
        }
    }
    if let Some(pump) = ctx.pump.take() {
        pump.abort();
    }

    Ok(())
}

/// Routes one decoded message to exactly one room/registry operation.
async fn dispatch<R, C>(
    conn: &Arc<WebSocketConnection>,
    state: &Arc<ServerState<R, C>>,
    ctx: &mut ConnCtx,
    msg: ClientMessage,
) -> Result<(), CastleError>
where
    R: RulesEngine,
    C: Codec,
{
    match msg {
        ClientMessage::CreateRoom { time_control } => {
            let code = state.registry.lock().await.create(time_control);
            send(conn, &state.codec, &ServerMessage::RoomCreated {
                room_id: code,
            })
            .await
        }

        ClientMessage::JoinRoom { room_id, is_creator, resume } => {
            handle_join(conn, state, ctx, room_id, is_creator, resume).await
        }

        ClientMessage::Move { room_id, mv, remaining_reported } => {
            let Some((session, handle)) =
                resolve_caller(conn, state, ctx, &room_id).await?
            else {
                return Ok(());
            };
            if !remaining_reported.is_finite()
                || !(0.0..=MAX_REPORTED_SECS).contains(&remaining_reported)
            {
                return send_error(
                    conn,
                    &state.codec,
                    400,
                    "implausible remaining time",
                )
                .await;
            }
            let reported = Duration::from_secs_f64(remaining_reported);
            if let Err(e) = handle.play_move(session, mv, reported).await {
                send_room_error(conn, &state.codec, &e).await?;
            }
            Ok(())
        }

        ClientMessage::Resign { room_id, seat } => {
            let Some((session, handle)) =
                resolve_caller(conn, state, ctx, &room_id).await?
            else {
                return Ok(());
            };
            if let Err(e) = handle.resign(session, seat).await {
                send_room_error(conn, &state.codec, &e).await?;
            }
            Ok(())
        }

        ClientMessage::OfferDraw { room_id, seat } => {
            let Some((session, handle)) =
                resolve_caller(conn, state, ctx, &room_id).await?
            else {
                return Ok(());
            };
            match handle.offer_draw(session, seat).await {
                Ok(()) => Ok(()),
                // A barred seat gets the private notice, never an error
                // broadcast — the room stays unaware.
                Err(RoomError::DrawDisabled) => {
                    send(conn, &state.codec, &ServerMessage::DrawDisabled)
                        .await
                }
                Err(e) => send_room_error(conn, &state.codec, &e).await,
            }
        }

        ClientMessage::DrawResponse { room_id, accepted } => {
            let Some((session, handle)) =
                resolve_caller(conn, state, ctx, &room_id).await?
            else {
                return Ok(());
            };
            if let Err(e) = handle.respond_draw(session, accepted).await {
                send_room_error(conn, &state.codec, &e).await?;
            }
            Ok(())
        }

        ClientMessage::TimeOut { room_id, seat } => {
            let Some((session, handle)) =
                resolve_caller(conn, state, ctx, &room_id).await?
            else {
                return Ok(());
            };
            if let Err(e) = handle.time_out(session, seat).await {
                send_room_error(conn, &state.codec, &e).await?;
            }
            Ok(())
        }

        ClientMessage::Teardown { room_id } => {
            let Some((_session, _handle)) =
                resolve_caller(conn, state, ctx, &room_id).await?
            else {
                return Ok(());
            };
            state.registry.lock().await.remove(&room_id).await;
            state.sessions.lock().await.remove_room(&room_id);
            ctx.session = None;
            if let Some(pump) = ctx.pump.take() {
                pump.abort();
            }
            Ok(())
        }
    }
}

/// The join protocol: token resume first, fresh seat otherwise.
async fn handle_join<R, C>(
    conn: &Arc<WebSocketConnection>,
    state: &Arc<ServerState<R, C>>,
    ctx: &mut ConnCtx,
    room_id: RoomCode,
    is_creator: bool,
    resume: Option<castle_protocol::SessionToken>,
) -> Result<(), CastleError>
where
    R: RulesEngine,
    C: Codec,
{
    if ctx.session.is_some() {
        return send_error(
            conn,
            &state.codec,
            409,
            "connection already holds a seat",
        )
        .await;
    }

    let Some(handle) = state.registry.lock().await.lookup(&room_id) else {
        return send_error(conn, &state.codec, 404, "room not found").await;
    };

    // A valid token for this room makes the join a reconnection; an
    // invalid or foreign token degrades to a fresh join attempt.
    let resumed = match resume {
        Some(token) => {
            let mut sessions = state.sessions.lock().await;
            match sessions.resume(&token) {
                Ok(s) if s.room == room_id => Some((s.id, s.token.clone())),
                Ok(s) => {
                    let id = s.id;
                    let _ = sessions.disconnect(id);
                    None
                }
                Err(e) => {
                    tracing::debug!(error = %e, "resume failed, joining fresh");
                    None
                }
            }
        }
        None => None,
    };

    let (tx, rx) = mpsc::unbounded_channel();

    match resumed {
        Some((session, token)) => {
            match handle.join(session, is_creator, tx).await {
                Ok(grant) => {
                    ctx.session = Some(session);
                    ctx.pump = Some(spawn_pump(
                        Arc::clone(conn),
                        Arc::clone(state),
                        rx,
                    ));
                    send(conn, &state.codec, &ServerMessage::Joined {
                        seat: grant.seat,
                        token,
                        clock: grant.clock,
                        position: grant.position,
                    })
                    .await
                }
                Err(e) => {
                    // Put the session back on the clock; the room said no.
                    let _ = state.sessions.lock().await.disconnect(session);
                    send_room_error(conn, &state.codec, &e).await
                }
            }
        }
        None => {
            let session = state.sessions.lock().await.allocate();
            match handle.join(session, is_creator, tx).await {
                Ok(grant) => {
                    let token = state
                        .sessions
                        .lock()
                        .await
                        .bind(session, room_id.clone(), grant.seat)
                        .token
                        .clone();
                    ctx.session = Some(session);
                    ctx.pump = Some(spawn_pump(
                        Arc::clone(conn),
                        Arc::clone(state),
                        rx,
                    ));
                    send(conn, &state.codec, &ServerMessage::Joined {
                        seat: grant.seat,
                        token,
                        clock: grant.clock,
                        position: grant.position,
                    })
                    .await
                }
                Err(e) => send_room_error(conn, &state.codec, &e).await,
            }
        }
    }
}

/// Resolves the caller's session against the room named in the message.
/// Sends the appropriate error and returns `None` when anything is off.
async fn resolve_caller<R, C>(
    conn: &Arc<WebSocketConnection>,
    state: &Arc<ServerState<R, C>>,
    ctx: &ConnCtx,
    room_id: &RoomCode,
) -> Result<Option<(SessionId, RoomHandle)>, CastleError>
where
    R: RulesEngine,
    C: Codec,
{
    let Some(session) = ctx.session else {
        send_error(conn, &state.codec, 403, "no seat on this connection")
            .await?;
        return Ok(None);
    };

    let resolved = state.sessions.lock().await.resolve(session);
    let Some((room, _seat)) = resolved else {
        send_error(conn, &state.codec, 403, "session no longer exists")
            .await?;
        return Ok(None);
    };
    if room != *room_id {
        send_error(conn, &state.codec, 403, "seat is in a different room")
            .await?;
        return Ok(None);
    }

    let Some(handle) = state.registry.lock().await.lookup(&room) else {
        send_error(conn, &state.codec, 404, "room not found").await?;
        return Ok(None);
    };

    Ok(Some((session, handle)))
}

/// Forwards one seat's room events to the socket until either side goes
/// away.
fn spawn_pump<R, C>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<R, C>>,
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
) -> JoinHandle<()>
where
    R: RulesEngine,
    C: Codec,
{
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let bytes = match state.codec.encode(&event) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode room event");
                    continue;
                }
            };
            if conn.send(&bytes).await.is_err() {
                break;
            }
        }
    })
}

async fn send(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    msg: &ServerMessage,
) -> Result<(), CastleError> {
    let bytes = codec.encode(msg)?;
    conn.send(&bytes).await.map_err(CastleError::Transport)
}

async fn send_error(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    code: u16,
    message: &str,
) -> Result<(), CastleError> {
    send(conn, codec, &ServerMessage::Error {
        code,
        message: message.to_string(),
    })
    .await
}

/// Maps a room error to an HTTP-style code and reports it to the caller
/// only.
async fn send_room_error(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    err: &RoomError,
) -> Result<(), CastleError> {
    let code = match err {
        RoomError::NotFound(_) | RoomError::Unavailable(_) => 404,
        RoomError::RoomFull(_) | RoomError::InvalidState(_) => 409,
        RoomError::IllegalMove(_) => 400,
        RoomError::NotYourTurn
        | RoomError::SeatMismatch
        | RoomError::DrawDisabled => 403,
    };
    send(conn, codec, &ServerMessage::Error {
        code,
        message: err.to_string(),
    })
    .await
}
