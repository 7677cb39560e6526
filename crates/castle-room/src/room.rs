//! Room actor: an isolated Tokio task that owns one game.
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. The actor is the single writer for all of a
//! room's state — seating, position, clocks, draw ledger — so operations
//! on one room are strictly serialized while different rooms proceed in
//! parallel. Background timers (the reconnection window) re-enter
//! through the same channel, which gives them the same exclusion as any
//! other command.

use std::fmt;
use std::time::Instant;

use castle_clock::GameClock;
use castle_protocol::{
    ClockSnapshot, RoomCode, Seat, ServerMessage, SessionId, TimeControl,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{
    DrawBook, DrawKind, OfferOutcome, Phase, RoomError, RoomSettings,
    RulesEngine, Verdict,
};

/// Channel sender for delivering room events to one seat's connection.
pub type SeatSender = mpsc::UnboundedSender<ServerMessage>;

// ---------------------------------------------------------------------------
// Seating
// ---------------------------------------------------------------------------

/// The occupancy state of one seat.
///
/// A seat is never simultaneously occupied and vacated — those are
/// distinct variants of the same slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatSlot {
    /// Never assigned (or permanently given up).
    Empty,
    /// Held by a live session.
    Occupied(SessionId),
    /// Its occupant disconnected at `since`; reserved for them until the
    /// reconnection window closes.
    Vacated { session: SessionId, since: Instant },
}

impl SeatSlot {
    fn is_empty(&self) -> bool {
        matches!(self, SeatSlot::Empty)
    }

    fn occupant(&self) -> Option<SessionId> {
        match self {
            SeatSlot::Occupied(session) => Some(*session),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Game outcomes
// ---------------------------------------------------------------------------

/// Why a game ended. Rendered to the human-readable result string that
/// rides in the `gameOver` broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The winner delivered mate.
    Checkmate { winner: Seat },
    /// Drawn position, per the rules engine's classification.
    Drawn(DrawKind),
    /// Draw agreed between the players.
    Agreement,
    /// The loser resigned.
    Resignation { winner: Seat },
    /// The loser's flag fell.
    Flag { winner: Seat },
    /// The named seat failed to reconnect in time.
    Abandonment(Seat),
}

impl From<Verdict> for Outcome {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Checkmate { winner } => Outcome::Checkmate { winner },
            Verdict::Draw(kind) => Outcome::Drawn(kind),
        }
    }
}

fn title(seat: Seat) -> &'static str {
    match seat {
        Seat::White => "White",
        Seat::Black => "Black",
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Checkmate { winner } => {
                write!(f, "{} wins by checkmate!", title(*winner))
            }
            Outcome::Drawn(DrawKind::Stalemate) => {
                write!(f, "Game drawn by stalemate!")
            }
            Outcome::Drawn(DrawKind::InsufficientMaterial) => {
                write!(f, "Game drawn by insufficient material!")
            }
            Outcome::Drawn(DrawKind::Repetition) => {
                write!(f, "Game drawn by repetition!")
            }
            Outcome::Drawn(DrawKind::FiftyMove) => {
                write!(f, "Game drawn by the fifty-move rule!")
            }
            Outcome::Agreement => write!(f, "Game drawn by agreement!"),
            Outcome::Resignation { winner } => {
                write!(f, "{} wins by resignation!", title(*winner))
            }
            Outcome::Flag { winner } => {
                write!(f, "{} wins on time!", title(*winner))
            }
            Outcome::Abandonment(seat) => {
                write!(f, "Game ended - {seat} player failed to reconnect")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Commands and replies
// ---------------------------------------------------------------------------

/// What a successful join hands back to the caller.
#[derive(Debug, Clone)]
pub struct JoinGrant {
    /// The seat the caller now occupies.
    pub seat: Seat,
    /// Both clocks at the moment of joining.
    pub clock: ClockSnapshot,
    /// The current position's canonical board-state string.
    pub position: String,
}

/// A snapshot of room metadata for the registry's sweep.
#[derive(Debug, Clone)]
pub struct RoomStatus {
    pub code: RoomCode,
    pub phase: Phase,
    pub occupied: usize,
    pub last_activity: Instant,
}

/// Commands sent to a room actor through its channel. Variants with a
/// `oneshot` reply are request/response; the rest are fire-and-forget.
enum RoomCommand {
    Join {
        session: SessionId,
        wants_creator_seat: bool,
        sender: SeatSender,
        reply: oneshot::Sender<Result<JoinGrant, RoomError>>,
    },
    Disconnect {
        session: SessionId,
    },
    Move {
        session: SessionId,
        mv: String,
        reported: std::time::Duration,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Resign {
        session: SessionId,
        seat: Seat,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    OfferDraw {
        session: SessionId,
        seat: Seat,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    RespondDraw {
        session: SessionId,
        accepted: bool,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    TimeOut {
        session: SessionId,
        seat: Seat,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Status {
        reply: oneshot::Sender<RoomStatus>,
    },
    /// Internal: a seat's reconnection window closed.
    ReconnectExpired { seat: Seat, session: SessionId },
    Teardown,
}

// ---------------------------------------------------------------------------
// RoomHandle
// ---------------------------------------------------------------------------

/// Handle to a running room actor. Cheap to clone; the registry holds
/// one per room and the gateway clones it per operation.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// The room's code.
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// `true` once the actor has exited and can no longer be reached.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    /// Requests a seat (or a vacated-seat restore) for `session`.
    pub async fn join(
        &self,
        session: SessionId,
        wants_creator_seat: bool,
        sender: SeatSender,
    ) -> Result<JoinGrant, RoomError> {
        self.request(|reply| RoomCommand::Join {
            session,
            wants_creator_seat,
            sender,
            reply,
        })
        .await?
    }

    /// Reports that `session`'s connection dropped (fire-and-forget).
    pub async fn disconnect(&self, session: SessionId) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Disconnect { session })
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    /// Applies a move for the caller's session.
    pub async fn play_move(
        &self,
        session: SessionId,
        mv: String,
        reported: std::time::Duration,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Move {
            session,
            mv,
            reported,
            reply,
        })
        .await?
    }

    /// Resigns for `seat`.
    pub async fn resign(
        &self,
        session: SessionId,
        seat: Seat,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Resign { session, seat, reply })
            .await?
    }

    /// Offers the opponent a draw.
    pub async fn offer_draw(
        &self,
        session: SessionId,
        seat: Seat,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::OfferDraw { session, seat, reply })
            .await?
    }

    /// Answers an outstanding draw offer.
    pub async fn respond_draw(
        &self,
        session: SessionId,
        accepted: bool,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::RespondDraw {
            session,
            accepted,
            reply,
        })
        .await?
    }

    /// Claims that `seat`'s own flag has fallen.
    pub async fn time_out(
        &self,
        session: SessionId,
        seat: Seat,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::TimeOut { session, seat, reply })
            .await?
    }

    /// Requests the room's current status.
    pub async fn status(&self) -> Result<RoomStatus, RoomError> {
        self.request(|reply| RoomCommand::Status { reply }).await
    }

    /// Tells the room to shut down.
    pub async fn teardown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Teardown)
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }
}

// ---------------------------------------------------------------------------
// RoomActor
// ---------------------------------------------------------------------------

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<R: RulesEngine> {
    code: RoomCode,
    settings: RoomSettings,
    phase: Phase,
    seats: [SeatSlot; 2],
    /// Per-seat outbound channels; `None` while a seat is empty or vacated.
    senders: [Option<SeatSender>; 2],
    position: R::Position,
    clock: GameClock,
    draws: DrawBook,
    last_activity: Instant,
    /// Pending reconnection timers, one per vacated seat. Aborted when
    /// the seat is restored — the only cancellable scheduled operation.
    reconnect_timers: [Option<JoinHandle<()>>; 2],
    /// Clone of our own command sender, given to timer tasks so their
    /// expiry re-enters through the serialized queue.
    self_tx: mpsc::Sender<RoomCommand>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl<R: RulesEngine> RoomActor<R> {
    /// Runs the actor loop until teardown or abandonment.
    async fn run(mut self) {
        tracing::info!(room = %self.code, "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join {
                    session,
                    wants_creator_seat,
                    sender,
                    reply,
                } => {
                    let result =
                        self.handle_join(session, wants_creator_seat, sender);
                    let _ = reply.send(result);
                }
                RoomCommand::Disconnect { session } => {
                    self.handle_disconnect(session);
                }
                RoomCommand::Move {
                    session,
                    mv,
                    reported,
                    reply,
                } => {
                    let _ = reply.send(self.handle_move(session, mv, reported));
                }
                RoomCommand::Resign { session, seat, reply } => {
                    let _ = reply.send(self.handle_resign(session, seat));
                }
                RoomCommand::OfferDraw { session, seat, reply } => {
                    let _ = reply.send(self.handle_offer_draw(session, seat));
                }
                RoomCommand::RespondDraw {
                    session,
                    accepted,
                    reply,
                } => {
                    let _ =
                        reply.send(self.handle_respond_draw(session, accepted));
                }
                RoomCommand::TimeOut { session, seat, reply } => {
                    let _ = reply.send(self.handle_time_out(session, seat));
                }
                RoomCommand::Status { reply } => {
                    let _ = reply.send(self.status());
                }
                RoomCommand::ReconnectExpired { seat, session } => {
                    if self.handle_reconnect_expired(seat, session) {
                        break;
                    }
                }
                RoomCommand::Teardown => {
                    tracing::info!(room = %self.code, "room torn down");
                    break;
                }
            }
        }

        for timer in &mut self.reconnect_timers {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
        tracing::info!(room = %self.code, "room actor stopped");
    }

    // -- Seating ----------------------------------------------------------

    fn handle_join(
        &mut self,
        session: SessionId,
        wants_creator_seat: bool,
        sender: SeatSender,
    ) -> Result<JoinGrant, RoomError> {
        // Reconnection first: a vacated seat belongs to its original
        // occupant ahead of every other rule, matched by session id.
        for seat in Seat::ALL {
            if let SeatSlot::Vacated { session: vacated, .. } =
                self.seats[seat.index()]
            {
                if vacated == session {
                    return Ok(self.restore_seat(seat, session, sender));
                }
            }
        }

        if self.phase.is_over() {
            return Err(RoomError::InvalidState(
                "room is finished".into(),
            ));
        }
        if self.seat_of(session).is_some() {
            return Err(RoomError::InvalidState(
                "session already holds a seat in this room".into(),
            ));
        }

        // Creator claim, then first free seat. A vacated seat is
        // reserved and never handed to a newcomer.
        let seat = if wants_creator_seat
            && self.seats[Seat::White.index()].is_empty()
        {
            Seat::White
        } else {
            Seat::ALL
                .into_iter()
                .find(|s| self.seats[s.index()].is_empty())
                .ok_or_else(|| RoomError::RoomFull(self.code.clone()))?
        };

        self.seats[seat.index()] = SeatSlot::Occupied(session);
        self.senders[seat.index()] = Some(sender);
        self.touch();
        tracing::info!(room = %self.code, %session, %seat, "seat taken");

        let grant = self.grant(seat);
        if self.phase == Phase::Waiting && self.both_occupied() {
            self.activate();
        }
        Ok(grant)
    }

    fn restore_seat(
        &mut self,
        seat: Seat,
        session: SessionId,
        sender: SeatSender,
    ) -> JoinGrant {
        if let Some(timer) = self.reconnect_timers[seat.index()].take() {
            timer.abort();
        }
        self.seats[seat.index()] = SeatSlot::Occupied(session);
        self.senders[seat.index()] = Some(sender);
        self.touch();
        tracing::info!(room = %self.code, %session, %seat, "seat restored");
        self.grant(seat)
    }

    fn handle_disconnect(&mut self, session: SessionId) {
        let Some(seat) = self.seat_of(session) else {
            return;
        };

        self.senders[seat.index()] = None;

        if self.phase.is_over() {
            // Post-game disconnects are just people leaving.
            self.seats[seat.index()] = SeatSlot::Empty;
            return;
        }

        self.seats[seat.index()] = SeatSlot::Vacated {
            session,
            since: Instant::now(),
        };
        self.touch();
        tracing::info!(room = %self.code, %session, %seat, "seat vacated");
        self.broadcast(ServerMessage::PlayerDisconnected { seat });

        let tx = self.self_tx.clone();
        let window = self.settings.reconnect_window;
        self.reconnect_timers[seat.index()] = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            // Best-effort: if the room is already gone, so is the game.
            let _ = tx.send(RoomCommand::ReconnectExpired { seat, session }).await;
        }));
    }

    /// Returns `true` if the room should die.
    fn handle_reconnect_expired(
        &mut self,
        seat: Seat,
        session: SessionId,
    ) -> bool {
        self.reconnect_timers[seat.index()] = None;

        if self.phase.is_over() {
            return false;
        }
        // Only act if the seat is still vacated by the same session; a
        // rejoin raced ahead of the timer otherwise.
        let still_vacated = matches!(
            self.seats[seat.index()],
            SeatSlot::Vacated { session: vacated, .. } if vacated == session
        );
        if !still_vacated {
            return false;
        }

        tracing::info!(room = %self.code, %seat, "reconnection window closed");
        self.finish(Outcome::Abandonment(seat));
        true
    }

    // -- Game operations --------------------------------------------------

    fn handle_move(
        &mut self,
        session: SessionId,
        mv: String,
        reported: std::time::Duration,
    ) -> Result<(), RoomError> {
        self.ensure_active()?;
        let seat = self.seat_of(session).ok_or(RoomError::SeatMismatch)?;
        if R::side_to_move(&self.position) != seat {
            return Err(RoomError::NotYourTurn);
        }

        self.position =
            R::apply(&self.position, &mv).map_err(RoomError::IllegalMove)?;
        self.clock.credit(seat, reported);
        self.clock.start_turn(Instant::now());
        self.touch();

        self.broadcast(ServerMessage::MoveApplied {
            position: R::fen(&self.position),
            mv,
            clock: self.clock.snapshot(),
        });

        if let Some(verdict) = R::terminal(&self.position) {
            self.finish(verdict.into());
        }
        Ok(())
    }

    fn handle_resign(
        &mut self,
        session: SessionId,
        seat: Seat,
    ) -> Result<(), RoomError> {
        self.ensure_active()?;
        self.ensure_seat(session, seat)?;
        self.finish(Outcome::Resignation { winner: seat.opponent() });
        Ok(())
    }

    fn handle_offer_draw(
        &mut self,
        session: SessionId,
        seat: Seat,
    ) -> Result<(), RoomError> {
        self.ensure_active()?;
        self.ensure_seat(session, seat)?;

        match self.draws.offer(seat) {
            OfferOutcome::Barred => Err(RoomError::DrawDisabled),
            OfferOutcome::Disabled => {
                self.touch();
                tracing::info!(room = %self.code, %seat, "draw offers disabled");
                self.unicast(seat, ServerMessage::DrawDisabled);
                Ok(())
            }
            OfferOutcome::ForwardWithWarning => {
                self.touch();
                self.unicast(seat, ServerMessage::DrawWarning);
                self.unicast(
                    seat.opponent(),
                    ServerMessage::DrawOffered { from: seat },
                );
                Ok(())
            }
            OfferOutcome::Forward => {
                self.touch();
                self.unicast(
                    seat.opponent(),
                    ServerMessage::DrawOffered { from: seat },
                );
                Ok(())
            }
        }
    }

    fn handle_respond_draw(
        &mut self,
        session: SessionId,
        accepted: bool,
    ) -> Result<(), RoomError> {
        self.ensure_active()?;
        self.seat_of(session).ok_or(RoomError::SeatMismatch)?;
        self.touch();
        if accepted {
            self.finish(Outcome::Agreement);
        }
        // A decline changes nothing; the offer simply lapses.
        Ok(())
    }

    fn handle_time_out(
        &mut self,
        session: SessionId,
        seat: Seat,
    ) -> Result<(), RoomError> {
        self.ensure_active()?;
        self.ensure_seat(session, seat)?;
        // Only the side to move can flag — the opponent's clock is frozen.
        if R::side_to_move(&self.position) != seat {
            return Err(RoomError::NotYourTurn);
        }
        if !self.clock.flag_plausible(seat, Instant::now()) {
            return Err(RoomError::InvalidState(
                "claimed flag has not plausibly fallen".into(),
            ));
        }
        self.finish(Outcome::Flag { winner: seat.opponent() });
        Ok(())
    }

    // -- Internals --------------------------------------------------------

    fn activate(&mut self) {
        self.phase = Phase::Active;
        self.clock.start_turn(Instant::now());
        tracing::info!(room = %self.code, "game activated");

        let white = self.seats[Seat::White.index()]
            .occupant()
            .expect("both seats occupied at activation");
        let black = self.seats[Seat::Black.index()]
            .occupant()
            .expect("both seats occupied at activation");
        self.broadcast(ServerMessage::Activated {
            white,
            black,
            clock: self.clock.snapshot(),
        });
    }

    fn finish(&mut self, outcome: Outcome) {
        self.phase = Phase::Finished;
        self.clock.halt();
        for timer in &mut self.reconnect_timers {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
        self.touch();
        tracing::info!(room = %self.code, %outcome, "game over");
        self.broadcast(ServerMessage::GameOver {
            result: outcome.to_string(),
        });
    }

    fn ensure_active(&self) -> Result<(), RoomError> {
        if self.phase.is_active() {
            Ok(())
        } else {
            Err(RoomError::InvalidState(format!(
                "room is {}",
                self.phase
            )))
        }
    }

    fn ensure_seat(&self, session: SessionId, seat: Seat) -> Result<(), RoomError> {
        match self.seat_of(session) {
            Some(held) if held == seat => Ok(()),
            _ => Err(RoomError::SeatMismatch),
        }
    }

    fn seat_of(&self, session: SessionId) -> Option<Seat> {
        Seat::ALL
            .into_iter()
            .find(|s| self.seats[s.index()].occupant() == Some(session))
    }

    fn both_occupied(&self) -> bool {
        self.seats.iter().all(|s| s.occupant().is_some())
    }

    fn grant(&self, seat: Seat) -> JoinGrant {
        JoinGrant {
            seat,
            clock: self.clock.snapshot(),
            position: R::fen(&self.position),
        }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Sends to every connected seat. Vacated seats have no sender, so
    /// they drop out of broadcasts naturally.
    fn broadcast(&self, msg: ServerMessage) {
        for sender in self.senders.iter().flatten() {
            let _ = sender.send(msg.clone());
        }
    }

    fn unicast(&self, seat: Seat, msg: ServerMessage) {
        if let Some(sender) = &self.senders[seat.index()] {
            let _ = sender.send(msg);
        }
    }

    fn status(&self) -> RoomStatus {
        RoomStatus {
            code: self.code.clone(),
            phase: self.phase,
            occupied: self
                .seats
                .iter()
                .filter(|s| s.occupant().is_some())
                .count(),
            last_activity: self.last_activity,
        }
    }
}

/// Spawns a new room actor and returns a handle to it.
pub(crate) fn spawn_room<R: RulesEngine>(
    code: RoomCode,
    settings: RoomSettings,
    time_control: TimeControl,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(settings.channel_size);

    let actor = RoomActor::<R> {
        code: code.clone(),
        settings,
        phase: Phase::Waiting,
        seats: [SeatSlot::Empty, SeatSlot::Empty],
        senders: [None, None],
        position: R::initial(),
        clock: GameClock::new(time_control),
        draws: DrawBook::new(),
        last_activity: Instant::now(),
        reconnect_timers: [None, None],
        self_tx: tx.clone(),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { code, sender: tx }
}
