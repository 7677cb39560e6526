//! Per-player countdown clocks for Castle.
//!
//! The server is deliberately *not* the timekeeper: it never runs a
//! free-running timer per room just to bill clock ticks. The mover's
//! remaining time is whatever the mover last reported with a move, and
//! the increment is credited server-side. What the server *does* own is
//! plausibility: it remembers when each turn started, so a self-reported
//! flag-fall can be checked against real elapsed wall time.
//!
//! Between moves, the waiting side's entry is frozen — nothing in this
//! module mutates a seat's remaining time except a credit for that seat's
//! own completed move.

use std::time::{Duration, Instant};

use castle_protocol::{ClockSnapshot, Seat, TimeControl};

/// The pair of countdown clocks for one game.
#[derive(Debug, Clone)]
pub struct GameClock {
    /// Remaining time per seat, indexed by [`Seat::index`].
    remaining: [Duration; 2],
    /// Credited to the mover after each completed move.
    increment: Duration,
    /// Reset value, retained for reference only.
    initial: Duration,
    /// When the side to move began thinking. `None` until the game
    /// activates and after it finishes.
    turn_started: Option<Instant>,
}

impl GameClock {
    /// Creates a fresh clock pair from a time control, both sides full.
    pub fn new(tc: TimeControl) -> Self {
        Self {
            remaining: [tc.initial(), tc.initial()],
            increment: tc.increment(),
            initial: tc.initial(),
            turn_started: None,
        }
    }

    /// Remaining time for one seat.
    pub fn remaining(&self, seat: Seat) -> Duration {
        self.remaining[seat.index()]
    }

    /// The per-move increment.
    pub fn increment(&self) -> Duration {
        self.increment
    }

    /// The configured starting time.
    pub fn initial(&self) -> Duration {
        self.initial
    }

    /// Credits the mover's clock after a completed move: the mover's
    /// self-reported remaining time plus the increment. The opponent's
    /// entry is untouched — it was frozen the moment their own move
    /// completed.
    pub fn credit(&mut self, seat: Seat, reported: Duration) {
        self.remaining[seat.index()] = reported + self.increment;
        tracing::trace!(
            %seat,
            remaining_secs = self.remaining[seat.index()].as_secs_f64(),
            "clock credited"
        );
    }

    /// Marks `now` as the start of the side to move's thinking time.
    ///
    /// Called when the game activates and again after every move.
    pub fn start_turn(&mut self, now: Instant) {
        self.turn_started = Some(now);
    }

    /// Stops turn tracking; flag claims are no longer plausible.
    pub fn halt(&mut self) {
        self.turn_started = None;
    }

    /// Whether a claimed flag-fall for `seat` could genuinely have
    /// happened: enough wall time must have elapsed since the turn
    /// started to exhaust that seat's stored remaining time.
    ///
    /// Only ever meaningful for the side to move — the waiting side's
    /// clock is frozen, so its flag cannot fall.
    pub fn flag_plausible(&self, seat: Seat, now: Instant) -> bool {
        match self.turn_started {
            Some(started) => {
                now.saturating_duration_since(started) >= self.remaining[seat.index()]
            }
            None => false,
        }
    }

    /// Both clocks in seconds, for broadcasting.
    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            white: self.remaining(Seat::White).as_secs_f64(),
            black: self.remaining(Seat::Black).as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(initial: u64, increment: u64) -> GameClock {
        GameClock::new(TimeControl { initial, increment })
    }

    #[test]
    fn test_new_fills_both_sides() {
        let c = clock(300, 5);
        assert_eq!(c.remaining(Seat::White), Duration::from_secs(300));
        assert_eq!(c.remaining(Seat::Black), Duration::from_secs(300));
        assert_eq!(c.increment(), Duration::from_secs(5));
        assert_eq!(c.initial(), Duration::from_secs(300));
    }

    #[test]
    fn test_credit_adds_increment_to_reported_time() {
        let mut c = clock(300, 5);
        c.credit(Seat::White, Duration::from_secs(295));
        assert_eq!(c.remaining(Seat::White), Duration::from_secs(300));
    }

    #[test]
    fn test_credit_never_touches_opponent() {
        let mut c = clock(300, 0);
        c.credit(Seat::White, Duration::from_secs(100));
        assert_eq!(c.remaining(Seat::Black), Duration::from_secs(300));

        c.credit(Seat::Black, Duration::from_secs(7));
        assert_eq!(c.remaining(Seat::White), Duration::from_secs(100));
        assert_eq!(c.remaining(Seat::Black), Duration::from_secs(7));
    }

    #[test]
    fn test_flag_not_plausible_before_time_elapses() {
        let mut c = clock(300, 0);
        let start = Instant::now();
        c.start_turn(start);

        // One second into a 300-second clock: no chance.
        assert!(!c.flag_plausible(Seat::White, start + Duration::from_secs(1)));
    }

    #[test]
    fn test_flag_plausible_once_remaining_exhausted() {
        let mut c = clock(300, 0);
        let start = Instant::now();
        c.start_turn(start);

        assert!(c.flag_plausible(Seat::White, start + Duration::from_secs(300)));
        assert!(c.flag_plausible(Seat::White, start + Duration::from_secs(400)));
    }

    #[test]
    fn test_flag_never_plausible_without_active_turn() {
        let c = clock(0, 0);
        assert!(!c.flag_plausible(Seat::White, Instant::now()));
    }

    #[test]
    fn test_halt_ends_plausibility() {
        let mut c = clock(0, 0);
        let start = Instant::now();
        c.start_turn(start);
        assert!(c.flag_plausible(Seat::Black, start));

        c.halt();
        assert!(!c.flag_plausible(Seat::Black, start + Duration::from_secs(60)));
    }

    #[test]
    fn test_snapshot_reports_both_sides_in_seconds() {
        let mut c = clock(300, 0);
        c.credit(Seat::White, Duration::from_secs_f64(298.5));
        let snap = c.snapshot();
        assert_eq!(snap.white, 298.5);
        assert_eq!(snap.black, 300.0);
    }
}
