//! Draw-offer negotiation with abuse throttling.
//!
//! Repeated draw offers are a classic harassment vector in online chess:
//! a losing player spams "draw?" every move. The ledger counts
//! *consecutive* offers per seat — an offer from the other seat resets
//! the run — and escalates: second consecutive offer earns the offerer a
//! private warning, the third disables offering for that seat for the
//! rest of the game. The bar is permanent; it survives anything the
//! opponent does afterwards.

use castle_protocol::Seat;

/// What the room should do with one draw offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    /// Forward the offer to the opponent.
    Forward,
    /// Forward the offer, and privately warn the offerer that one more
    /// will disable the feature.
    ForwardWithWarning,
    /// Third consecutive offer: tell the offerer privately, forward
    /// nothing. The seat is now barred.
    Disabled,
    /// The seat was already barred. Reject silently; the room never
    /// hears about it.
    Barred,
}

/// Per-room ledger of draw offers.
#[derive(Debug, Clone, Default)]
pub struct DrawBook {
    /// Consecutive-offer count per seat, indexed by [`Seat::index`].
    offer_count: [u8; 2],
    /// Who offered last; a change of offerer resets the new offerer's run.
    last_offerer: Option<Seat>,
    /// Seats that exhausted their offers. Never unset.
    barred: [bool; 2],
}

impl DrawBook {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one offer from `seat` and says how to treat it.
    pub fn offer(&mut self, seat: Seat) -> OfferOutcome {
        if self.barred[seat.index()] {
            return OfferOutcome::Barred;
        }

        if self.last_offerer == Some(seat) {
            self.offer_count[seat.index()] += 1;
        } else {
            self.last_offerer = Some(seat);
            self.offer_count[seat.index()] = 1;
        }

        match self.offer_count[seat.index()] {
            0 | 1 => OfferOutcome::Forward,
            2 => OfferOutcome::ForwardWithWarning,
            _ => {
                self.barred[seat.index()] = true;
                OfferOutcome::Disabled
            }
        }
    }

    /// Whether `seat` may still offer draws.
    pub fn is_barred(&self, seat: Seat) -> bool {
        self.barred[seat.index()]
    }

    /// Consecutive offers currently on record for `seat`.
    pub fn offer_count(&self, seat: Seat) -> u8 {
        self.offer_count[seat.index()]
    }
}
