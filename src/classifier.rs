//! Row emission policy: which book mutations deserve a row, and with what
//! values.
//!
//! Two policies apply to every event, in order. The BBO-change policy fires
//! when the top of book moved and the recorder is not in trades-only mode; it
//! advances the quote cache and, for non-execute events, produces a row. The
//! trade policy fires for every execute and produces a row from the (possibly
//! just-updated) cached bid/offer. An execute therefore emits exactly one
//! row; every other kind emits at most one, gated on an actual change.
use crate::book::{EventKind, InstrumentBook, MutationEvent, SignedPrice};
use crate::quote::QuoteState;

/// Values for one output row, handed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputRow {
    /// Nanoseconds since local midnight.
    pub ts_ns: u64,
    pub best_bid: Option<SignedPrice>,
    pub best_offer: Option<SignedPrice>,
    pub volume: u64,
    /// Magnitude of the triggering event's price.
    pub price: SignedPrice,
}

/// Decide whether `event` produces a row, updating the cached top of book.
///
/// The caller has already resolved `state` for the event's instrument; a
/// missing state is its error to raise.
pub fn classify(
    state: &mut QuoteState,
    book: &InstrumentBook,
    event: &MutationEvent,
    trades_only: bool,
) -> Option<OutputRow> {
    // Current top of book under the sign convention: greatest stored key is
    // best on both sides, offers negate back to the real price.
    let bid = book.bids().last_key_value().map(|(p, _)| *p);
    let offer = book.offers().last_key_value().map(|(p, _)| -*p);

    let mut row = None;

    // Save if BBO changes
    if (bid != state.bid || offer != state.offer) && !trades_only {
        state.bid = bid;
        state.offer = offer;
        if event.kind != EventKind::Execute {
            row = Some(OutputRow {
                ts_ns: event.ts_ns,
                best_bid: state.bid,
                best_offer: state.offer,
                volume: event.volume,
                price: event.price.magnitude(),
            });
        }
    }

    // And always save on execute
    if event.kind == EventKind::Execute {
        row = Some(OutputRow {
            ts_ns: event.ts_ns,
            best_bid: state.bid,
            best_offer: state.offer,
            volume: event.volume,
            price: event.price.magnitude(),
        });
    }

    row
}
