//! Order book model fed by replayed order events.
//!
//! This module defines the fixed-point [`SignedPrice`] type, the order-level
//! actions carried in capture files, and a compact per-instrument book
//! ([`InstrumentBook`]) that applies those actions and synthesizes the
//! [`MutationEvent`] the recorder consumes.
//!
//! Price levels are kept in `BTreeMap`s with one sign convention throughout:
//! offer prices are stored negated, so on both sides the greatest stored key
//! is the best level. Consumers that want the real offer price negate the
//! stored value back.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Neg;

/// Fixed-point price with 4 implied decimal places (1 unit = 0.0001).
///
/// The raw value is signed: offer-side prices are held negated inside the
/// book so that ordering by "greatest" yields the best level on either side.
/// The raw value doubles as the unscaled Decimal(13,4) written to the output
/// file, which keeps the encoding lossless.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct SignedPrice(pub i64);

impl SignedPrice {
    /// Implied decimal places.
    pub const SCALE: u32 = 4;

    /// Build from a raw count of 1/10000 price units.
    pub fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> i64 {
        self.0
    }

    /// Price with the sign convention stripped.
    pub fn magnitude(self) -> Self {
        Self(self.0.abs())
    }

    /// Unscaled value for a Decimal(_, 4) column.
    pub fn unscaled(self) -> i128 {
        self.0 as i128
    }
}

impl Neg for SignedPrice {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl fmt::Display for SignedPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:04}", sign, abs / 10_000, abs % 10_000)
    }
}

/// Book side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Offer,
}

/// Kind of book mutation reported to the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Add,
    Execute,
    Delete,
    Cancel,
    Replace,
}

/// Order-level action as captured from the upstream feed. Prices are real
/// (positive) values; the book applies the sign convention on insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderAction {
    Add {
        order_id: u64,
        side: Side,
        price: SignedPrice,
        qty: u64,
    },
    Execute {
        order_id: u64,
        qty: u64,
    },
    Delete {
        order_id: u64,
    },
    Cancel {
        order_id: u64,
        qty: u64,
    },
    Replace {
        old_order_id: u64,
        order_id: u64,
        price: SignedPrice,
        qty: u64,
    },
}

/// One captured order event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub instrument_id: u32,
    /// Nanoseconds since local midnight.
    pub ts_ns: u64,
    pub action: OrderAction,
}

/// Book mutation handed to the recorder, one per applied [`OrderRecord`].
#[derive(Debug, Clone, Copy)]
pub struct MutationEvent {
    pub kind: EventKind,
    pub instrument_id: u32,
    /// Nanoseconds since local midnight.
    pub ts_ns: u64,
    /// Traded volume; 0 for everything but `Execute`.
    pub volume: u64,
    /// Signed price of the affected order.
    pub price: SignedPrice,
}

#[derive(Debug, Clone, Copy)]
struct RestingOrder {
    /// Stored with the side convention applied (offers negated).
    price: SignedPrice,
    qty: u64,
}

/// Per-instrument limit order book aggregated to price levels.
#[derive(Debug, Default)]
pub struct InstrumentBook {
    orders: HashMap<u64, RestingOrder>,
    /// Real prices, greatest key = best bid.
    bids: BTreeMap<SignedPrice, u64>,
    /// Negated prices, greatest key = best (lowest real) offer.
    offers: BTreeMap<SignedPrice, u64>,
}

impl InstrumentBook {
    /// Resting bid levels, keyed by real price.
    pub fn bids(&self) -> &BTreeMap<SignedPrice, u64> {
        &self.bids
    }

    /// Resting offer levels, keyed by negated price.
    pub fn offers(&self) -> &BTreeMap<SignedPrice, u64> {
        &self.offers
    }

    /// Highest resting bid, if any.
    pub fn best_bid(&self) -> Option<SignedPrice> {
        self.bids.last_key_value().map(|(p, _)| *p)
    }

    /// Lowest resting offer as a real price, if any.
    pub fn best_offer(&self) -> Option<SignedPrice> {
        self.offers.last_key_value().map(|(p, _)| -*p)
    }

    /// Apply one order event and report the resulting mutation.
    ///
    /// Actions referencing an unknown order id are dropped without an event;
    /// the upstream feed replays them for orders placed before the capture
    /// started.
    pub fn apply(&mut self, rec: &OrderRecord) -> Option<MutationEvent> {
        let (kind, volume, price) = match rec.action {
            OrderAction::Add {
                order_id,
                side,
                price,
                qty,
            } => {
                let stored = match side {
                    Side::Bid => price,
                    Side::Offer => -price,
                };
                *self.levels_mut(stored).entry(stored).or_insert(0) += qty;
                self.orders
                    .insert(order_id, RestingOrder { price: stored, qty });
                (EventKind::Add, 0, stored)
            }
            OrderAction::Execute { order_id, qty } => {
                let (price, executed) = self.reduce(order_id, qty)?;
                (EventKind::Execute, executed, price)
            }
            OrderAction::Delete { order_id } => {
                let remaining = self.orders.get(&order_id)?.qty;
                let (price, _) = self.reduce(order_id, remaining)?;
                (EventKind::Delete, 0, price)
            }
            OrderAction::Cancel { order_id, qty } => {
                let (price, _) = self.reduce(order_id, qty)?;
                (EventKind::Cancel, 0, price)
            }
            OrderAction::Replace {
                old_order_id,
                order_id,
                price,
                qty,
            } => {
                let old = *self.orders.get(&old_order_id)?;
                self.reduce(old_order_id, old.qty)?;
                // replacement keeps the side of the order it supersedes
                let stored = if old.price.raw() >= 0 { price } else { -price };
                *self.levels_mut(stored).entry(stored).or_insert(0) += qty;
                self.orders
                    .insert(order_id, RestingOrder { price: stored, qty });
                (EventKind::Replace, 0, stored)
            }
        };
        Some(MutationEvent {
            kind,
            instrument_id: rec.instrument_id,
            ts_ns: rec.ts_ns,
            volume,
            price,
        })
    }

    fn levels_mut(&mut self, stored: SignedPrice) -> &mut BTreeMap<SignedPrice, u64> {
        if stored.raw() >= 0 {
            &mut self.bids
        } else {
            &mut self.offers
        }
    }

    /// Take `qty` off an order, dropping it (and an emptied level) at zero.
    /// Returns the stored price and the quantity actually removed.
    fn reduce(&mut self, order_id: u64, qty: u64) -> Option<(SignedPrice, u64)> {
        let order = self.orders.get_mut(&order_id)?;
        let removed = qty.min(order.qty);
        order.qty -= removed;
        let price = order.price;
        if order.qty == 0 {
            self.orders.remove(&order_id);
        }
        let levels = self.levels_mut(price);
        if let Some(level_qty) = levels.get_mut(&price) {
            *level_qty = level_qty.saturating_sub(removed);
            if *level_qty == 0 {
                levels.remove(&price);
            }
        }
        Some((price, removed))
    }
}

/// All instrument books, created on demand per instrument id.
#[derive(Debug, Default)]
pub struct BookSet {
    books: HashMap<u32, InstrumentBook>,
}

impl BookSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one order event to its instrument's book.
    pub fn apply(&mut self, rec: &OrderRecord) -> Option<(&InstrumentBook, MutationEvent)> {
        let book = self.books.entry(rec.instrument_id).or_default();
        let event = book.apply(rec)?;
        Some((&*book, event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(p: f64) -> SignedPrice {
        SignedPrice::from_raw((p * 10_000.0).round() as i64)
    }

    fn add(instrument_id: u32, order_id: u64, side: Side, price: f64, qty: u64) -> OrderRecord {
        OrderRecord {
            instrument_id,
            ts_ns: 0,
            action: OrderAction::Add {
                order_id,
                side,
                price: px(price),
                qty,
            },
        }
    }

    #[test]
    fn sign_convention_yields_best_levels() {
        let mut book = InstrumentBook::default();
        book.apply(&add(1, 1, Side::Bid, 100.00, 10));
        book.apply(&add(1, 2, Side::Bid, 99.50, 10));
        book.apply(&add(1, 3, Side::Offer, 100.50, 10));
        book.apply(&add(1, 4, Side::Offer, 101.00, 10));

        assert_eq!(book.best_bid(), Some(px(100.00)));
        assert_eq!(book.best_offer(), Some(px(100.50)));
        // greatest stored offer key is the negated best offer
        assert_eq!(
            book.offers().last_key_value().map(|(p, _)| *p),
            Some(-px(100.50))
        );
    }

    #[test]
    fn execute_drains_order_and_level() {
        let mut book = InstrumentBook::default();
        book.apply(&add(1, 1, Side::Offer, 100.50, 30));
        let ev = book
            .apply(&OrderRecord {
                instrument_id: 1,
                ts_ns: 5,
                action: OrderAction::Execute { order_id: 1, qty: 10 },
            })
            .unwrap();
        assert_eq!(ev.kind, EventKind::Execute);
        assert_eq!(ev.volume, 10);
        assert_eq!(ev.price, -px(100.50));
        assert_eq!(book.best_offer(), Some(px(100.50)));

        book.apply(&OrderRecord {
            instrument_id: 1,
            ts_ns: 6,
            action: OrderAction::Execute { order_id: 1, qty: 20 },
        });
        assert_eq!(book.best_offer(), None);
    }

    #[test]
    fn delete_and_cancel_remove_quantity() {
        let mut book = InstrumentBook::default();
        book.apply(&add(1, 1, Side::Bid, 100.00, 10));
        book.apply(&add(1, 2, Side::Bid, 100.00, 5));

        book.apply(&OrderRecord {
            instrument_id: 1,
            ts_ns: 1,
            action: OrderAction::Cancel { order_id: 1, qty: 4 },
        });
        assert_eq!(book.bids().get(&px(100.00)), Some(&11));

        book.apply(&OrderRecord {
            instrument_id: 1,
            ts_ns: 2,
            action: OrderAction::Delete { order_id: 2 },
        });
        assert_eq!(book.bids().get(&px(100.00)), Some(&6));
    }

    #[test]
    fn replace_moves_order_keeping_side() {
        let mut book = InstrumentBook::default();
        book.apply(&add(1, 1, Side::Offer, 101.00, 10));
        let ev = book
            .apply(&OrderRecord {
                instrument_id: 1,
                ts_ns: 3,
                action: OrderAction::Replace {
                    old_order_id: 1,
                    order_id: 2,
                    price: px(100.75),
                    qty: 8,
                },
            })
            .unwrap();
        assert_eq!(ev.kind, EventKind::Replace);
        assert_eq!(ev.price, -px(100.75));
        assert_eq!(book.best_offer(), Some(px(100.75)));
        assert!(book.offers().get(&-px(101.00)).is_none());
    }

    #[test]
    fn unknown_order_id_is_dropped() {
        let mut book = InstrumentBook::default();
        assert!(book
            .apply(&OrderRecord {
                instrument_id: 1,
                ts_ns: 0,
                action: OrderAction::Delete { order_id: 42 },
            })
            .is_none());
        assert!(book.bids().is_empty());
    }

    #[test]
    fn price_display_and_magnitude() {
        assert_eq!(px(100.50).to_string(), "100.5000");
        assert_eq!((-px(0.25)).to_string(), "-0.2500");
        assert_eq!((-px(100.50)).magnitude(), px(100.50));
        assert_eq!(px(100.50).unscaled(), 1_005_000);
    }
}
