//! Per-instrument cache of the last recorded best bid and offer.
use crate::book::SignedPrice;
use crate::directory::{DescriptorRef, MetadataRef};

/// Mutable per-instrument state: the cached top of book plus handles to the
/// instrument's reference data.
#[derive(Debug, Clone)]
pub struct QuoteState {
    pub descriptor: DescriptorRef,
    /// Unresolved until the external identifier lookup answers, possibly never.
    pub metadata: Option<MetadataRef>,
    pub bid: Option<SignedPrice>,
    pub offer: Option<SignedPrice>,
}

/// Quote states indexed by instrument id.
///
/// An entry exists only once reference data for the instrument has been seen;
/// consumers treat a missing entry on the event path as a broken upstream
/// ordering contract. The vector grows to the highest announced id, matching
/// the dense numeric ids the book engine assigns.
#[derive(Debug, Default)]
pub struct QuoteCache {
    states: Vec<Option<QuoteState>>,
}

impl QuoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or refresh the state for a descriptor's instrument id. A
    /// refresh re-seeds the reference data and resets the cached bid/offer.
    pub fn on_reference_data(&mut self, descriptor: DescriptorRef, metadata: Option<MetadataRef>) {
        let idx = descriptor.instrument_id as usize;
        if idx >= self.states.len() {
            self.states.resize(idx + 1, None);
        }
        self.states[idx] = Some(QuoteState {
            descriptor,
            metadata,
            bid: None,
            offer: None,
        });
    }

    pub fn get(&self, instrument_id: u32) -> Option<&QuoteState> {
        self.states.get(instrument_id as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, instrument_id: u32) -> Option<&mut QuoteState> {
        self.states.get_mut(instrument_id as usize)?.as_mut()
    }
}
