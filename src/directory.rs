//! Instrument reference data delivered by the upstream directory feed.
//!
//! Descriptors and metadata are built by the replay driver and handed to the
//! recorder as `Arc` handles; the quote cache keeps a clone, so an entry can
//! never outlive the data it points at.
use std::sync::Arc;

/// Immutable per-instrument descriptor announced by the directory feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentDescriptor {
    pub instrument_id: u32,
    /// Display symbol, e.g. `AAPL`.
    pub symbol: String,
}

/// Optional security identifiers resolved from an external lookup. Any of
/// them may be missing; unresolved fields surface as nulls in the output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentMetadata {
    pub figi: Option<String>,
    pub isin: Option<String>,
    pub secid: Option<i32>,
}

impl InstrumentMetadata {
    pub fn is_empty(&self) -> bool {
        self.figi.is_none() && self.isin.is_none() && self.secid.is_none()
    }
}

/// Shared handle types used across the recorder.
pub type DescriptorRef = Arc<InstrumentDescriptor>;
pub type MetadataRef = Arc<InstrumentMetadata>;
