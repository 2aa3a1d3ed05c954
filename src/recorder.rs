//! Recorder lifecycle: configuration, event dispatch, counters, close.
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::book::{InstrumentBook, MutationEvent};
use crate::classifier::classify;
use crate::directory::{DescriptorRef, MetadataRef};
use crate::encoder::{RowEncoder, SessionClock};
use crate::quote::QuoteCache;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("destination configuration is missing")]
    MissingDestination,
    /// Reference data must precede any event for the same instrument; an
    /// event without a quote state means the upstream ordering contract broke
    /// and the process must stop before writing malformed rows.
    #[error("no quote state for instrument {instrument_id}")]
    UnknownInstrument { instrument_id: u32 },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

/// Recorder options. `destination` is the only required field.
#[derive(Debug, Clone, Default)]
pub struct RecorderConfig {
    /// Output Parquet path.
    pub destination: Option<PathBuf>,
    /// Record trades and executions only.
    pub trades_only: bool,
    /// Accepted for compatibility with existing job configs; nothing is
    /// written to it yet.
    pub ticker_report: Option<PathBuf>,
}

/// Diagnostic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderStats {
    /// Book mutation events observed.
    pub messages: u64,
    /// Rows handed to the Parquet stream.
    pub rows_written: u64,
}

/// Owns the quote cache and the output stream; the replay driver calls the
/// handler methods directly for each frame it decodes.
pub struct Recorder {
    destination: PathBuf,
    trades_only: bool,
    ticker_report: Option<PathBuf>,
    quotes: QuoteCache,
    encoder: RowEncoder,
    messages: u64,
}

impl Recorder {
    /// Open the output stream. Fails without a destination.
    pub fn new(config: RecorderConfig, clock: SessionClock) -> Result<Self, RecorderError> {
        let destination = config.destination.ok_or(RecorderError::MissingDestination)?;
        let encoder = RowEncoder::create(&destination, clock)?;
        info!(
            destination = %destination.display(),
            trades_only = config.trades_only,
            "recording BBO and trades"
        );
        Ok(Self {
            destination,
            trades_only: config.trades_only,
            ticker_report: config.ticker_report,
            quotes: QuoteCache::new(),
            encoder,
            messages: 0,
        })
    }

    /// Seed or refresh the quote state for a newly announced instrument.
    pub fn on_reference_data(&mut self, descriptor: &DescriptorRef, metadata: Option<&MetadataRef>) {
        self.quotes
            .on_reference_data(DescriptorRef::clone(descriptor), metadata.cloned());
    }

    /// Handle one book mutation: classify it against the cached top of book
    /// and append a row when the policy says so.
    pub fn on_event(
        &mut self,
        book: &InstrumentBook,
        event: &MutationEvent,
    ) -> Result<(), RecorderError> {
        self.messages += 1;
        let state = self
            .quotes
            .get_mut(event.instrument_id)
            .ok_or(RecorderError::UnknownInstrument {
                instrument_id: event.instrument_id,
            })?;
        if let Some(row) = classify(state, book, event, self.trades_only) {
            self.encoder.append(state, &row)?;
        }
        Ok(())
    }

    pub fn stats(&self) -> RecorderStats {
        RecorderStats {
            messages: self.messages,
            rows_written: self.encoder.rows(),
        }
    }

    /// Effective configuration, as resolved at construction.
    pub fn config(&self) -> RecorderConfig {
        RecorderConfig {
            destination: Some(self.destination.clone()),
            trades_only: self.trades_only,
            ticker_report: self.ticker_report.clone(),
        }
    }

    /// Flush the open row group and finalize the file. Consumes the recorder,
    /// so nothing can be written afterwards.
    pub fn close(self) -> Result<RecorderStats, RecorderError> {
        let messages = self.messages;
        let rows_written = self.encoder.close()?;
        info!(rows_written, messages, "closed parquet file");
        Ok(RecorderStats {
            messages,
            rows_written,
        })
    }
}
