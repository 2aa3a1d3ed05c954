//! Parquet output: schema, timestamp composition, row buffering.
//!
//! Rows are buffered and materialized into Arrow record batches, one batch
//! per row group, written through `parquet::arrow::ArrowWriter`. Prices land
//! in Decimal(13,4) columns straight from the fixed-point raw values, so the
//! on-disk encoding is lossless.
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, Date32Array, Decimal128Array, Int32Array, Int64Array, StringArray,
    Time32MillisecondArray, TimestampMillisecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use time::{Date, UtcOffset};

use crate::book::SignedPrice;
use crate::classifier::OutputRow;
use crate::quote::QuoteState;
use crate::recorder::RecorderError;

/// Decimal(13,4): 9 integer digits, 4 fraction digits.
pub const PRICE_PRECISION: u8 = 13;
pub const PRICE_SCALE: i8 = SignedPrice::SCALE as i8;

/// Rows buffered before a row group is flushed.
const ROWS_PER_GROUP: usize = 8192;

const UNIX_EPOCH_JULIAN_DAY: i32 = 2_440_588;

/// Session date and the fixed nanosecond offset of its midnight, resolved
/// once at startup.
///
/// The stored offset sits one nanosecond before day start; composing an
/// absolute timestamp adds the nanosecond back, so an event at 00:00:00.0
/// maps exactly onto midnight.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    date: Date,
    midnight_offset_ns: i64,
}

impl SessionClock {
    pub fn new(date: Date, utc_offset: UtcOffset) -> Self {
        let day_start_ns = date.midnight().assume_offset(utc_offset).unix_timestamp_nanos() as i64;
        Self {
            date,
            midnight_offset_ns: day_start_ns - 1,
        }
    }

    /// Session date as a Date32 value.
    pub fn days_since_epoch(&self) -> i32 {
        self.date.to_julian_day() - UNIX_EPOCH_JULIAN_DAY
    }

    /// Absolute epoch nanoseconds for an event timestamp.
    pub fn absolute_ns(&self, ns_since_midnight: u64) -> i64 {
        self.midnight_offset_ns + ns_since_midnight as i64 + 1
    }
}

/// Output column layout, in file order.
pub fn output_schema() -> Schema {
    Schema::new(vec![
        Field::new("ts_date", DataType::Date32, false),
        Field::new(
            "ts_ms",
            DataType::Timestamp(TimeUnit::Millisecond, None),
            false,
        ),
        Field::new("ts_ns", DataType::Int64, false),
        Field::new("local_time_ms", DataType::Time32(TimeUnit::Millisecond), false),
        Field::new("ticker", DataType::Utf8, false),
        Field::new("figi", DataType::Utf8, true),
        Field::new("isin", DataType::Utf8, true),
        Field::new("algoseek_secid", DataType::Int32, true),
        Field::new(
            "best_bid",
            DataType::Decimal128(PRICE_PRECISION, PRICE_SCALE),
            true,
        ),
        Field::new(
            "best_offer",
            DataType::Decimal128(PRICE_PRECISION, PRICE_SCALE),
            true,
        ),
        Field::new("volume", DataType::Int64, false),
        Field::new(
            "price",
            DataType::Decimal128(PRICE_PRECISION, PRICE_SCALE),
            false,
        ),
    ])
}

/// One fully converted row awaiting its row group.
struct PendingRow {
    ts_date: i32,
    ts_ms: i64,
    ts_ns: i64,
    local_time_ms: i32,
    ticker: String,
    figi: Option<String>,
    isin: Option<String>,
    secid: Option<i32>,
    best_bid: Option<i128>,
    best_offer: Option<i128>,
    volume: i64,
    price: i128,
}

/// Buffering Parquet writer for the output schema.
pub struct RowEncoder {
    schema: SchemaRef,
    writer: ArrowWriter<File>,
    clock: SessionClock,
    pending: Vec<PendingRow>,
    rows: u64,
}

impl RowEncoder {
    /// Open the output file and write the Parquet header.
    pub fn create(path: &Path, clock: SessionClock) -> Result<Self, RecorderError> {
        let schema: SchemaRef = Arc::new(output_schema());
        let file = File::create(path)?;
        let writer = ArrowWriter::try_new(file, Arc::clone(&schema), None)?;
        Ok(Self {
            schema,
            writer,
            clock,
            pending: Vec::with_capacity(ROWS_PER_GROUP),
            rows: 0,
        })
    }

    /// Total rows appended so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Convert and buffer one row; flushes a row group when full.
    pub fn append(&mut self, state: &QuoteState, row: &OutputRow) -> Result<(), RecorderError> {
        let abs_ns = self.clock.absolute_ns(row.ts_ns);
        let meta = state.metadata.as_deref();
        self.pending.push(PendingRow {
            ts_date: self.clock.days_since_epoch(),
            ts_ms: abs_ns / 1_000_000,
            ts_ns: abs_ns,
            local_time_ms: (row.ts_ns / 1_000_000) as i32,
            ticker: state.descriptor.symbol.clone(),
            figi: meta.and_then(|m| m.figi.clone()),
            isin: meta.and_then(|m| m.isin.clone()),
            secid: meta.and_then(|m| m.secid),
            best_bid: row.best_bid.map(|p| p.unscaled()),
            best_offer: row.best_offer.map(|p| p.unscaled()),
            volume: row.volume as i64,
            price: row.price.unscaled(),
        });
        self.rows += 1;
        if self.pending.len() >= ROWS_PER_GROUP {
            self.flush()?;
        }
        Ok(())
    }

    /// Write buffered rows out as one row group.
    fn flush(&mut self) -> Result<(), RecorderError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = self.batch()?;
        self.writer.write(&batch)?;
        self.pending.clear();
        Ok(())
    }

    fn batch(&self) -> Result<RecordBatch, RecorderError> {
        let rows = &self.pending;
        let ts_date: ArrayRef = Arc::new(Date32Array::from(
            rows.iter().map(|r| r.ts_date).collect::<Vec<_>>(),
        ));
        let ts_ms: ArrayRef = Arc::new(TimestampMillisecondArray::from(
            rows.iter().map(|r| r.ts_ms).collect::<Vec<_>>(),
        ));
        let ts_ns: ArrayRef = Arc::new(Int64Array::from(
            rows.iter().map(|r| r.ts_ns).collect::<Vec<_>>(),
        ));
        let local_time_ms: ArrayRef = Arc::new(Time32MillisecondArray::from(
            rows.iter().map(|r| r.local_time_ms).collect::<Vec<_>>(),
        ));
        let ticker: ArrayRef = Arc::new(StringArray::from(
            rows.iter().map(|r| r.ticker.clone()).collect::<Vec<_>>(),
        ));
        let figi: ArrayRef = Arc::new(StringArray::from(
            rows.iter().map(|r| r.figi.clone()).collect::<Vec<_>>(),
        ));
        let isin: ArrayRef = Arc::new(StringArray::from(
            rows.iter().map(|r| r.isin.clone()).collect::<Vec<_>>(),
        ));
        let secid: ArrayRef = Arc::new(Int32Array::from(
            rows.iter().map(|r| r.secid).collect::<Vec<_>>(),
        ));
        let best_bid: ArrayRef = Arc::new(
            Decimal128Array::from(rows.iter().map(|r| r.best_bid).collect::<Vec<_>>())
                .with_precision_and_scale(PRICE_PRECISION, PRICE_SCALE)?,
        );
        let best_offer: ArrayRef = Arc::new(
            Decimal128Array::from(rows.iter().map(|r| r.best_offer).collect::<Vec<_>>())
                .with_precision_and_scale(PRICE_PRECISION, PRICE_SCALE)?,
        );
        let volume: ArrayRef = Arc::new(Int64Array::from(
            rows.iter().map(|r| r.volume).collect::<Vec<_>>(),
        ));
        let price: ArrayRef = Arc::new(
            Decimal128Array::from(rows.iter().map(|r| r.price).collect::<Vec<_>>())
                .with_precision_and_scale(PRICE_PRECISION, PRICE_SCALE)?,
        );
        RecordBatch::try_new(
            Arc::clone(&self.schema),
            vec![
                ts_date,
                ts_ms,
                ts_ns,
                local_time_ms,
                ticker,
                figi,
                isin,
                secid,
                best_bid,
                best_offer,
                volume,
                price,
            ],
        )
        .map_err(RecorderError::from)
    }

    /// Flush the final row group and finalize the file footer. Returns the
    /// total number of rows written.
    pub fn close(mut self) -> Result<u64, RecorderError> {
        self.flush()?;
        self.writer.close()?;
        Ok(self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn midnight_event_lands_exactly_on_midnight() {
        let clock = SessionClock::new(date!(2018 - 06 - 06), UtcOffset::UTC);
        // 2018-06-06 is 17688 days after the epoch
        assert_eq!(clock.days_since_epoch(), 17_688);
        assert_eq!(clock.absolute_ns(0), 17_688 * 86_400_000_000_000);
    }

    #[test]
    fn absolute_time_composition() {
        let clock = SessionClock::new(date!(2018 - 06 - 06), UtcOffset::UTC);
        // 09:30:00 local
        let ts = 34_200_000_000_000u64;
        assert_eq!(clock.absolute_ns(ts), 1_528_277_400_000_000_000);
    }

    #[test]
    fn offset_shifts_midnight() {
        let utc = SessionClock::new(date!(2018 - 06 - 06), UtcOffset::UTC);
        let east = SessionClock::new(
            date!(2018 - 06 - 06),
            UtcOffset::from_whole_seconds(-4 * 3600).unwrap(),
        );
        assert_eq!(east.absolute_ns(0) - utc.absolute_ns(0), 4 * 3600 * 1_000_000_000);
    }
}
