//! BBO and trade recorder library.
//!
//! This crate provides the types and logic used by the `bbo_recorder` replay
//! binary and the `inspect` tool:
//!
//! - `capture`: durable on-disk input schema (frames with CRC integrity
//!   checks) holding reference data and order events
//! - `book`: fixed-point prices, order events, and the per-instrument book
//!   that turns them into mutation events
//! - `directory`: instrument descriptors and optional security identifiers
//! - `quote`: per-instrument cache of the last recorded best bid/offer
//! - `classifier`: the BBO-change and trade-print row policies
//! - `encoder`: Parquet schema, timestamp composition, row-group buffering
//! - `recorder`: configuration, event dispatch, counters, and close
//!
//! The binaries in this repository (`src/main.rs` and `src/bin/inspect.rs`)
//! use these modules to replay capture files into a columnar BBO/trade
//! record and to read that record back.
pub mod book;
pub mod capture;
pub mod classifier;
pub mod directory;
pub mod encoder;
pub mod quote;
pub mod recorder;
