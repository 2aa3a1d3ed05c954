use anyhow::{bail, Context, Result};
use bbo_recorder::book::BookSet;
use bbo_recorder::capture::{CaptureFrame, CaptureReader, ReferenceData, CAPTURE_VERSION};
use bbo_recorder::directory::{InstrumentDescriptor, InstrumentMetadata};
use bbo_recorder::encoder::SessionClock;
use bbo_recorder::recorder::{Recorder, RecorderConfig};
use clap::Parser;
use dotenvy::dotenv;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use time::macros::format_description;
use time::{Date, UtcOffset};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Replay a captured order-event stream into a BBO/trades Parquet file")]
struct Args {
    /// Input capture file (.bin)
    #[arg(long, short = 'i', env = "SRC")]
    src: PathBuf,

    /// Destination Parquet file
    #[arg(long, short = 'o', env = "DST")]
    dst: Option<PathBuf>,

    /// Session date override (YYYY-MM-DD); defaults to the capture header
    #[arg(long, env = "DATE")]
    date: Option<String>,

    /// Record trades and executions only
    #[arg(long, env = "TRADES_ONLY", default_value_t = false)]
    trades_only: bool,

    /// Ticker report path (accepted, not yet written)
    #[arg(long, env = "TICKER_REPORT")]
    ticker_report: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let file = File::open(&args.src).with_context(|| format!("open {:?}", args.src))?;
    let mut reader = CaptureReader::new(BufReader::new(file));

    let header = match reader.read_frame().context("read capture header")? {
        Some(CaptureFrame::Header(h)) => h,
        Some(other) => bail!("capture does not start with a header frame: {other:?}"),
        None => bail!("capture file is empty"),
    };
    if header.version != CAPTURE_VERSION {
        bail!("unsupported capture version {}", header.version);
    }
    info!(
        version = header.version,
        session_date = %header.session_date,
        source = %header.source,
        "capture opened"
    );

    let date_str = args.date.as_deref().unwrap_or(&header.session_date);
    let date = Date::parse(date_str, format_description!("[year]-[month]-[day]"))
        .with_context(|| format!("parse session date {date_str:?}"))?;
    let utc_offset = UtcOffset::from_whole_seconds(header.utc_offset_secs)
        .context("capture utc offset out of range")?;
    let clock = SessionClock::new(date, utc_offset);

    let config = RecorderConfig {
        destination: args.dst,
        trades_only: args.trades_only,
        ticker_report: args.ticker_report,
    };
    let mut recorder = Recorder::new(config, clock)?;
    let mut books = BookSet::new();

    let mut orders = 0u64;
    let start = Instant::now();
    while let Some(frame) = reader.read_frame().context("read capture frame")? {
        match frame {
            CaptureFrame::Header(_) => bail!("unexpected header frame mid-stream"),
            CaptureFrame::RefData(rd) => {
                let (descriptor, metadata) = split_reference_data(rd);
                recorder.on_reference_data(&descriptor, metadata.as_ref());
            }
            CaptureFrame::Order(rec) => {
                orders += 1;
                if let Some((book, event)) = books.apply(&rec) {
                    recorder
                        .on_event(book, &event)
                        .inspect_err(|err| error!(%err, "aborting replay"))?;
                }
                if orders % 10_000_000 == 0 {
                    let ns_per_msg = start.elapsed().as_nanos() as u64 / orders;
                    info!(orders, ns_per_msg, "replay progress");
                }
            }
        }
    }

    let frames = reader.frames();
    let stats = recorder.close()?;
    info!(
        frames,
        messages = stats.messages,
        rows_written = stats.rows_written,
        "replay complete"
    );
    Ok(())
}

/// Turn a reference-data frame into the shared handles the recorder keeps.
fn split_reference_data(
    rd: ReferenceData,
) -> (Arc<InstrumentDescriptor>, Option<Arc<InstrumentMetadata>>) {
    let descriptor = Arc::new(InstrumentDescriptor {
        instrument_id: rd.instrument_id,
        symbol: rd.symbol,
    });
    let metadata = InstrumentMetadata {
        figi: rd.figi,
        isin: rd.isin,
        secid: rd.secid,
    };
    let metadata = if metadata.is_empty() {
        None
    } else {
        Some(Arc::new(metadata))
    };
    (descriptor, metadata)
}
