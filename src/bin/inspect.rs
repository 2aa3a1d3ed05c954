use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, Date32Array, Decimal128Array, Int32Array, Int64Array, StringArray,
    Time32MillisecondArray, TimestampMillisecondArray,
};
use arrow::record_batch::RecordBatch;
use bbo_recorder::book::SignedPrice;
use clap::Parser;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(about = "Print rows from a recorded BBO/trades Parquet file")]
struct Args {
    /// Input Parquet file to read
    #[arg(long, short = 'i')]
    input: PathBuf,

    /// Number of rows to print; 0 prints everything
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let file = File::open(&args.input).with_context(|| format!("open {:?}", args.input))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).context("read parquet footer")?;
    let reader = builder.build()?;

    let mut total = 0usize;
    let mut printed = 0usize;
    for batch in reader {
        let batch = batch?;
        print_batch(&batch, total, args.limit, &mut printed)?;
        total += batch.num_rows();
    }
    eprintln!("Read {} rows.", total);
    Ok(())
}

fn print_batch(batch: &RecordBatch, offset: usize, limit: usize, printed: &mut usize) -> Result<()> {
    let ts_ns = col::<Int64Array>(batch, 2, "ts_ns")?;
    let local_ms = col::<Time32MillisecondArray>(batch, 3, "local_time_ms")?;
    let ticker = col::<StringArray>(batch, 4, "ticker")?;
    let figi = col::<StringArray>(batch, 5, "figi")?;
    let isin = col::<StringArray>(batch, 6, "isin")?;
    let secid = col::<Int32Array>(batch, 7, "algoseek_secid")?;
    let best_bid = col::<Decimal128Array>(batch, 8, "best_bid")?;
    let best_offer = col::<Decimal128Array>(batch, 9, "best_offer")?;
    let volume = col::<Int64Array>(batch, 10, "volume")?;
    let price = col::<Decimal128Array>(batch, 11, "price")?;
    // present but implied by ts_ns; decoded only to validate the columns
    let _ = col::<Date32Array>(batch, 0, "ts_date")?;
    let _ = col::<TimestampMillisecondArray>(batch, 1, "ts_ms")?;

    for idx in 0..batch.num_rows() {
        if limit != 0 && *printed >= limit {
            return Ok(());
        }
        println!(
            "{:>8} {:>20} {:>12} {:>8} {:>12} {:>12} {:>14} {:>10} {} {} {}",
            offset + idx,
            ts_ns.value(idx),
            local_ms.value(idx),
            ticker.value(idx),
            dec_opt(best_bid, idx),
            dec_opt(best_offer, idx),
            dec(price.value(idx)),
            volume.value(idx),
            str_opt(figi, idx),
            str_opt(isin, idx),
            int_opt(secid, idx),
        );
        *printed += 1;
    }
    Ok(())
}

fn col<'a, T: 'static>(batch: &'a RecordBatch, index: usize, name: &str) -> Result<&'a T> {
    match batch.column(index).as_any().downcast_ref::<T>() {
        Some(array) => Ok(array),
        None => bail!("column {index} ({name}) has an unexpected type"),
    }
}

fn dec(unscaled: i128) -> String {
    SignedPrice::from_raw(unscaled as i64).to_string()
}

fn dec_opt(array: &Decimal128Array, idx: usize) -> String {
    if array.is_null(idx) {
        "-".into()
    } else {
        dec(array.value(idx))
    }
}

fn str_opt(array: &StringArray, idx: usize) -> String {
    if array.is_null(idx) {
        "-".into()
    } else {
        array.value(idx).to_string()
    }
}

fn int_opt(array: &Int32Array, idx: usize) -> String {
    if array.is_null(idx) {
        "-".into()
    } else {
        array.value(idx).to_string()
    }
}
