//! Durable capture-file schema and framing.
//!
//! A capture is a sequence of frames, each written as
//! `[len: u32 LE][crc32: u32 LE][bincode payload]` with the CRC taken over
//! the payload. The first frame is the header; reference-data and order
//! frames follow in feed order. Readers verify every CRC and fail loudly on
//! mismatch or truncation rather than replaying a corrupt stream.
use std::io::{Read, Write};

use crc32fast::Hasher as Crc32;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::book::OrderRecord;

/// Current capture format version.
pub const CAPTURE_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureHeader {
    pub version: u16,
    /// Session date, `YYYY-MM-DD`.
    pub session_date: String,
    /// UTC offset of the venue's local midnight, in seconds.
    pub utc_offset_secs: i32,
    /// Human-readable description of the upstream feed.
    pub source: String,
}

/// One instrument announcement from the directory feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceData {
    pub instrument_id: u32,
    pub symbol: String,
    pub figi: Option<String>,
    pub isin: Option<String>,
    pub secid: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CaptureFrame {
    Header(CaptureHeader),
    RefData(ReferenceData),
    Order(OrderRecord),
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("crc mismatch at frame {frame}: file={file:#x}, calc={calc:#x}")]
    CrcMismatch { frame: u64, file: u32, calc: u32 },
    #[error("frame decode failed: {0}")]
    Decode(#[from] bincode::Error),
}

/// Serialize and frame one record.
pub fn write_frame<W: Write>(w: &mut W, frame: &CaptureFrame) -> Result<(), CaptureError> {
    let payload = bincode::serialize(frame)?;
    let mut hasher = Crc32::new();
    hasher.update(&payload);
    let crc = hasher.finalize();

    let len = payload.len() as u32;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(&crc.to_le_bytes())?;
    w.write_all(&payload)?;
    Ok(())
}

/// Streaming frame reader with CRC verification.
pub struct CaptureReader<R: Read> {
    inner: R,
    frames: u64,
}

impl<R: Read> CaptureReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, frames: 0 }
    }

    /// Frames decoded so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Read the next frame; `Ok(None)` at a clean end of stream. EOF inside
    /// a frame is an error, as is a CRC mismatch.
    pub fn read_frame(&mut self) -> Result<Option<CaptureFrame>, CaptureError> {
        let mut len_bytes = [0u8; 4];
        match self.inner.read_exact(&mut len_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_le_bytes(len_bytes) as usize;

        let mut crc_bytes = [0u8; 4];
        self.inner.read_exact(&mut crc_bytes)?;
        let crc_on_file = u32::from_le_bytes(crc_bytes);

        let mut payload = vec![0u8; len];
        self.inner.read_exact(&mut payload)?;

        let mut hasher = Crc32::new();
        hasher.update(&payload);
        let crc_calc = hasher.finalize();
        if crc_calc != crc_on_file {
            return Err(CaptureError::CrcMismatch {
                frame: self.frames,
                file: crc_on_file,
                calc: crc_calc,
            });
        }

        let frame: CaptureFrame = bincode::deserialize(&payload)?;
        self.frames += 1;
        Ok(Some(frame))
    }
}
