//! Binary record file codec
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! header:  "RTRC" | version u16 | feature_width u32 | count u64
//! record:  len u32 | payload [len bytes] | checksum u32
//! payload: feature_width x f32 features, then one f32 label
//! ```
//!
//! The checksum is the first four bytes of SHA-256 over the payload.

use std::io::{self, Read};

use bytes::{Buf, BufMut, BytesMut};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::domain::retrain::Example;

pub const MAGIC: &[u8; 4] = b"RTRC";
pub const VERSION: u16 = 1;
pub const HEADER_LEN: usize = 4 + 2 + 4 + 8;
/// Widest record a header may declare; bounds the per-record read buffer
pub const MAX_FEATURE_WIDTH: u32 = 1 << 20;

/// Errors raised while encoding or decoding record files
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("bad magic bytes, not a record file")]
    BadMagic,

    #[error("unsupported record file version {0}")]
    UnsupportedVersion(u16),

    #[error("feature width {width} exceeds the maximum of {max}")]
    FeatureWidthTooLarge { width: u64, max: u32 },

    #[error("record {index} is truncated")]
    Truncated { index: u64 },

    #[error("record {index} has length {actual}, expected {expected}")]
    LengthMismatch {
        index: u64,
        expected: usize,
        actual: usize,
    },

    #[error("record {index} failed checksum verification")]
    ChecksumMismatch { index: u64 },

    #[error("header declares {expected} records but the file holds {actual}")]
    CountMismatch { expected: u64, actual: u64 },

    #[error("unexpected bytes after the last record")]
    TrailingBytes,

    #[error("example has {actual} features, expected {expected}")]
    WidthMismatch { expected: usize, actual: usize },
}

/// File-level metadata stored in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub feature_width: u32,
    pub count: u64,
}

impl RecordHeader {
    /// Payload byte length of every record under this header
    pub fn payload_len(&self) -> usize {
        (self.feature_width as usize + 1) * 4
    }
}

pub fn encode_header(header: &RecordHeader, out: &mut BytesMut) {
    out.put_slice(MAGIC);
    out.put_u16_le(VERSION);
    out.put_u32_le(header.feature_width);
    out.put_u64_le(header.count);
}

pub fn read_header<R: Read>(reader: &mut R) -> Result<RecordHeader, RecordError> {
    let mut raw = [0u8; HEADER_LEN];
    reader.read_exact(&mut raw).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => RecordError::BadMagic,
        _ => RecordError::Io(e),
    })?;

    let mut buf = &raw[..];
    if &buf[..4] != MAGIC {
        return Err(RecordError::BadMagic);
    }
    buf.advance(4);

    let version = buf.get_u16_le();
    if version != VERSION {
        return Err(RecordError::UnsupportedVersion(version));
    }

    let feature_width = buf.get_u32_le();
    check_feature_width(feature_width as u64)?;

    Ok(RecordHeader {
        feature_width,
        count: buf.get_u64_le(),
    })
}

pub fn check_feature_width(width: u64) -> Result<(), RecordError> {
    if width > MAX_FEATURE_WIDTH as u64 {
        return Err(RecordError::FeatureWidthTooLarge {
            width,
            max: MAX_FEATURE_WIDTH,
        });
    }
    Ok(())
}

fn checksum(payload: &[u8]) -> u32 {
    let digest = Sha256::digest(payload);
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Append one framed record to `out`
pub fn encode_record(
    example: &Example,
    feature_width: usize,
    out: &mut BytesMut,
) -> Result<(), RecordError> {
    if example.features.len() != feature_width {
        return Err(RecordError::WidthMismatch {
            expected: feature_width,
            actual: example.features.len(),
        });
    }

    let payload_len = (feature_width + 1) * 4;
    out.reserve(payload_len + 8);
    out.put_u32_le(payload_len as u32);

    let start = out.len();
    for value in &example.features {
        out.put_f32_le(*value);
    }
    out.put_f32_le(example.label);

    let sum = checksum(&out[start..]);
    out.put_u32_le(sum);

    Ok(())
}

/// Streaming decoder over the records that follow a header
pub struct RecordReader<R> {
    reader: R,
    header: RecordHeader,
    index: u64,
    scratch: Vec<u8>,
    finished: bool,
}

impl<R: Read> RecordReader<R> {
    /// Reads and validates the header, leaving the reader at the first record
    pub fn new(mut reader: R) -> Result<Self, RecordError> {
        let header = read_header(&mut reader)?;
        let scratch = vec![0u8; header.payload_len() + 4];

        Ok(Self {
            reader,
            header,
            index: 0,
            scratch,
            finished: false,
        })
    }

    pub fn header(&self) -> RecordHeader {
        self.header
    }

    fn read_next(&mut self) -> Result<Option<Example>, RecordError> {
        if self.index == self.header.count {
            return self.expect_end().map(|_| None);
        }

        let mut len_raw = [0u8; 4];
        if let Err(e) = self.reader.read_exact(&mut len_raw) {
            return Err(match e.kind() {
                io::ErrorKind::UnexpectedEof => RecordError::CountMismatch {
                    expected: self.header.count,
                    actual: self.index,
                },
                _ => RecordError::Io(e),
            });
        }

        let len = u32::from_le_bytes(len_raw) as usize;
        let expected = self.header.payload_len();
        if len != expected {
            return Err(RecordError::LengthMismatch {
                index: self.index,
                expected,
                actual: len,
            });
        }

        let index = self.index;
        self.reader
            .read_exact(&mut self.scratch)
            .map_err(|e| match e.kind() {
                io::ErrorKind::UnexpectedEof => RecordError::Truncated { index },
                _ => RecordError::Io(e),
            })?;

        let (payload, mut trailer) = self.scratch.split_at(len);
        if checksum(payload) != trailer.get_u32_le() {
            return Err(RecordError::ChecksumMismatch { index });
        }

        let mut payload = payload;
        let width = self.header.feature_width as usize;
        let mut features = Vec::with_capacity(width);
        for _ in 0..width {
            features.push(payload.get_f32_le());
        }
        let label = payload.get_f32_le();

        self.index += 1;
        Ok(Some(Example::new(features, label)))
    }

    fn expect_end(&mut self) -> Result<(), RecordError> {
        let mut trailing = [0u8; 1];
        match self.reader.read(&mut trailing)? {
            0 => Ok(()),
            _ => Err(RecordError::TrailingBytes),
        }
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Example, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next() {
            Ok(Some(example)) => Some(Ok(example)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
