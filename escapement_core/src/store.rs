//! Calibration record persistence.
//!
//! Wire format: postcard-encoded [`CalibrationRecord`] followed by a
//! little-endian CRC-32 of the payload. A record is accepted only when the
//! checksum matches, the tag equals [`RECORD_TAG`] and the bucket count
//! matches the configured grid.

use escapement_traits::PersistentStore;
use serde::Serialize;
use thiserror::Error;

use crate::record::{CalibrationRecord, RECORD_TAG, TemperatureBucket};

const CRC_LEN: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("no calibration record stored")]
    NotFound,
    #[error("calibration record is not tagged valid (tag {0:#06x})")]
    InvalidTag(u32),
    #[error("calibration record is corrupt: {0}")]
    Corrupt(String),
    #[error("calibration record has {found} buckets, expected {expected}")]
    LayoutMismatch { expected: usize, found: usize },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("cannot encode calibration record: {0}")]
    Encode(String),
}

/// Borrowed view serialized in place of the record so the tag can be stamped
/// without cloning the buckets. Field order matches [`CalibrationRecord`].
#[derive(Serialize)]
struct Stamped<'a> {
    valid_tag: u32,
    clock_bias: i32,
    manual_adjust: i64,
    temp_compensated: bool,
    buckets: &'a [TemperatureBucket],
}

impl<'a> Stamped<'a> {
    fn of(record: &'a CalibrationRecord) -> Self {
        Self {
            valid_tag: RECORD_TAG,
            clock_bias: record.clock_bias,
            manual_adjust: record.manual_adjust,
            temp_compensated: record.temp_compensated,
            buckets: &record.buckets,
        }
    }
}

/// Upper bound on the encoded size of a record with `steps` buckets.
pub fn encoded_len_bound(steps: usize) -> usize {
    // header varints: u32 5 + i32 5 + i64 10 + bool 1 + seq len 10
    // bucket: f64 8 + u32 varint 5 + enum tag 1
    31 + steps * 14 + CRC_LEN
}

/// Encode a record with the valid tag stamped and the checksum appended.
pub fn encode_record(record: &CalibrationRecord) -> Result<Vec<u8>, StoreError> {
    let mut out = postcard::to_allocvec(&Stamped::of(record))
        .map_err(|e| StoreError::Encode(e.to_string()))?;
    let crc = crc32fast::hash(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    Ok(out)
}

/// Decode and verify a stored blob. `expected_steps` rejects a record laid out
/// for a different grid.
pub fn decode_record(
    bytes: &[u8],
    expected_steps: Option<usize>,
) -> Result<CalibrationRecord, StoreError> {
    if bytes.len() < CRC_LEN {
        return Err(StoreError::Corrupt(format!("{} bytes is too short", bytes.len())));
    }
    let (payload, trailer) = bytes.split_at(bytes.len() - CRC_LEN);
    let mut crc = [0u8; CRC_LEN];
    crc.copy_from_slice(trailer);
    let stored = u32::from_le_bytes(crc);
    let actual = crc32fast::hash(payload);
    if stored != actual {
        return Err(StoreError::Corrupt(format!(
            "checksum {stored:#010x} does not match payload {actual:#010x}"
        )));
    }
    let record: CalibrationRecord =
        postcard::from_bytes(payload).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    if !record.is_valid() {
        return Err(StoreError::InvalidTag(record.valid_tag));
    }
    if let Some(expected) = expected_steps
        && record.buckets.len() != expected
    {
        return Err(StoreError::LayoutMismatch {
            expected,
            found: record.buckets.len(),
        });
    }
    Ok(record)
}

/// Record persistence on top of an optional [`PersistentStore`].
///
/// Encoding goes through a scratch buffer sized once for the grid, so saving
/// from the beat path does not allocate.
pub struct CalibrationStore<P> {
    backend: Option<P>,
    steps: usize,
    scratch: Vec<u8>,
}

impl<P: PersistentStore> CalibrationStore<P> {
    pub fn new(backend: Option<P>, steps: usize) -> Self {
        Self {
            backend,
            steps,
            scratch: vec![0; encoded_len_bound(steps)],
        }
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn load(&mut self) -> Result<CalibrationRecord, StoreError> {
        let Some(backend) = self.backend.as_mut() else {
            return Err(StoreError::NotFound);
        };
        let bytes = backend
            .load()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .ok_or(StoreError::NotFound)?;
        decode_record(&bytes, Some(self.steps))
    }

    /// Persist `record` with the valid tag stamped. The caller's record is not
    /// modified; stamp it after a successful return.
    pub fn save(&mut self, record: &CalibrationRecord) -> Result<(), StoreError> {
        let Some(backend) = self.backend.as_mut() else {
            return Err(StoreError::Unavailable("no store attached".into()));
        };
        let limit = self.scratch.len() - CRC_LEN;
        let used = postcard::to_slice(&Stamped::of(record), &mut self.scratch[..limit])
            .map_err(|e| StoreError::Encode(e.to_string()))?
            .len();
        let crc = crc32fast::hash(&self.scratch[..used]);
        self.scratch[used..used + CRC_LEN].copy_from_slice(&crc.to_le_bytes());
        backend
            .save(&self.scratch[..used + CRC_LEN])
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}
