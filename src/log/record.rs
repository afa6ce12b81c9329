//! On-disk record format of topic log segments
//!
//! Each record contains:
//! - Data Length (u32 BE)
//! - Flags (u8), copied from the batch record
//! - Data (`length` bytes)
//! - Checksum (u32 BE)
//!
//! The checksum is CRC32 (IEEE) over length, flags and data. Any mismatch is
//! corruption.

use crc32fast::Hasher;

use super::errors::{LogError, LogResult};

/// Length + flags.
pub const RECORD_HEADER_SIZE: usize = 5;

/// Trailing checksum.
pub const RECORD_TRAILER_SIZE: usize = 4;

/// Bytes a record adds around its data.
pub const RECORD_OVERHEAD: usize = RECORD_HEADER_SIZE + RECORD_TRAILER_SIZE;

fn compute_checksum(header: &[u8], data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(header);
    hasher.update(data);
    hasher.finalize()
}

/// Appends one record to `out`.
///
/// # Errors
///
/// Returns `ZPER_LOG_RECORD_TOO_LARGE` if `data` does not fit the length
/// field.
pub fn encode_into(out: &mut Vec<u8>, data: &[u8], flags: u8) -> LogResult<()> {
    let len = u32::try_from(data.len()).map_err(|_| {
        LogError::record_too_large(format!(
            "Record of {} bytes exceeds the u32 length field",
            data.len()
        ))
    })?;

    let mut header = [0u8; RECORD_HEADER_SIZE];
    header[..4].copy_from_slice(&len.to_be_bytes());
    header[4] = flags;

    out.reserve(RECORD_OVERHEAD + data.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(data);
    out.extend_from_slice(&compute_checksum(&header, data).to_be_bytes());
    Ok(())
}

/// Why a segment stopped decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFault {
    /// The segment ends inside a record
    Partial,
    /// A whole record failed its checksum
    ChecksumMismatch,
}

/// Iterator over the records of a segment buffer.
///
/// Stops at the end of the buffer or at the first fault. After iteration,
/// `fault` and `position` tell where decoding stopped and why.
pub struct Records<'a> {
    buf: &'a [u8],
    pos: usize,
    fault: Option<RecordFault>,
}

impl<'a> Records<'a> {
    /// Byte offset of the next undecoded record.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The fault that stopped decoding, if any.
    pub fn fault(&self) -> Option<RecordFault> {
        self.fault
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = &self.buf[self.pos..];
        if remaining.is_empty() || self.fault.is_some() {
            return None;
        }
        if remaining.len() < RECORD_OVERHEAD {
            self.fault = Some(RecordFault::Partial);
            return None;
        }

        let len = u32::from_be_bytes([remaining[0], remaining[1], remaining[2], remaining[3]]) as usize;
        let data_end = match len.checked_add(RECORD_OVERHEAD) {
            Some(total) if total <= remaining.len() => RECORD_HEADER_SIZE + len,
            _ => {
                self.fault = Some(RecordFault::Partial);
                return None;
            }
        };

        let header = &remaining[..RECORD_HEADER_SIZE];
        let data = &remaining[RECORD_HEADER_SIZE..data_end];
        let stored = u32::from_be_bytes([
            remaining[data_end],
            remaining[data_end + 1],
            remaining[data_end + 2],
            remaining[data_end + 3],
        ]);
        if compute_checksum(header, data) != stored {
            self.fault = Some(RecordFault::ChecksumMismatch);
            return None;
        }

        self.pos += data_end + RECORD_TRAILER_SIZE;
        Some(data)
    }
}

/// Decodes the records of one segment.
pub fn decode(buf: &[u8]) -> Records<'_> {
    Records {
        buf,
        pos: 0,
        fault: None,
    }
}
