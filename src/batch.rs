//! Bulk batch encoding
//!
//! A batch packs several sub-messages into one buffer. Each sub-message is
//! encoded as:
//!
//! - Length (u32 BE)
//! - Flags (u8), bit 0 = MORE
//! - Data (`length` bytes)
//!
//! A batch is only trusted once [`validate`] has checked it against the
//! count frame that announced it.

use thiserror::Error;

/// Size of the per-record header (length + flags).
pub const RECORD_HEADER_SIZE: usize = 5;

/// Record flag bits.
pub mod flags {
    /// More parts of the same sub-message follow.
    pub const MORE: u8 = 0b0000_0001;
}

/// Reasons a batch is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("batch truncated at byte {offset}")]
    Truncated { offset: usize },

    #[error("batch holds {actual} sub-messages, count frame announced {expected}")]
    CountMismatch { expected: u32, actual: u64 },

    #[error("sub-message of {len} bytes does not fit a u32 length")]
    TooLarge { len: usize },
}

/// Lazy iterator over the sub-messages of an encoded batch.
///
/// Iteration stops at the end of the buffer or at the first truncated
/// record. `is_truncated` reports whether trailing bytes were left over.
/// Decoding is restartable: calling [`decode`] again on the same buffer
/// yields the same sequence.
#[derive(Debug, Clone)]
pub struct SubMessages<'a> {
    buf: &'a [u8],
    pos: usize,
    truncated: bool,
}

impl<'a> SubMessages<'a> {
    /// Byte offset of the next undecoded record.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether decoding stopped on an incomplete record.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Decodes the next record along with its flags.
    pub fn next_record(&mut self) -> Option<(u8, &'a [u8])> {
        let remaining = &self.buf[self.pos..];
        if remaining.is_empty() || self.truncated {
            return None;
        }
        if remaining.len() < RECORD_HEADER_SIZE {
            self.truncated = true;
            return None;
        }

        let len = u32::from_be_bytes([remaining[0], remaining[1], remaining[2], remaining[3]]) as usize;
        let end = match RECORD_HEADER_SIZE.checked_add(len) {
            Some(end) if end <= remaining.len() => end,
            _ => {
                self.truncated = true;
                return None;
            }
        };

        self.pos += end;
        Some((remaining[4], &remaining[RECORD_HEADER_SIZE..end]))
    }
}

impl<'a> Iterator for SubMessages<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().map(|(_, data)| data)
    }
}

/// Decodes an encoded batch into its sub-messages.
pub fn decode(buf: &[u8]) -> SubMessages<'_> {
    SubMessages {
        buf,
        pos: 0,
        truncated: false,
    }
}

/// Returns the final sub-message of a batch, if any.
pub fn last(buf: &[u8]) -> Option<&[u8]> {
    decode(buf).last()
}

/// Checks that `buf` is exactly `count` whole records.
///
/// Returns the number of records on success.
pub fn validate(buf: &[u8], count: u32) -> Result<u32, BatchError> {
    let mut records = decode(buf);
    let actual = records.by_ref().count() as u64;

    if records.is_truncated() {
        return Err(BatchError::Truncated {
            offset: records.position(),
        });
    }
    if actual != u64::from(count) {
        return Err(BatchError::CountMismatch {
            expected: count,
            actual,
        });
    }
    Ok(count)
}

fn record_length(len: usize) -> Result<u32, BatchError> {
    u32::try_from(len).map_err(|_| BatchError::TooLarge { len })
}

/// Appends one encoded record to `out`.
pub fn encode_into(out: &mut Vec<u8>, data: &[u8], flags: u8) -> Result<(), BatchError> {
    let len = record_length(data.len())?;
    out.reserve(RECORD_HEADER_SIZE + data.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.push(flags);
    out.extend_from_slice(data);
    Ok(())
}

/// Encodes a sequence of sub-messages as one batch buffer.
pub fn encode<I, T>(messages: I) -> Result<Vec<u8>, BatchError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut out = Vec::new();
    for message in messages {
        encode_into(&mut out, message.as_ref(), 0)?;
    }
    Ok(out)
}
