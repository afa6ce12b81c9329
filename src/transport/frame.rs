//! Message frames.
//!
//! A frame is one unit of I/O. A logical message is a run of frames where
//! every frame but the last has `more` set.

use bytes::Bytes;

/// One frame of a multi-frame message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Bytes,
    more: bool,
}

impl Frame {
    /// Create a frame.
    pub fn new(data: impl Into<Bytes>, more: bool) -> Self {
        Self {
            data: data.into(),
            more,
        }
    }

    /// A frame followed by more frames of the same message.
    pub fn more(data: impl Into<Bytes>) -> Self {
        Self::new(data, true)
    }

    /// The final frame of a message.
    pub fn last(data: impl Into<Bytes>) -> Self {
        Self::new(data, false)
    }

    /// The zero-length delimiter between envelope and body.
    pub fn delimiter() -> Self {
        Self::new(Bytes::new(), true)
    }

    /// Frame bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Frame bytes as a cheap clone.
    #[inline]
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Consumes the frame, returning its bytes.
    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Whether more frames of the same message follow.
    #[inline]
    pub fn has_more(&self) -> bool {
        self.more
    }

    /// Frame length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the frame carries no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether this is a delimiter: empty with more frames following.
    pub fn is_delimiter(&self) -> bool {
        self.is_empty() && self.more
    }
}

/// Turns message parts into frames, setting `more` on all but the last.
pub fn multipart(parts: Vec<Bytes>) -> Vec<Frame> {
    let last = parts.len().saturating_sub(1);
    parts
        .into_iter()
        .enumerate()
        .map(|(i, data)| Frame::new(data, i < last))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimiter() {
        assert!(Frame::delimiter().is_delimiter());
        assert!(!Frame::last(Bytes::new()).is_delimiter());
        assert!(!Frame::more("x").is_delimiter());
    }

    #[test]
    fn test_multipart_sets_more_flags() {
        let frames = multipart(vec![
            Bytes::from_static(b"a"),
            Bytes::new(),
            Bytes::from_static(b"c"),
        ]);
        let flags: Vec<bool> = frames.iter().map(Frame::has_more).collect();
        assert_eq!(flags, vec![true, true, false]);
    }

    #[test]
    fn test_multipart_empty() {
        assert!(multipart(Vec::new()).is_empty());
    }
}
