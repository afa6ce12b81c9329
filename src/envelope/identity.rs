//! Identity frame parsing

use bytes::{BufMut, Bytes, BytesMut};

/// Bytes preceding the topic name (reserved + ack flag).
pub const IDENTITY_HEADER_SIZE: usize = 2;

/// Decoded identity frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Sender asked for a durability acknowledgment
    pub ack: bool,
    /// Destination topic
    pub topic: String,
}

/// Parses an identity frame.
///
/// Returns `None` when the frame is too short to carry a topic, when the
/// topic is not UTF-8, or when it cannot name a log directory.
pub fn parse_identity(frame: &[u8]) -> Option<Identity> {
    if frame.len() <= IDENTITY_HEADER_SIZE {
        return None;
    }

    let topic = std::str::from_utf8(&frame[IDENTITY_HEADER_SIZE..]).ok()?;
    if !is_valid_topic(topic) {
        return None;
    }

    Some(Identity {
        ack: frame[1] != 0,
        topic: topic.to_string(),
    })
}

/// Whether `topic` can be used as a log directory name.
pub fn is_valid_topic(topic: &str) -> bool {
    !topic.is_empty()
        && topic != "."
        && topic != ".."
        && !topic.contains(['/', '\\', '\0'])
}

/// Builds an identity frame for `topic`.
pub fn build_identity(ack: bool, topic: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(IDENTITY_HEADER_SIZE + topic.len());
    buf.put_u8(0);
    buf.put_u8(u8::from(ack));
    buf.put_slice(topic.as_bytes());
    buf.freeze()
}
