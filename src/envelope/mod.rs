//! Routing envelope codec
//!
//! The first frame of every logical message is the identity frame:
//!
//! - Reserved (u8)
//! - Ack flag (u8), non-zero = sender wants a durability acknowledgment
//! - Topic name (UTF-8, remaining bytes)
//!
//! Acknowledgments echo the identity frame back, followed by an empty
//! delimiter and the acknowledged bytes.

mod ack;
mod identity;

pub use ack::AckEnvelope;
pub use identity::{build_identity, is_valid_topic, parse_identity, Identity, IDENTITY_HEADER_SIZE};
