//! Writer workers
//!
//! A writer worker owns one dealer connection, decodes the multi-frame
//! protocol one frame at a time and appends payloads to the topic log named
//! by each logical message's identity frame:
//!
//! 1. Identity frame `[reserved][ack flag][topic]`
//! 2. Optional empty delimiter
//! 3. Body: payload frames (single mode), or a 4-byte big-endian count
//!    followed by batch frames (bulk mode)
//!
//! When the sender set the ack flag and the log reports every write as
//! flushed, the worker answers `[identity][empty][echo]` where `echo` is the
//! payload (single) or the last sub-message of the batch (bulk).

mod errors;
pub mod state;
mod worker;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use errors::{WriterError, WriterResult};
pub use state::State;
pub use worker::{WorkerExit, WorkerHandle, WriterWorker};

/// How message bodies are framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Each body frame is one message
    #[default]
    Single,
    /// A count frame precedes batch frames of packed sub-messages
    Bulk,
}

impl WriteMode {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Single => "single",
            WriteMode::Bulk => "bulk",
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(WriteMode::Single),
            "bulk" => Ok(WriteMode::Bulk),
            other => Err(format!("unknown write mode '{}'", other)),
        }
    }
}
