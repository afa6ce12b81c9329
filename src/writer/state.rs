//! Framing automaton
//!
//! One inbound frame is fed to [`step`] with the current state. The result is
//! either a [`Edge::Consume`] (the frame is used up by an [`Action`]) or a
//! [`Edge::Reinterpret`], which hands the same frame to the next state
//! without reading another one:
//!
//! ```text
//! START --identity--> TOPIC --delimiter--> COUNT --count--> MESSAGE (bulk)
//!                       |                    |
//!                       +--(reinterpret)---->+--(reinterpret)--> SINGLE
//! ```
//!
//! After a consumed frame without `more`, the worker returns to START.

use std::fmt;

use crate::envelope::{parse_identity, Identity};
use crate::transport::Frame;

use super::WriteMode;

/// Size of the count frame prefix read in bulk mode.
pub const COUNT_SIZE: usize = 4;

/// Position within a logical message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Expecting an identity frame
    #[default]
    Start,
    /// Expecting the optional empty delimiter
    Topic,
    /// Expecting the batch count (bulk) or the first payload (single)
    Count,
    /// Every frame is one payload
    Single,
    /// Every frame is one batch
    Message,
}

impl State {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Start => "START",
            State::Topic => "TOPIC",
            State::Count => "COUNT",
            State::Single => "SINGLE",
            State::Message => "MESSAGE",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What to do with a consumed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open a logical message for this sender and topic
    Open(Identity),
    /// Delimiter seen
    Delimiter,
    /// Bulk count announced
    Count(u32),
    /// Append the frame as one message
    Append,
    /// Append the frame as a batch of the announced count
    AppendBulk,
    /// Discard the frame
    Drop(&'static str),
}

/// Outcome of feeding one frame to one state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edge {
    /// The frame is used by `action`; continue in `next` if more frames follow
    Consume { action: Action, next: State },
    /// Feed the same frame to `next`
    Reinterpret(State),
}

/// Computes the edge taken by `frame` in `state`.
pub fn step(state: State, mode: WriteMode, frame: &Frame) -> Edge {
    match state {
        State::Start => match parse_identity(frame.data()) {
            Some(identity) => Edge::Consume {
                action: Action::Open(identity),
                next: State::Topic,
            },
            None => Edge::Consume {
                action: Action::Drop("malformed identity frame"),
                next: State::Start,
            },
        },
        State::Topic => {
            if frame.is_empty() && frame.has_more() {
                Edge::Consume {
                    action: Action::Delimiter,
                    next: State::Count,
                }
            } else {
                Edge::Reinterpret(State::Count)
            }
        }
        State::Count => match mode {
            WriteMode::Single => Edge::Reinterpret(State::Single),
            WriteMode::Bulk => match read_count(frame.data()) {
                Some(count) => Edge::Consume {
                    action: Action::Count(count),
                    next: State::Message,
                },
                None => Edge::Consume {
                    action: Action::Drop("count frame shorter than 4 bytes"),
                    next: State::Start,
                },
            },
        },
        State::Single => Edge::Consume {
            action: Action::Append,
            next: State::Single,
        },
        State::Message => Edge::Consume {
            action: Action::AppendBulk,
            next: State::Message,
        },
    }
}

/// Follows reinterpret edges until the frame is consumed.
pub fn resolve(mut state: State, mode: WriteMode, frame: &Frame) -> (State, Action, State) {
    loop {
        match step(state, mode, frame) {
            Edge::Reinterpret(next) => state = next,
            Edge::Consume { action, next } => return (state, action, next),
        }
    }
}

fn read_count(data: &[u8]) -> Option<u32> {
    let prefix: [u8; COUNT_SIZE] = data.get(..COUNT_SIZE)?.try_into().ok()?;
    Some(u32::from_be_bytes(prefix))
}
