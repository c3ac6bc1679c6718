//! This module specifies the core history types for the [lincheck](https://docs.rs/lincheck/)
//! library: the values exchanged with a subject under test, the calls made against it, and
//! the raw records captured while those calls run concurrently.
//!
//! # Usage
//!
//! Please see [the `lincheck_verifier` docs](https://docs.rs/lincheck_verifier/).
//!
//! # Features
//!
//! - `serde`: Implement `Serialize` and `Deserialize` where applicable.

#![cfg_attr(all(doc, CHANNEL_NIGHTLY), feature(doc_auto_cfg))]
#![deny(unused_must_use)]
#![warn(rust_2018_idioms, unreachable_pub)]

mod call;
mod id;
mod value;

use std::fmt::{Display, Formatter};

pub use call::{Operation, OperationCall};
pub use id::{CallId, ProcessId};
pub use value::Value;

/// One entry of a captured history.
///
/// `seq` is assigned from a counter shared by every process, so records are totally ordered
/// even though that order is only advisory for the linearizability search.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RawRecord {
    pub seq: u64,
    pub process: ProcessId,
    pub call: CallId,
    pub kind: RawKind,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[non_exhaustive]
pub enum RawKind {
    Invoke(OperationCall),
    Return(Value),
}

impl RawRecord {
    pub fn invoke(seq: u64, call: CallId, op: OperationCall) -> Self {
        RawRecord {
            seq,
            process: call.process,
            call,
            kind: RawKind::Invoke(op),
        }
    }

    pub fn ret(seq: u64, call: CallId, value: Value) -> Self {
        RawRecord {
            seq,
            process: call.process,
            call,
            kind: RawKind::Return(value),
        }
    }

    pub fn is_invocation(&self) -> bool {
        matches!(self.kind, RawKind::Invoke(_))
    }
}

impl Display for RawRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            RawKind::Invoke(op) => write!(f, "[{}] {} invokes {}", self.seq, self.call, op),
            RawKind::Return(value) => write!(f, "[{}] {} returns {}", self.seq, self.call, value),
        }
    }
}
