//! Lincheck runs operations against a concurrent object from many threads at once and records
//! what every caller observed, producing a history that can then be checked for
//! linearizability.
//!
//! The pieces are:
//!
//! - an [`OperationInvoker`] that lets the [`Harness`] call the object under test by name,
//! - a [`Recorder`] that stamps each invocation and return with a global sequence number,
//! - the [`Harness`] itself, which partitions a [`Workload`] among processes, runs them in
//!   parallel, and returns a [`Capture`].
//!
//! # Usage
//!
//! Please see [the `lincheck_verifier` docs](https://docs.rs/lincheck_verifier/) for checking a
//! [`Capture`] against a sequential specification.
//!
//! # Features
//!
//! - `serde`: Implement `Serialize` and `Deserialize` for [`HarnessConfig`] and [`RecorderKind`].

#![cfg_attr(all(doc, CHANNEL_NIGHTLY), feature(doc_auto_cfg))]
#![deny(unused_must_use)]
#![warn(rust_2018_idioms, unreachable_pub)]

mod harness;
mod invoker;
mod recorder;

pub use harness::{Capture, Harness, HarnessConfig, HarnessError, Workload};
pub use invoker::{InvocationFailure, OperationInvoker, ARGUMENT_RANGE};
pub use lincheck_core::{CallId, Operation, OperationCall, ProcessId, RawKind, RawRecord, Value};
pub use recorder::{PerProcessRecorder, Recorder, RecorderKind, SharedRecorder};
