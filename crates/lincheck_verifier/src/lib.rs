//! Lincheck Verifier checks whether a concurrent object behaves like a sequential one.
//!
//! A [`Harness`] calls the object from several threads and records every invocation and return.
//! A [`HistoryAdapter`] translates that record into the vocabulary of a reference object (a
//! [`SequentialSpec`] such as [`Queue`]), and a [`LinearizabilityTester`] searches for an order
//! of the calls that is consistent both with real time and with the reference object.
//!
//! # Example
//!
//! ```toml
//! [dev-dependencies]
//! lincheck_verifier = "0"
//! ```
//!
//! ```rust
//! use lincheck_verifier::*;
//! use std::sync::Mutex;
//!
//! // Stores into one of two slots and reads the other one. Not a register!
//! #[derive(Default)]
//! struct TornRegister(Mutex<[Value; 2]>);
//!
//! impl OperationInvoker for TornRegister {
//!     fn operations(&self) -> Vec<Operation> {
//!         vec![Operation::new("write", 1), Operation::new("read", 0)]
//!     }
//!
//!     fn apply(&self, call: &OperationCall) -> Result<Value, InvocationFailure> {
//!         let mut slots = self.0.lock().map_err(|e| InvocationFailure::new(e.to_string()))?;
//!         match (call.name(), call.arg(0)) {
//!             ("write", Some(v)) => {
//!                 slots[0] = v.clone();
//!                 Ok(Value::Null)
//!             }
//!             ("read", _) => Ok(slots[1].clone()),
//!             _ => Err(InvocationFailure::new("unsupported")),
//!         }
//!     }
//! }
//!
//! let report = Verification::new(TornRegister::default(), RegisterVocabulary, || {
//!     Register::new(Value::Null)
//! })
//! .processes(1)
//! .operations(2)
//! .run(Workload::Scripted(vec![
//!     OperationCall::named("write", [Value::from(1)]),
//!     OperationCall::named("read", []),
//! ]))
//! .unwrap();
//!
//! // The read should have observed the write.
//! let diagnostics = report.assert_not_linearizable();
//! assert_eq!(diagnostics.furthest, 3);
//! ```
//!
//! # Debugging
//!
//! Set `LINCHECK_DEBUG` to print every searched history, and enable `trace` logging for the
//! `lincheck::events` target to see events as they are recorded.

#![deny(unused_must_use)]
#![warn(rust_2018_idioms, unreachable_pub)]

mod adapter;
mod verification;

pub use adapter::{
    Adapted, HistoryAdapter, MalformedHistory, QueueVocabulary, RegisterVocabulary,
    StackVocabulary, Vocabulary,
};
pub use consistency_model::{
    Diagnostics, Event, LinearizabilityTester, ProcessDiagnostics, Queue, QueueOp, QueueRet,
    Register, RegisterOp, RegisterRet, SearchError, SequentialSpec, Stack, StackOp, StackRet,
    Verdict,
};
pub use lincheck::{
    Capture, Harness, HarnessConfig, HarnessError, InvocationFailure, Operation, OperationCall,
    OperationInvoker, ProcessId, RawRecord, RecorderKind, Value, Workload,
};
pub use verification::{check_records, Report, Stats, VerifyError, Verification};
