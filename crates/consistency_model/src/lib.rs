//! This library provides code to define and verify the correctness of
//! an object or system based on how it responds to a collection of potentially
//! concurrent (i.e. partially ordered) operations.
//!
//! # Defining Correctness Via A Reference Implementation
//!
//! [`SequentialSpec`] is a trait for defining correctness via a "reference implementation"
//! (e.g.  "*this system should behave like a queue*").  This library includes reusable
//! implementations such as [`Queue`] for FIFO semantics, [`Stack`] for LIFO semantics, and
//! [`Register`] for register-like semantics.  Implementing the trait yourself is also
//! straightforward -- define two `enum`s for invocations and returns, associate them (as
//! [`SequentialSpec::Op`] and [`SequentialSpec::Ret`] respectively) with a state type, and keep
//! an undo log so that [`SequentialSpec::undo`] can reverse the latest
//! [`SequentialSpec::apply`].
//!
//! # Verifying Concurrent System Implementations
//!
//! A recorded history of [`Event`]s can be checked against an implementation of the
//! [`SequentialSpec`] trait with a [`LinearizabilityTester`]. Operations are sequential (think
//! blocking I/O) with respect to an abstract caller identified by a process ID, so each process
//! alternates between invoking an operation and observing its return.
//!
//! The tester searches for a linearization by trying operations against the reference object
//! and undoing them when a branch fails, so the reference object is never cloned during the
//! search.
//!
//! ```
//! use consistency_model::*;
//!
//! let mut history = History::new();
//! history
//!     .on_invoke(0.into(), "enqueue(1)", QueueOp::Enqueue(1)).unwrap()
//!     .on_invoke(1.into(), "dequeue()", QueueOp::Dequeue).unwrap()
//!     .on_return(1.into(), QueueRet::DequeueOk(Some(1))).unwrap()
//!     .on_return(0.into(), QueueRet::EnqueueOk).unwrap();
//!
//! let mut tester = LinearizabilityTester::new(Queue::default());
//! assert!(tester.solve(history.events()).unwrap().is_linearizable());
//! ```
//!
//! # Additional Reading
//!
//! - ["Linearizability: A Correctness Condition for Concurrent
//!   Objects"](https://doi.org/10.1145/78969.78972) by Herlihy and Wing
//! - ["Testing for Linearizability"](https://doi.org/10.1002/cpe.3928) by Lowe, whose
//!   just-in-time linearization tree search this tester follows
//! - ["Consistency in Non-Transactional Distributed Storage
//!   Systems"](http://vukolic.com/consistency-survey.pdf) by Viotti and Vukolić

#![deny(unused_must_use)]
#![warn(rust_2018_idioms, unreachable_pub)]

mod error;
mod event;
mod linearizability;
mod queue;
mod register;
mod stack;
mod verdict;

pub use error::{EmptyUndoLog, HistoryError, SearchError};
pub use event::{Event, History};
pub use lincheck_core::ProcessId;
pub use linearizability::LinearizabilityTester;
pub use queue::{Queue, QueueOp, QueueRet};
pub use register::{Register, RegisterOp, RegisterRet};
pub use stack::{Stack, StackOp, StackRet};
pub use verdict::{Diagnostics, ProcessDiagnostics, Verdict};

/// An implementation of this trait can serve as a sequential "reference object"
/// (in the sense of an operational specification, not a Rust reference)
/// against which to validate the [operational semantics] of a more complex
/// system, such as a concurrent data structure.
///
/// Every [`apply`](Self::apply) must be reversible: the implementation records an inverse action
/// so that [`undo`](Self::undo) restores the exact prior state. Undo is LIFO.
///
/// [operational semantics]: https://en.wikipedia.org/wiki/Operational_semantics
pub trait SequentialSpec: Sized {
    /// The type of operators. Often an enum.
    type Op;

    /// The type of values return by the operators. Often an enum or
    /// [`Option`].
    type Ret: PartialEq;

    /// Applies an operation to this reference object, remembering how to reverse it.
    fn apply(&mut self, op: &Self::Op) -> Self::Ret;

    /// Reverses the most recent [`apply`](Self::apply) that has not been undone yet.
    fn undo(&mut self) -> Result<(), EmptyUndoLog>;

    /// Indicates whether applying a specified operation results in a specified return value.
    /// The operation stays applied either way.
    fn is_valid_step(&mut self, op: &Self::Op, ret: &Self::Ret) -> bool {
        &self.apply(op) == ret
    }

    /// Indicates whether a sequential history of operations and corresponding
    /// return values is valid for this reference object.
    fn is_valid_history(&mut self, ops: impl IntoIterator<Item = (Self::Op, Self::Ret)>) -> bool {
        ops.into_iter()
            .all(|(op, ret)| self.is_valid_step(&op, &ret))
    }
}
