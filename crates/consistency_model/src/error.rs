use {crate::ProcessId, thiserror::Error};

/// Returned by [`SequentialSpec::undo`](crate::SequentialSpec::undo) when no applied operation
/// remains to be reversed.
#[derive(Clone, Copy, Debug, Default, Eq, Error, PartialEq)]
#[error("undo called with an empty undo log")]
pub struct EmptyUndoLog;

/// Raised while building a [`History`](crate::History) by hand.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum HistoryError {
    #[error("{process} invoked {label} while an earlier operation was still outstanding")]
    AlreadyPending { process: ProcessId, label: String },

    #[error("{process} returned without an outstanding invocation")]
    NothingPending { process: ProcessId },
}

/// A fatal condition raised by the linearizability search.
///
/// These never describe the checked subject. They indicate a malformed history or a reference
/// object whose undo log disagrees with the search, and the run cannot continue.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SearchError {
    #[error("reference object undo failed at event {index}")]
    EmptyUndoLog {
        index: usize,
        #[source]
        source: EmptyUndoLog,
    },

    #[error("event {index}: {process} invoked an operation while another was outstanding")]
    AlreadyPending { index: usize, process: ProcessId },

    #[error("event {index}: {process} returned without an outstanding invocation")]
    ReturnWithoutInvocation { index: usize, process: ProcessId },
}
