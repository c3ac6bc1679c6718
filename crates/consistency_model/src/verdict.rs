use crate::{Event, ProcessId};

/// The outcome of a [`LinearizabilityTester::solve`](crate::LinearizabilityTester::solve) run.
///
/// Only [`Verdict::Success`] and [`Verdict::Failure`] are conclusive. The other two variants mean
/// the search stopped before reaching a verdict and say nothing about the history.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[non_exhaustive]
pub enum Verdict<Ret> {
    /// A linearization exists (and was found).
    Success,
    /// No linearization exists.
    Failure(Diagnostics<Ret>),
    /// Cancellation was requested.
    Interrupted,
    /// The step budget ran out.
    OutOfSteam,
}

impl<Ret> Verdict<Ret> {
    pub fn is_linearizable(&self) -> bool {
        matches!(self, Verdict::Success)
    }

    pub fn is_conclusive(&self) -> bool {
        matches!(self, Verdict::Success | Verdict::Failure(_))
    }

    pub fn diagnostics(&self) -> Option<&Diagnostics<Ret>> {
        match self {
            Verdict::Failure(diagnostics) => Some(diagnostics),
            _ => None,
        }
    }
}

/// Best-effort explanation of a [`Verdict::Failure`].
///
/// `furthest` is the deepest history position any branch of the search reached. It is not
/// necessarily a minimal counterexample.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Diagnostics<Ret> {
    pub furthest: usize,
    pub processes: Vec<ProcessDiagnostics<Ret>>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ProcessDiagnostics<Ret> {
    /// Furthest history position at which this process was considered.
    pub furthest: Option<usize>,
    /// Distinct results the reference object produced for this process's operation when firing
    /// it failed at `furthest`. The observed result was not among them.
    pub rejected: Vec<Ret>,
}

impl<Ret> Default for ProcessDiagnostics<Ret> {
    fn default() -> Self {
        ProcessDiagnostics {
            furthest: None,
            rejected: Vec::new(),
        }
    }
}

impl<Ret> Diagnostics<Ret> {
    pub(crate) fn new(process_count: usize) -> Self {
        Diagnostics {
            furthest: 0,
            processes: (0..process_count)
                .map(|_| ProcessDiagnostics::default())
                .collect(),
        }
    }

    pub(crate) fn reached(&mut self, process: ProcessId, i: usize) {
        if i > self.furthest {
            self.furthest = i;
        }
        let p = &mut self.processes[process];
        if p.furthest.map_or(true, |furthest| i > furthest) {
            p.furthest = Some(i);
            p.rejected.clear();
        }
    }

    pub(crate) fn rejected(&mut self, process: ProcessId, i: usize, ret: Ret)
    where
        Ret: PartialEq,
    {
        self.reached(process, i);
        let p = &mut self.processes[process];
        if p.furthest == Some(i) && !p.rejected.contains(&ret) {
            p.rejected.push(ret);
        }
    }

    pub fn process(&self, process: ProcessId) -> Option<&ProcessDiagnostics<Ret>> {
        self.processes.get(usize::from(process))
    }

    /// The history prefix through the furthest position reached.
    pub fn prefix<'h, Op>(&self, events: &'h [Event<Op, Ret>]) -> &'h [Event<Op, Ret>] {
        let end = (self.furthest + 1).min(events.len());
        &events[..end]
    }
}
