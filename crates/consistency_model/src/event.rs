use {
    crate::{HistoryError, ProcessId},
    std::fmt::{Debug, Display, Formatter},
};

/// A point in a history consumed by the [`LinearizabilityTester`](crate::LinearizabilityTester).
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Event<Op, Ret> {
    /// A process started an operation. `op` is how the operation reads against the reference
    /// object, and `expected` is the result the process later observed (`None` if unknown or
    /// not expressible as a reference return value, in which case the operation can never be
    /// linearized).
    Invoke {
        process: ProcessId,
        label: String,
        op: Op,
        expected: Option<Ret>,
    },
    /// The process's outstanding operation returned. `result` is `None` when the observation
    /// has no reference counterpart, such as a failed call.
    Return {
        process: ProcessId,
        result: Option<Ret>,
    },
}

impl<Op, Ret> Event<Op, Ret> {
    pub fn process(&self) -> ProcessId {
        match self {
            Event::Invoke { process, .. } | Event::Return { process, .. } => *process,
        }
    }

    pub fn is_invoke(&self) -> bool {
        matches!(self, Event::Invoke { .. })
    }
}

impl<Op, Ret> Display for Event<Op, Ret>
where
    Ret: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Invoke { process, label, .. } => write!(f, "{process} invokes {label}"),
            Event::Return {
                process,
                result: Some(result),
            } => write!(f, "{process} returns {result:?}"),
            Event::Return { process, .. } => write!(f, "{process} returns an unrecognized result"),
        }
    }
}

/// Builds a well-formed history one invocation or return at a time.
///
/// The expected result of each invocation is filled in when the matching return arrives.
#[derive(Clone, Debug)]
pub struct History<Op, Ret> {
    events: Vec<Event<Op, Ret>>,
    outstanding: Vec<Option<usize>>,
}

impl<Op, Ret> Default for History<Op, Ret> {
    fn default() -> Self {
        History {
            events: Vec::new(),
            outstanding: Vec::new(),
        }
    }
}

impl<Op, Ret> History<Op, Ret> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event<Op, Ret>] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event<Op, Ret>> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn on_invoke(
        &mut self,
        process: ProcessId,
        label: impl Into<String>,
        op: Op,
    ) -> Result<&mut Self, HistoryError> {
        let i = usize::from(process);
        if i >= self.outstanding.len() {
            self.outstanding.resize(i + 1, None);
        }
        let label = label.into();
        if self.outstanding[i].is_some() {
            return Err(HistoryError::AlreadyPending { process, label });
        }
        self.outstanding[i] = Some(self.events.len());
        self.events.push(Event::Invoke {
            process,
            label,
            op,
            expected: None,
        });
        Ok(self)
    }

    pub fn on_return(&mut self, process: ProcessId, result: Ret) -> Result<&mut Self, HistoryError>
    where
        Ret: Clone,
    {
        let invocation = self
            .outstanding
            .get_mut(usize::from(process))
            .and_then(Option::take)
            .ok_or(HistoryError::NothingPending { process })?;
        if let Event::Invoke { expected, .. } = &mut self.events[invocation] {
            *expected = Some(result.clone());
        }
        self.events.push(Event::Return {
            process,
            result: Some(result),
        });
        Ok(self)
    }

    /// A helper that records both an operation and its return for a process.
    pub fn on_invret(
        &mut self,
        process: ProcessId,
        label: impl Into<String>,
        op: Op,
        result: Ret,
    ) -> Result<&mut Self, HistoryError>
    where
        Ret: Clone,
    {
        self.on_invoke(process, label, op)?.on_return(process, result)
    }
}
