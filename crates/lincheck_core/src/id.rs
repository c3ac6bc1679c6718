use {
    core::fmt::{Debug, Display, Formatter},
    std::ops::{Index, IndexMut},
};

/// Identifies a single-threaded caller in a history.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ProcessId(usize);

impl Debug for ProcessId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        Display::fmt(self, f)
    }
}

impl Display for ProcessId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str("P")?;
        Display::fmt(&self.0, f)
    }
}

impl From<ProcessId> for usize {
    fn from(id: ProcessId) -> Self {
        id.0
    }
}

impl From<usize> for ProcessId {
    fn from(n: usize) -> Self {
        ProcessId(n)
    }
}

impl<T> Index<ProcessId> for [T] {
    type Output = T;
    fn index(&self, id: ProcessId) -> &Self::Output {
        self.index(usize::from(id))
    }
}

impl<T> IndexMut<ProcessId> for [T] {
    fn index_mut(&mut self, id: ProcessId) -> &mut Self::Output {
        self.index_mut(usize::from(id))
    }
}

impl<T> Index<ProcessId> for Vec<T> {
    type Output = T;
    fn index(&self, id: ProcessId) -> &Self::Output {
        self.index(usize::from(id))
    }
}

impl<T> IndexMut<ProcessId> for Vec<T> {
    fn index_mut(&mut self, id: ProcessId) -> &mut Self::Output {
        self.index_mut(usize::from(id))
    }
}

/// Pairs an invocation with its return. Assigned when the invocation is recorded, so the pair
/// stays unambiguous after records from different processes are merged.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CallId {
    pub process: ProcessId,
    pub index: u32,
}

impl CallId {
    pub fn new(process: ProcessId, index: u32) -> Self {
        CallId { process, index }
    }
}

impl Debug for CallId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        Display::fmt(self, f)
    }
}

impl Display for CallId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}#{}", self.process, self.index)
    }
}
