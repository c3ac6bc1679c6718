use {
    crate::{EmptyUndoLog, SequentialSpec},
    std::collections::VecDeque,
};

/// An unbounded FIFO queue.
///
/// ```
/// use consistency_model::*;
///
/// let mut q = Queue::default();
/// assert_eq!(q.apply(&QueueOp::Enqueue('a')), QueueRet::EnqueueOk);
/// assert_eq!(q.apply(&QueueOp::Dequeue), QueueRet::DequeueOk(Some('a')));
/// q.undo().unwrap();
/// assert_eq!(q.apply(&QueueOp::Dequeue), QueueRet::DequeueOk(Some('a')));
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Queue<T> {
    items: VecDeque<T>,
    undo_log: Vec<Inverse<T>>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum QueueOp<T> {
    Enqueue(T),
    Dequeue,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum QueueRet<T> {
    EnqueueOk,
    DequeueOk(Option<T>),
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Inverse<T> {
    PopBack,
    PushFront(T),
    Nothing,
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Queue {
            items: VecDeque::new(),
            undo_log: Vec::new(),
        }
    }
}

impl<T> Queue<T> {
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> FromIterator<T> for Queue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Queue {
            items: iter.into_iter().collect(),
            undo_log: Vec::new(),
        }
    }
}

impl<T: Clone + PartialEq> SequentialSpec for Queue<T> {
    type Op = QueueOp<T>;
    type Ret = QueueRet<T>;

    fn apply(&mut self, op: &Self::Op) -> Self::Ret {
        match op {
            QueueOp::Enqueue(item) => {
                self.items.push_back(item.clone());
                self.undo_log.push(Inverse::PopBack);
                QueueRet::EnqueueOk
            }
            QueueOp::Dequeue => match self.items.pop_front() {
                Some(item) => {
                    self.undo_log.push(Inverse::PushFront(item.clone()));
                    QueueRet::DequeueOk(Some(item))
                }
                None => {
                    // Logged anyway so every apply has exactly one inverse.
                    self.undo_log.push(Inverse::Nothing);
                    QueueRet::DequeueOk(None)
                }
            },
        }
    }

    fn undo(&mut self) -> Result<(), EmptyUndoLog> {
        match self.undo_log.pop().ok_or(EmptyUndoLog)? {
            Inverse::PopBack => {
                self.items.pop_back();
            }
            Inverse::PushFront(item) => self.items.push_front(item),
            Inverse::Nothing => {}
        }
        Ok(())
    }
}
