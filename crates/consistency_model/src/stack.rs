use crate::{EmptyUndoLog, SequentialSpec};

/// A LIFO stack backed by a [`Vec`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Stack<T> {
    items: Vec<T>,
    undo_log: Vec<Inverse<T>>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StackOp<T> {
    Push(T),
    Pop,
    Len,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StackRet<T> {
    PushOk,
    PopOk(Option<T>),
    LenOk(usize),
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Inverse<T> {
    Pop,
    Push(T),
    Nothing,
}

impl<T> Default for Stack<T> {
    fn default() -> Self {
        Stack {
            items: Vec::new(),
            undo_log: Vec::new(),
        }
    }
}

impl<T> Stack<T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }
}

impl<T: Clone + PartialEq> SequentialSpec for Stack<T> {
    type Op = StackOp<T>;
    type Ret = StackRet<T>;

    fn apply(&mut self, op: &Self::Op) -> Self::Ret {
        match op {
            StackOp::Push(item) => {
                self.items.push(item.clone());
                self.undo_log.push(Inverse::Pop);
                StackRet::PushOk
            }
            StackOp::Pop => {
                let popped = self.items.pop();
                self.undo_log.push(match &popped {
                    Some(item) => Inverse::Push(item.clone()),
                    None => Inverse::Nothing,
                });
                StackRet::PopOk(popped)
            }
            StackOp::Len => {
                self.undo_log.push(Inverse::Nothing);
                StackRet::LenOk(self.items.len())
            }
        }
    }

    fn undo(&mut self) -> Result<(), EmptyUndoLog> {
        match self.undo_log.pop().ok_or(EmptyUndoLog)? {
            Inverse::Pop => {
                self.items.pop();
            }
            Inverse::Push(item) => self.items.push(item),
            Inverse::Nothing => {}
        }
        Ok(())
    }
}
