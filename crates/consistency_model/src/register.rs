use crate::{EmptyUndoLog, SequentialSpec};

/// A simple register used to define reference operational semantics via
/// [`SequentialSpec`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Register<T> {
    value: T,
    // `None` marks a read, which leaves nothing to restore.
    undo_log: Vec<Option<T>>,
}

/// An operation that can be invoked upon a [`Register`], resulting in a
/// [`RegisterRet`]
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RegisterOp<T> {
    Write(T),
    Read,
}

/// A return value for a [`RegisterOp`] invoked upon a [`Register`].
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RegisterRet<T> {
    WriteOk,
    ReadOk(T),
}

impl<T> Register<T> {
    pub fn new(value: T) -> Self {
        Register {
            value,
            undo_log: Vec::new(),
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T: Clone + PartialEq> SequentialSpec for Register<T> {
    type Op = RegisterOp<T>;
    type Ret = RegisterRet<T>;

    fn apply(&mut self, op: &Self::Op) -> Self::Ret {
        match op {
            RegisterOp::Write(v) => {
                let old = std::mem::replace(&mut self.value, v.clone());
                self.undo_log.push(Some(old));
                RegisterRet::WriteOk
            }
            RegisterOp::Read => {
                self.undo_log.push(None);
                RegisterRet::ReadOk(self.value.clone())
            }
        }
    }

    fn undo(&mut self) -> Result<(), EmptyUndoLog> {
        if let Some(old) = self.undo_log.pop().ok_or(EmptyUndoLog)? {
            self.value = old;
        }
        Ok(())
    }

    fn is_valid_step(&mut self, op: &Self::Op, ret: &Self::Ret) -> bool {
        // Override to avoid unnecessary `clone` on `Read`.
        match (op, ret) {
            (RegisterOp::Write(v), RegisterRet::WriteOk) => {
                let old = std::mem::replace(&mut self.value, v.clone());
                self.undo_log.push(Some(old));
                true
            }
            (RegisterOp::Read, RegisterRet::ReadOk(v)) => {
                self.undo_log.push(None);
                &self.value == v
            }
            (op, ret) => &self.apply(op) == ret,
        }
    }
}
