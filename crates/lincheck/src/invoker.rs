use {
    lincheck_core::{Operation, OperationCall, ProcessId, Value},
    rand::Rng,
    thiserror::Error,
};

/// Integer arguments produced by [`OperationInvoker::arguments`] are drawn from `0..ARGUMENT_RANGE`.
pub const ARGUMENT_RANGE: i64 = 100;

/// The reason a call against the subject did not produce a value.
///
/// The harness records it as [`Value::Failed`] and carries on, so a failing subject never stops
/// its process or any other.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("{reason}")]
pub struct InvocationFailure {
    reason: String,
}

impl InvocationFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        InvocationFailure {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Adapts a concurrent object (the "subject") so that the [`Harness`](crate::Harness) can call
/// it by name.
///
/// The subject is shared by every process, so [`apply`](Self::apply) takes `&self` and must be
/// safe to call from many threads at once. Each call is one real side effect.
pub trait OperationInvoker: Send + Sync {
    /// The operations a random workload chooses among, in a stable order.
    fn operations(&self) -> Vec<Operation>;

    /// Performs one call against the subject.
    fn apply(&self, call: &OperationCall) -> Result<Value, InvocationFailure>;

    /// Chooses arguments for a randomly generated call. Defaults to one small integer per
    /// parameter.
    fn arguments<R: Rng + ?Sized>(
        &self,
        operation: &Operation,
        process: ProcessId,
        rng: &mut R,
    ) -> Vec<Value> {
        let _ = process;
        (0..operation.arity())
            .map(|_| Value::Int(rng.gen_range(0..ARGUMENT_RANGE)))
            .collect()
    }
}
