use {
    consistency_model::{
        Event, Queue, QueueOp, QueueRet, Register, RegisterOp, RegisterRet, SequentialSpec, Stack,
        StackOp, StackRet,
    },
    lincheck::{OperationCall, ProcessId, RawKind, RawRecord, Value},
    std::collections::{BTreeMap, VecDeque},
    thiserror::Error,
    tracing::{debug, warn},
};

/// Maps the calls a subject understands onto the operations of a [`SequentialSpec`].
pub trait Vocabulary {
    type Spec: SequentialSpec;

    /// The reference operation for `call`, or `None` if the call is outside the vocabulary (for
    /// instance a `size` query the reference object does not model).
    fn translate(&self, call: &OperationCall) -> Option<<Self::Spec as SequentialSpec>::Op>;

    /// The reference return value corresponding to what the subject returned for `op`, or
    /// `None` if no reference return could explain it.
    fn observe(
        &self,
        op: &<Self::Spec as SequentialSpec>::Op,
        value: &Value,
    ) -> Option<<Self::Spec as SequentialSpec>::Ret>;
}

/// Reads `offer`/`enqueue`/`add`/`push` as [`QueueOp::Enqueue`] of the first argument and
/// `poll`/`dequeue`/`remove` as [`QueueOp::Dequeue`]. A dequeue returning [`Value::Null`]
/// observed an empty queue. An enqueue must return `true` or nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueueVocabulary;

impl Vocabulary for QueueVocabulary {
    type Spec = Queue<Value>;

    fn translate(&self, call: &OperationCall) -> Option<QueueOp<Value>> {
        match call.name() {
            "offer" | "enqueue" | "add" | "push" => Some(QueueOp::Enqueue(call.arg(0)?.clone())),
            "poll" | "dequeue" | "remove" => Some(QueueOp::Dequeue),
            _ => None,
        }
    }

    fn observe(&self, op: &QueueOp<Value>, value: &Value) -> Option<QueueRet<Value>> {
        match (op, value) {
            (_, Value::Failed(_)) => None,
            (QueueOp::Enqueue(_), Value::Bool(true) | Value::Null) => Some(QueueRet::EnqueueOk),
            (QueueOp::Enqueue(_), _) => None,
            (QueueOp::Dequeue, Value::Null) => Some(QueueRet::DequeueOk(None)),
            (QueueOp::Dequeue, value) => Some(QueueRet::DequeueOk(Some(value.clone()))),
        }
    }
}

/// Reads `push` as [`StackOp::Push`], `pop` as [`StackOp::Pop`], and `len`/`size` as
/// [`StackOp::Len`].
#[derive(Clone, Copy, Debug, Default)]
pub struct StackVocabulary;

impl Vocabulary for StackVocabulary {
    type Spec = Stack<Value>;

    fn translate(&self, call: &OperationCall) -> Option<StackOp<Value>> {
        match call.name() {
            "push" => Some(StackOp::Push(call.arg(0)?.clone())),
            "pop" => Some(StackOp::Pop),
            "len" | "size" => Some(StackOp::Len),
            _ => None,
        }
    }

    fn observe(&self, op: &StackOp<Value>, value: &Value) -> Option<StackRet<Value>> {
        match (op, value) {
            (_, Value::Failed(_)) => None,
            (StackOp::Push(_), Value::Bool(true) | Value::Null) => Some(StackRet::PushOk),
            (StackOp::Push(_), _) => None,
            (StackOp::Pop, Value::Null) => Some(StackRet::PopOk(None)),
            (StackOp::Pop, value) => Some(StackRet::PopOk(Some(value.clone()))),
            (StackOp::Len, value) => Some(StackRet::LenOk(usize::try_from(value.as_int()?).ok()?)),
        }
    }
}

/// Reads `write`/`set`/`put` as [`RegisterOp::Write`] and `read`/`get` as [`RegisterOp::Read`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RegisterVocabulary;

impl Vocabulary for RegisterVocabulary {
    type Spec = Register<Value>;

    fn translate(&self, call: &OperationCall) -> Option<RegisterOp<Value>> {
        match call.name() {
            "write" | "set" | "put" => Some(RegisterOp::Write(call.arg(0)?.clone())),
            "read" | "get" => Some(RegisterOp::Read),
            _ => None,
        }
    }

    fn observe(&self, op: &RegisterOp<Value>, value: &Value) -> Option<RegisterRet<Value>> {
        match (op, value) {
            (_, Value::Failed(_)) => None,
            (RegisterOp::Write(_), _) => Some(RegisterRet::WriteOk),
            (RegisterOp::Read, value) => Some(RegisterRet::ReadOk(value.clone())),
        }
    }
}

/// A return that matched no outstanding invocation. A harness never produces one, so seeing it
/// points at a bug upstream of the search.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("record {seq}: {process} returned without a pending invocation")]
pub struct MalformedHistory {
    pub seq: u64,
    pub process: ProcessId,
}

/// The output of [`HistoryAdapter::adapt`].
#[derive(Clone, Debug, PartialEq)]
pub struct Adapted<Op, Ret> {
    pub events: Vec<Event<Op, Ret>>,
    /// Invocations outside the vocabulary, dropped along with their returns.
    pub ignored: usize,
    /// Unmatched returns, skipped.
    pub malformed: Vec<MalformedHistory>,
}

#[derive(Default)]
struct Pending {
    invocations: VecDeque<usize>,
    ignored: usize,
}

/// Turns raw records into the [`Event`]s consumed by the
/// [`LinearizabilityTester`](consistency_model::LinearizabilityTester).
#[derive(Clone, Debug, Default)]
pub struct HistoryAdapter<V> {
    vocabulary: V,
}

type Op<V> = <<V as Vocabulary>::Spec as SequentialSpec>::Op;
type Ret<V> = <<V as Vocabulary>::Spec as SequentialSpec>::Ret;

impl<V: Vocabulary> HistoryAdapter<V> {
    pub fn new(vocabulary: V) -> Self {
        HistoryAdapter { vocabulary }
    }

    pub fn vocabulary(&self) -> &V {
        &self.vocabulary
    }

    /// Processes records in sequence order. Per process, translated invocations wait in a FIFO
    /// for their returns, while invocations outside the vocabulary only bump a counter that
    /// swallows the next return.
    pub fn adapt(&self, records: &[RawRecord]) -> Adapted<Op<V>, Ret<V>>
    where
        Ret<V>: Clone,
    {
        let mut records: Vec<&RawRecord> = records.iter().collect();
        records.sort_by_key(|r| r.seq);

        let mut adapted = Adapted {
            events: Vec::with_capacity(records.len()),
            ignored: 0,
            malformed: Vec::new(),
        };
        let mut by_process = BTreeMap::<ProcessId, Pending>::new();
        for record in records {
            let process = record.process;
            let pending = by_process.entry(process).or_default();
            match &record.kind {
                RawKind::Invoke(call) => match self.vocabulary.translate(call) {
                    Some(op) => {
                        pending.invocations.push_back(adapted.events.len());
                        adapted.events.push(Event::Invoke {
                            process,
                            label: call.to_string(),
                            op,
                            expected: None,
                        });
                    }
                    None => {
                        debug!(%process, %call, "Ignoring call outside the vocabulary.");
                        pending.ignored += 1;
                        adapted.ignored += 1;
                    }
                },
                RawKind::Return(value) => {
                    if pending.ignored > 0 {
                        pending.ignored -= 1;
                        continue;
                    }
                    let Some(invocation) = pending.invocations.pop_front() else {
                        let malformed = MalformedHistory {
                            seq: record.seq,
                            process,
                        };
                        warn!(%malformed, "Skipping malformed record.");
                        adapted.malformed.push(malformed);
                        continue;
                    };
                    let mut result = None;
                    if let Event::Invoke { op, expected, .. } = &mut adapted.events[invocation] {
                        result = self.vocabulary.observe(op, value);
                        expected.clone_from(&result);
                    }
                    adapted.events.push(Event::Return { process, result });
                }
                kind => debug!(?kind, "Skipping unrecognized record."),
            }
        }
        adapted
    }
}
