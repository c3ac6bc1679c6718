use {
    lincheck_core::{CallId, OperationCall, ProcessId, RawRecord, Value},
    std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    tracing::{trace, warn},
};

/// Captures invocations and returns as they happen.
///
/// Every event draws its sequence number from one atomic counter at the moment it is recorded, so
/// an invocation recorded before a call starts and a return recorded after it finishes bracket
/// the call in real time.
pub trait Recorder: Send + Sync {
    /// Records that `process` is about to make `call`.
    fn record_invocation(&self, process: ProcessId, call: &OperationCall) -> CallId;

    /// Records that the outstanding call of `process` produced `value`. A return without an
    /// outstanding call is logged and dropped.
    fn record_return(&self, process: ProcessId, value: &Value);

    /// Everything recorded so far, ordered by sequence number.
    fn records(&self) -> Vec<RawRecord>;
}

/// Selects a [`Recorder`] implementation. Both produce the same records.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RecorderKind {
    /// [`SharedRecorder`]
    #[default]
    Shared,
    /// [`PerProcessRecorder`]
    PerProcess,
}

impl RecorderKind {
    pub fn build(self, processes: usize) -> Arc<dyn Recorder> {
        match self {
            RecorderKind::Shared => Arc::new(SharedRecorder::new(processes)),
            RecorderKind::PerProcess => Arc::new(PerProcessRecorder::new(processes)),
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    next_index: u32,
    outstanding: Option<CallId>,
}

impl Slot {
    fn invoke(&mut self, process: ProcessId) -> CallId {
        if let Some(previous) = self.outstanding {
            warn!(%previous, "Invocation recorded while another call was outstanding.");
        }
        let call = CallId::new(process, self.next_index);
        self.next_index += 1;
        self.outstanding = Some(call);
        call
    }

    fn ret(&mut self, process: ProcessId) -> Option<CallId> {
        let call = self.outstanding.take();
        if call.is_none() {
            warn!(%process, "Return recorded without an outstanding invocation. Dropping.");
        }
        call
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding a guard cannot leave a slot or log half-written.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn log_event(record: &RawRecord) {
    trace!(target: "lincheck::events", %record);
}

/// Appends every process's records to one shared log.
///
/// # Panics
///
/// Recording for a process at or above the count given to [`new`](Self::new) panics.
#[derive(Debug)]
pub struct SharedRecorder {
    seq: AtomicU64,
    slots: Vec<Mutex<Slot>>,
    log: Mutex<Vec<RawRecord>>,
}

impl SharedRecorder {
    pub fn new(processes: usize) -> Self {
        SharedRecorder {
            seq: AtomicU64::new(0),
            slots: (0..processes).map(|_| Mutex::default()).collect(),
            log: Mutex::default(),
        }
    }

    fn push(&self, record: RawRecord) {
        log_event(&record);
        lock(&self.log).push(record);
    }
}

impl Recorder for SharedRecorder {
    fn record_invocation(&self, process: ProcessId, call: &OperationCall) -> CallId {
        let id = lock(&self.slots[process]).invoke(process);
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.push(RawRecord::invoke(seq, id, call.clone()));
        id
    }

    fn record_return(&self, process: ProcessId, value: &Value) {
        let Some(id) = lock(&self.slots[process]).ret(process) else {
            return;
        };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.push(RawRecord::ret(seq, id, value.clone()));
    }

    fn records(&self) -> Vec<RawRecord> {
        let mut records = lock(&self.log).clone();
        records.sort_by_key(|r| r.seq);
        records
    }
}

#[derive(Debug, Default)]
struct ProcessLog {
    slot: Slot,
    records: Vec<RawRecord>,
}

/// Keeps a private log per process and merges them on [`records`](Recorder::records). Processes
/// share nothing but the sequence counter.
///
/// # Panics
///
/// Recording for a process at or above the count given to [`new`](Self::new) panics.
#[derive(Debug)]
pub struct PerProcessRecorder {
    seq: AtomicU64,
    logs: Vec<Mutex<ProcessLog>>,
}

impl PerProcessRecorder {
    pub fn new(processes: usize) -> Self {
        PerProcessRecorder {
            seq: AtomicU64::new(0),
            logs: (0..processes).map(|_| Mutex::default()).collect(),
        }
    }
}

impl Recorder for PerProcessRecorder {
    fn record_invocation(&self, process: ProcessId, call: &OperationCall) -> CallId {
        let mut log = lock(&self.logs[process]);
        let id = log.slot.invoke(process);
        let record = RawRecord::invoke(self.seq.fetch_add(1, Ordering::SeqCst), id, call.clone());
        log_event(&record);
        log.records.push(record);
        id
    }

    fn record_return(&self, process: ProcessId, value: &Value) {
        let mut log = lock(&self.logs[process]);
        let Some(id) = log.slot.ret(process) else {
            return;
        };
        let record = RawRecord::ret(self.seq.fetch_add(1, Ordering::SeqCst), id, value.clone());
        log_event(&record);
        log.records.push(record);
    }

    fn records(&self) -> Vec<RawRecord> {
        let mut records: Vec<_> = self
            .logs
            .iter()
            .flat_map(|log| lock(log).records.clone())
            .collect();
        records.sort_by_key(|r| r.seq);
        records
    }
}

#[cfg(test)]
mod test {
    use {super::*, lincheck_core::RawKind, std::thread};

    fn offer(n: i64) -> OperationCall {
        OperationCall::named("offer", [Value::from(n)])
    }

    fn exercise(kind: RecorderKind) {
        let recorder = kind.build(2);
        let a = recorder.record_invocation(0.into(), &offer(1));
        let b = recorder.record_invocation(1.into(), &offer(2));
        recorder.record_return(1.into(), &Value::Bool(true));
        recorder.record_return(0.into(), &Value::Bool(false));
        let c = recorder.record_invocation(0.into(), &OperationCall::named("poll", []));
        recorder.record_return(0.into(), &Value::Null);

        assert_eq!(a, CallId::new(0.into(), 0));
        assert_eq!(b, CallId::new(1.into(), 0));
        assert_eq!(c, CallId::new(0.into(), 1));
        assert_eq!(
            recorder.records(),
            vec![
                RawRecord::invoke(0, a, offer(1)),
                RawRecord::invoke(1, b, offer(2)),
                RawRecord::ret(2, b, Value::Bool(true)),
                RawRecord::ret(3, a, Value::Bool(false)),
                RawRecord::invoke(4, c, OperationCall::named("poll", [])),
                RawRecord::ret(5, c, Value::Null),
            ]
        );
    }

    #[test]
    fn can_record_shared() {
        exercise(RecorderKind::Shared);
    }

    #[test]
    fn can_record_per_process() {
        exercise(RecorderKind::PerProcess);
    }

    #[test]
    fn drops_unmatched_returns() {
        for kind in [RecorderKind::Shared, RecorderKind::PerProcess] {
            let recorder = kind.build(1);
            recorder.record_return(0.into(), &Value::Null);
            let id = recorder.record_invocation(0.into(), &offer(3));
            recorder.record_return(0.into(), &Value::Bool(true));
            recorder.record_return(0.into(), &Value::Bool(true));
            assert_eq!(
                recorder.records(),
                vec![
                    RawRecord::invoke(0, id, offer(3)),
                    RawRecord::ret(1, id, Value::Bool(true)),
                ]
            );
        }
    }

    #[test]
    fn assigns_unique_sequence_numbers_across_threads() {
        for kind in [RecorderKind::Shared, RecorderKind::PerProcess] {
            let recorder = kind.build(4);
            thread::scope(|s| {
                for p in 0..4usize {
                    let recorder = &recorder;
                    s.spawn(move || {
                        for n in 0..50 {
                            recorder.record_invocation(p.into(), &offer(n));
                            recorder.record_return(p.into(), &Value::Bool(true));
                        }
                    });
                }
            });

            let records = recorder.records();
            assert_eq!(
                records.iter().map(|r| r.seq).collect::<Vec<_>>(),
                (0..400).collect::<Vec<_>>()
            );
            for p in 0..4usize {
                let kinds: Vec<_> = records
                    .iter()
                    .filter(|r| r.process == ProcessId::from(p))
                    .map(|r| matches!(r.kind, RawKind::Invoke(_)))
                    .collect();
                assert_eq!(kinds.len(), 100);
                assert!(kinds.chunks(2).all(|pair| pair == [true, false]));
            }
        }
    }
}
