use {
    lincheck_verifier::*,
    std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    },
    tracing::info,
};

/// Locks around a deque. Set `lie_every` to make every n-th offer claim failure.
struct DemoQueue {
    calls: AtomicUsize,
    items: Mutex<VecDeque<Value>>,
    lie_every: Option<usize>,
}

impl DemoQueue {
    fn new(lie_every: Option<usize>) -> Self {
        DemoQueue {
            calls: AtomicUsize::new(0),
            items: Mutex::default(),
            lie_every,
        }
    }
}

impl OperationInvoker for DemoQueue {
    fn operations(&self) -> Vec<Operation> {
        vec![
            Operation::new("offer", 1),
            Operation::new("poll", 0),
            Operation::new("size", 0),
        ]
    }

    fn apply(&self, call: &OperationCall) -> Result<Value, InvocationFailure> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let mut items = self
            .items
            .lock()
            .map_err(|e| InvocationFailure::new(e.to_string()))?;
        match (call.name(), call.arg(0)) {
            ("offer", Some(v)) => {
                items.push_back(v.clone());
                Ok(Value::Bool(self.lie_every.map_or(true, |k| n % k != 0)))
            }
            ("poll", _) => Ok(items.pop_front().into()),
            ("size", _) => Ok(items.len().into()),
            (name, _) => Err(InvocationFailure::new(format!("unsupported: {name}"))),
        }
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    for (name, lie_every) in [("locked queue", None), ("lying queue", Some(5))] {
        let report = Verification::new(DemoQueue::new(lie_every), QueueVocabulary, Queue::default)
            .processes(4)
            .operations(100)
            .max_steps(10_000_000)
            .run(Workload::Random);
        match report {
            Ok(report) => info!(
                name,
                linearizable = report.is_linearizable(),
                verdict = ?report.verdict,
                capture_elapsed = ?report.capture_elapsed,
                decision_elapsed = ?report.decision_elapsed,
                stats = ?report.stats,
                "Checked."
            ),
            Err(err) => info!(name, %err, "Unable to check."),
        }
    }
}
