use {
    lincheck_verifier::*,
    std::{
        collections::VecDeque,
        sync::{Mutex, RwLock},
    },
};

/// A queue that serializes every call behind one lock, and is therefore linearizable.
#[derive(Default)]
struct LockedQueue(Mutex<VecDeque<Value>>);

impl OperationInvoker for LockedQueue {
    fn operations(&self) -> Vec<Operation> {
        vec![
            Operation::new("offer", 1),
            Operation::new("poll", 0),
            Operation::new("size", 0),
        ]
    }

    fn apply(&self, call: &OperationCall) -> Result<Value, InvocationFailure> {
        let mut q = self
            .0
            .lock()
            .map_err(|e| InvocationFailure::new(e.to_string()))?;
        match (call.name(), call.arg(0)) {
            ("offer", Some(v)) => {
                q.push_back(v.clone());
                Ok(Value::Bool(true))
            }
            ("poll", _) => Ok(q.pop_front().into()),
            ("size", _) => Ok(q.len().into()),
            (name, _) => Err(InvocationFailure::new(format!("unsupported: {name}"))),
        }
    }
}

#[derive(Default)]
struct LockedStack(Mutex<Vec<Value>>);

impl OperationInvoker for LockedStack {
    fn operations(&self) -> Vec<Operation> {
        vec![
            Operation::new("push", 1),
            Operation::new("pop", 0),
            Operation::new("size", 0),
        ]
    }

    fn apply(&self, call: &OperationCall) -> Result<Value, InvocationFailure> {
        let mut s = self
            .0
            .lock()
            .map_err(|e| InvocationFailure::new(e.to_string()))?;
        match (call.name(), call.arg(0)) {
            ("push", Some(v)) => {
                s.push(v.clone());
                Ok(Value::Null)
            }
            ("pop", _) => Ok(s.pop().into()),
            ("size", _) => Ok(s.len().into()),
            (name, _) => Err(InvocationFailure::new(format!("unsupported: {name}"))),
        }
    }
}

#[derive(Default)]
struct LockedRegister(RwLock<Value>);

impl OperationInvoker for LockedRegister {
    fn operations(&self) -> Vec<Operation> {
        vec![Operation::new("write", 1), Operation::new("read", 0)]
    }

    fn apply(&self, call: &OperationCall) -> Result<Value, InvocationFailure> {
        match (call.name(), call.arg(0)) {
            ("write", Some(v)) => {
                let mut value = self
                    .0
                    .write()
                    .map_err(|e| InvocationFailure::new(e.to_string()))?;
                *value = v.clone();
                Ok(Value::Null)
            }
            ("read", _) => self
                .0
                .read()
                .map(|value| value.clone())
                .map_err(|e| InvocationFailure::new(e.to_string())),
            (name, _) => Err(InvocationFailure::new(format!("unsupported: {name}"))),
        }
    }
}

#[cfg(test)]
mod test {
    use {super::*, tracing_subscriber::EnvFilter};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn queue_verification() -> Verification<LockedQueue, QueueVocabulary> {
        init_tracing();
        Verification::new(LockedQueue::default(), QueueVocabulary, Queue::default)
            .max_steps(5_000_000)
    }

    #[test]
    fn single_process_is_linearizable() {
        let report = queue_verification()
            .processes(1)
            .operations(50)
            .run(Workload::Random)
            .unwrap();
        report.assert_linearizable();
        assert_eq!(report.stats.operations, 50);
        assert_eq!(report.stats.events, 2 * (50 - report.stats.ignored));
    }

    #[test]
    fn concurrent_queue_is_linearizable() {
        let report = queue_verification()
            .processes(3)
            .operations(45)
            .run(Workload::Seeded(11))
            .unwrap();
        report.assert_linearizable();
        assert_eq!(report.stats.stragglers, 0);
        assert_eq!(report.stats.malformed, 0);
        assert!(report.stats.steps > 0);
    }

    #[test]
    fn recorders_are_interchangeable() {
        for recorder in [RecorderKind::Shared, RecorderKind::PerProcess] {
            queue_verification()
                .processes(2)
                .operations(30)
                .recorder(recorder)
                .run(Workload::Random)
                .unwrap()
                .assert_linearizable();
        }
    }

    #[test]
    fn scripted_interleaving_is_linearizable() {
        let script = vec![
            OperationCall::named("offer", [Value::from(1)]),
            OperationCall::named("offer", [Value::from(2)]),
            OperationCall::named("poll", []),
            OperationCall::named("poll", []),
        ];
        let report = queue_verification()
            .processes(2)
            .operations(4)
            .run(Workload::Scripted(script))
            .unwrap();
        report.assert_linearizable();
        assert_eq!(report.stats.events, 8);
    }

    #[test]
    fn concurrent_stack_is_linearizable() {
        Verification::new(LockedStack::default(), StackVocabulary, Stack::default)
            .max_steps(5_000_000)
            .processes(2)
            .operations(30)
            .run(Workload::Seeded(3))
            .unwrap()
            .assert_linearizable();
    }

    #[test]
    fn concurrent_register_is_linearizable() {
        Verification::new(LockedRegister::default(), RegisterVocabulary, || {
            Register::new(Value::Null)
        })
        .max_steps(5_000_000)
        .processes(3)
        .operations(30)
        .run(Workload::Seeded(5))
        .unwrap()
        .assert_linearizable();
    }

    #[test]
    fn can_check_an_earlier_capture() {
        let verification = queue_verification().processes(2).operations(20);
        let capture = verification.harness().run(Workload::Random).unwrap();
        let first = verification.check(&capture).unwrap();
        let second = verification.check(&capture).unwrap();
        first.assert_linearizable();
        assert_eq!(first.verdict, second.verdict);
        assert_eq!(first.stats, second.stats);
        assert_eq!(first.capture_elapsed, capture.elapsed);
    }
}
