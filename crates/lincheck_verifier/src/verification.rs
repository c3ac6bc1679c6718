use {
    crate::{Adapted, HistoryAdapter, MalformedHistory, Vocabulary},
    colorful::{Color, Colorful},
    consistency_model::{
        Diagnostics, Event, LinearizabilityTester, SearchError, SequentialSpec, Verdict,
    },
    lincheck::{
        Capture, Harness, HarnessConfig, HarnessError, OperationInvoker, RawRecord, RecorderKind,
        Workload,
    },
    std::{
        fmt::Debug,
        sync::{atomic::AtomicBool, Arc},
        time::{Duration, Instant},
    },
    thiserror::Error,
    tracing::info,
};

type Op<V> = <<V as Vocabulary>::Spec as SequentialSpec>::Op;
type Ret<V> = <<V as Vocabulary>::Spec as SequentialSpec>::Ret;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VerifyError {
    #[error("capture failed")]
    Harness(#[from] HarnessError),

    #[error("search failed")]
    Search(#[from] SearchError),
}

/// Counts describing a run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Stats {
    /// Invocations in the raw history.
    pub operations: usize,
    /// Events handed to the search.
    pub events: usize,
    pub ignored: usize,
    pub malformed: usize,
    pub stragglers: usize,
    pub panicked: usize,
    pub steps: u64,
}

/// Everything learned from one run.
#[derive(Clone, Debug)]
pub struct Report<Op, Ret> {
    pub verdict: Verdict<Ret>,
    /// The history that was searched.
    pub events: Vec<Event<Op, Ret>>,
    pub malformed: Vec<MalformedHistory>,
    pub capture_elapsed: Duration,
    pub decision_elapsed: Duration,
    pub stats: Stats,
}

impl<Op, Ret> Report<Op, Ret>
where
    Ret: Debug,
{
    pub fn is_linearizable(&self) -> bool {
        self.verdict.is_linearizable()
    }

    pub fn assert_linearizable(&self) {
        self.assert_well_formed();
        match &self.verdict {
            Verdict::Success => {}
            Verdict::Failure(diagnostics) => {
                println!("History prefix reaching the furthest point of the search:");
                self.print_prefix(diagnostics);
                panic!("History is not linearizable.");
            }
            Verdict::Interrupted => panic!("Search was interrupted before reaching a verdict."),
            Verdict::OutOfSteam => panic!(
                "Search exhausted its budget of steps after {} steps.",
                self.stats.steps
            ),
            _ => panic!("Search ended without a verdict."),
        }
    }

    /// Returns the diagnostics of the expected failure.
    pub fn assert_not_linearizable(&self) -> &Diagnostics<Ret> {
        self.assert_well_formed();
        match &self.verdict {
            Verdict::Failure(diagnostics) => diagnostics,
            Verdict::Success => {
                println!("History with a linearization:");
                for (i, e) in self.events.iter().enumerate() {
                    println!("\t{}. {e}", i + 1);
                }
                panic!("Done, but expected a non-linearizable history.");
            }
            Verdict::Interrupted => panic!("Search was interrupted before reaching a verdict."),
            Verdict::OutOfSteam => panic!(
                "Search exhausted its budget of steps after {} steps.",
                self.stats.steps
            ),
            _ => panic!("Search ended without a verdict."),
        }
    }

    fn assert_well_formed(&self) {
        if !self.malformed.is_empty() {
            println!("Malformed records:");
            for m in &self.malformed {
                println!("\t{m}");
            }
            panic!("History contains {} malformed records.", self.malformed.len());
        }
    }

    fn print_prefix(&self, diagnostics: &Diagnostics<Ret>) {
        for (i, e) in diagnostics.prefix(&self.events).iter().enumerate() {
            let msg = format!("{: >4}. {e}", i + 1);
            if i == diagnostics.furthest {
                println!("{}", msg.color(Color::Red));
            } else {
                println!("{msg}");
            }
        }
        for (p, process) in diagnostics.processes.iter().enumerate() {
            if let Some(furthest) = process.furthest {
                println!(
                    "\tP{p} reached event {} where the reference object could return {:?}",
                    furthest + 1,
                    process.rejected
                );
            }
        }
    }
}

/// Adapts `records` and searches the resulting history with `tester`.
///
/// Histories captured elsewhere (or built by hand) can be checked this way. Setting the
/// `LINCHECK_DEBUG` environment variable prints the searched history, highlighting how far the
/// search got.
pub fn check_records<V>(
    records: &[RawRecord],
    adapter: &HistoryAdapter<V>,
    tester: &mut LinearizabilityTester<V::Spec>,
) -> Result<Report<Op<V>, Ret<V>>, SearchError>
where
    V: Vocabulary,
    Op<V>: Debug,
    Ret<V>: Clone + Debug,
{
    let started = Instant::now();
    let Adapted {
        events,
        ignored,
        malformed,
    } = adapter.adapt(records);
    let verdict = tester.solve(&events)?;
    let decision_elapsed = started.elapsed();

    let stats = Stats {
        operations: records.iter().filter(|r| r.is_invocation()).count(),
        events: events.len(),
        ignored,
        malformed: malformed.len(),
        steps: tester.steps(),
        ..Stats::default()
    };
    info!(
        linearizable = verdict.is_linearizable(),
        conclusive = verdict.is_conclusive(),
        events = stats.events,
        steps = stats.steps,
        ?decision_elapsed,
        "Verdict reached."
    );
    if std::env::var("LINCHECK_DEBUG").is_ok() {
        let furthest = verdict.diagnostics().map(|d| d.furthest);
        println!("Searched history:");
        for (i, e) in events.iter().enumerate() {
            let msg = format!("{i: >4}. {e}");
            if Some(i) == furthest {
                println!("{}", msg.color(Color::Red));
            } else {
                println!("{msg}");
            }
        }
    }

    Ok(Report {
        verdict,
        events,
        malformed,
        capture_elapsed: Duration::ZERO,
        decision_elapsed,
        stats,
    })
}

/// Captures a history from a live subject and checks it: harness, then adapter, then search.
///
/// ```
/// use lincheck_verifier::*;
/// use std::{collections::VecDeque, sync::Mutex};
///
/// #[derive(Default)]
/// struct LockedQueue(Mutex<VecDeque<Value>>);
///
/// impl OperationInvoker for LockedQueue {
///     fn operations(&self) -> Vec<Operation> {
///         vec![Operation::new("offer", 1), Operation::new("poll", 0)]
///     }
///
///     fn apply(&self, call: &OperationCall) -> Result<Value, InvocationFailure> {
///         let mut q = self.0.lock().map_err(|e| InvocationFailure::new(e.to_string()))?;
///         match (call.name(), call.arg(0)) {
///             ("offer", Some(v)) => {
///                 q.push_back(v.clone());
///                 Ok(Value::Bool(true))
///             }
///             ("poll", _) => Ok(q.pop_front().into()),
///             _ => Err(InvocationFailure::new("unsupported")),
///         }
///     }
/// }
///
/// let report = Verification::new(LockedQueue::default(), QueueVocabulary, Queue::default)
///     .processes(2)
///     .operations(20)
///     .run(Workload::Seeded(1))
///     .unwrap();
/// report.assert_linearizable();
/// ```
pub struct Verification<I, V: Vocabulary> {
    harness: Harness<I>,
    adapter: HistoryAdapter<V>,
    spec: Box<dyn Fn() -> V::Spec>,
    max_steps: Option<u64>,
    cancellation: Option<Arc<AtomicBool>>,
}

impl<I, V> Verification<I, V>
where
    I: OperationInvoker + 'static,
    V: Vocabulary,
    Op<V>: Debug,
    Ret<V>: Clone + Debug,
{
    /// `spec` builds a fresh reference object for each run.
    pub fn new(invoker: I, vocabulary: V, spec: impl Fn() -> V::Spec + 'static) -> Self {
        Verification {
            harness: Harness::new(invoker),
            adapter: HistoryAdapter::new(vocabulary),
            spec: Box::new(spec),
            max_steps: None,
            cancellation: None,
        }
    }

    pub fn config(mut self, config: HarnessConfig) -> Self {
        self.harness = self.harness.config(config);
        self
    }

    pub fn processes(mut self, processes: usize) -> Self {
        self.harness = self.harness.processes(processes);
        self
    }

    pub fn operations(mut self, operations: usize) -> Self {
        self.harness = self.harness.operations(operations);
        self
    }

    pub fn join_timeout(mut self, join_timeout: Duration) -> Self {
        self.harness = self.harness.join_timeout(join_timeout);
        self
    }

    pub fn recorder(mut self, recorder: RecorderKind) -> Self {
        self.harness = self.harness.recorder(recorder);
        self
    }

    /// Bounds the search. See [`LinearizabilityTester::max_steps`].
    pub fn max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancellation = Some(flag);
        self
    }

    pub fn harness(&self) -> &Harness<I> {
        &self.harness
    }

    pub fn run(&self, workload: Workload) -> Result<Report<Op<V>, Ret<V>>, VerifyError> {
        let capture = self.harness.run(workload)?;
        self.check(&capture)
    }

    /// Checks a capture from an earlier [`Harness::run`].
    pub fn check(&self, capture: &Capture) -> Result<Report<Op<V>, Ret<V>>, VerifyError> {
        let mut tester = LinearizabilityTester::new((self.spec)());
        if let Some(max_steps) = self.max_steps {
            tester = tester.max_steps(max_steps);
        }
        if let Some(flag) = &self.cancellation {
            tester = tester.cancellation(Arc::clone(flag));
        }
        let mut report = check_records(&capture.records, &self.adapter, &mut tester)?;
        report.capture_elapsed = capture.elapsed;
        report.stats.stragglers = capture.stragglers;
        report.stats.panicked = capture.panicked;
        Ok(report)
    }
}
