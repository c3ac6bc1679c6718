use {
    crate::{OperationInvoker, RecorderKind},
    futures::{future::join_all, FutureExt},
    lincheck_core::{Operation, OperationCall, ProcessId, RawRecord, Value},
    rand::{seq::SliceRandom, SeedableRng},
    rand_chacha::ChaCha8Rng,
    std::{
        any::Any,
        panic::{self, AssertUnwindSafe},
        sync::Arc,
        time::{Duration, Instant},
    },
    thiserror::Error,
    tokio::{runtime::Builder, task::JoinError},
    tracing::{debug, error, info, warn},
};

/// Parameters of a capture run.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct HarnessConfig {
    /// Number of concurrent callers.
    pub processes: usize,
    /// Total calls across all processes.
    pub operations: usize,
    /// How long to wait for every process to finish before giving up on stragglers.
    pub join_timeout: Duration,
    pub recorder: RecorderKind,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            processes: 4,
            operations: 100,
            join_timeout: Duration::from_secs(10),
            recorder: RecorderKind::default(),
        }
    }
}

/// Where the calls of a run come from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Workload {
    /// Each call picks an operation uniformly at random and asks the invoker for arguments.
    Random,
    /// Like [`Workload::Random`], but every process draws from a generator seeded with `seed`
    /// plus its process index, so the calls of each process are reproducible.
    Seeded(u64),
    /// A pre-built sequence dealt out in contiguous blocks: process 0 takes the first block,
    /// process 1 the next, and so on. Must hold at least as many calls as the run performs.
    Scripted(Vec<OperationCall>),
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HarnessError {
    #[error("scripted workload holds {available} calls but {required} are required")]
    WorkloadTooShort { required: usize, available: usize },

    #[error("a random workload requires the invoker to list at least one operation")]
    NoOperations,

    #[error("unable to start the runtime")]
    Runtime(#[from] std::io::Error),
}

/// The outcome of [`Harness::run`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Capture {
    /// Every recorded event, ordered by sequence number.
    pub records: Vec<RawRecord>,
    /// Processes still running when the join timed out.
    pub stragglers: usize,
    /// Processes that died outside a call (a panic inside a call is recorded as a failure).
    pub panicked: usize,
    pub elapsed: Duration,
}

impl Capture {
    /// True when every process ran to completion.
    pub fn is_complete(&self) -> bool {
        self.stragglers == 0 && self.panicked == 0
    }
}

enum Plan {
    Scripted(Vec<OperationCall>),
    Random {
        count: usize,
        menu: Arc<Vec<Operation>>,
        rng: ChaCha8Rng,
    },
}

/// Calls a shared subject from several processes at once and records what each one observed.
///
/// Every process runs as a blocking task on its own multi-threaded [`tokio`] runtime, so calls
/// overlap in real time. Calls that fail or panic are recorded as [`Value::Failed`] and never
/// stop a process.
///
/// ```
/// use lincheck::*;
/// use std::sync::atomic::{AtomicI64, Ordering};
///
/// struct Counter(AtomicI64);
///
/// impl OperationInvoker for Counter {
///     fn operations(&self) -> Vec<Operation> {
///         vec![Operation::new("increment", 0)]
///     }
///
///     fn apply(&self, _call: &OperationCall) -> Result<Value, InvocationFailure> {
///         Ok(Value::Int(self.0.fetch_add(1, Ordering::SeqCst)))
///     }
/// }
///
/// let harness = Harness::new(Counter(AtomicI64::new(0))).processes(3).operations(30);
/// let capture = harness.run(Workload::Random).unwrap();
/// assert_eq!(capture.records.len(), 60);
/// assert!(capture.is_complete());
/// ```
///
/// # Panics
///
/// [`run`](Self::run) blocks on a runtime of its own and panics if called from within an
/// asynchronous context.
pub struct Harness<I> {
    config: HarnessConfig,
    invoker: Arc<I>,
}

impl<I> Harness<I>
where
    I: OperationInvoker + 'static,
{
    pub fn new(invoker: I) -> Self {
        Harness {
            config: HarnessConfig::default(),
            invoker: Arc::new(invoker),
        }
    }

    pub fn config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn processes(mut self, processes: usize) -> Self {
        self.config.processes = processes;
        self
    }

    pub fn operations(mut self, operations: usize) -> Self {
        self.config.operations = operations;
        self
    }

    pub fn join_timeout(mut self, join_timeout: Duration) -> Self {
        self.config.join_timeout = join_timeout;
        self
    }

    pub fn recorder(mut self, recorder: RecorderKind) -> Self {
        self.config.recorder = recorder;
        self
    }

    pub fn settings(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    pub fn run(&self, workload: Workload) -> Result<Capture, HarnessError> {
        let HarnessConfig {
            processes,
            operations,
            join_timeout,
            recorder,
        } = self.config.clone();
        if processes == 0 || operations == 0 {
            return Ok(Capture::default());
        }
        let plans = self.plan(workload)?;
        let recorder = recorder.build(processes);
        let rt = Builder::new_multi_thread()
            .enable_time()
            .thread_name("lincheck")
            .build()?;
        info!(processes, operations, "Starting capture.");

        let started = Instant::now();
        let mut handles: Vec<_> = plans
            .into_iter()
            .enumerate()
            .map(|(i, plan)| {
                let process = ProcessId::from(i);
                let invoker = Arc::clone(&self.invoker);
                let recorder = Arc::clone(&recorder);
                rt.spawn_blocking(move || {
                    let mut perform = |call: OperationCall| {
                        recorder.record_invocation(process, &call);
                        let value = invoke(&*invoker, process, &call);
                        recorder.record_return(process, &value);
                    };
                    match plan {
                        Plan::Scripted(calls) => calls.into_iter().for_each(&mut perform),
                        Plan::Random {
                            count,
                            menu,
                            mut rng,
                        } => {
                            for _ in 0..count {
                                // The menu was checked to be non-empty when planning.
                                let Some(operation) = menu.choose(&mut rng) else {
                                    break;
                                };
                                let args = invoker.arguments(operation, process, &mut rng);
                                perform(OperationCall::new(operation.clone(), args));
                            }
                        }
                    }
                    debug!(%process, "Process finished.");
                })
            })
            .collect();

        // Each outcome is stored as soon as its process finishes, so a timeout keeps them.
        let mut outcomes: Vec<Option<Result<(), JoinError>>> =
            handles.iter().map(|_| None).collect();
        let joined = rt.block_on(async {
            let joins = handles
                .iter_mut()
                .zip(outcomes.iter_mut())
                .map(|(handle, outcome)| async move {
                    *outcome = Some(handle.await);
                });
            tokio::time::timeout(join_timeout, join_all(joins)).await
        });
        for (handle, outcome) in handles.iter_mut().zip(outcomes.iter_mut()) {
            if outcome.is_none() && handle.is_finished() {
                *outcome = handle.now_or_never();
            }
        }

        let mut capture = Capture::default();
        for outcome in outcomes {
            match outcome {
                None => capture.stragglers += 1,
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    if e.is_panic() {
                        let panic = panic_message(&*e.into_panic());
                        error!(%panic, "Process exited due to panic.");
                    } else {
                        error!(%e, "Process was cancelled.");
                    }
                    capture.panicked += 1;
                }
            }
        }
        if joined.is_err() {
            warn!(
                stragglers = capture.stragglers,
                ?join_timeout,
                "Join timed out. Proceeding without stragglers."
            );
        }
        capture.elapsed = started.elapsed();
        capture.records = recorder.records();
        // Stragglers keep their threads. Shutting down in the background avoids waiting on them.
        rt.shutdown_background();
        info!(
            records = capture.records.len(),
            elapsed = ?capture.elapsed,
            "Capture finished."
        );
        Ok(capture)
    }

    fn plan(&self, workload: Workload) -> Result<Vec<Plan>, HarnessError> {
        let processes = self.config.processes;
        let operations = self.config.operations;
        // The first `operations % processes` processes take one extra call.
        let counts = (0..processes)
            .map(|p| operations / processes + usize::from(p < operations % processes));

        let seed = match workload {
            Workload::Scripted(calls) => {
                if calls.len() < operations {
                    return Err(HarnessError::WorkloadTooShort {
                        required: operations,
                        available: calls.len(),
                    });
                }
                let mut calls = calls.into_iter();
                return Ok(counts
                    .map(|count| Plan::Scripted(calls.by_ref().take(count).collect()))
                    .collect());
            }
            Workload::Random => None,
            Workload::Seeded(seed) => Some(seed),
        };
        let menu = Arc::new(self.invoker.operations());
        if menu.is_empty() {
            return Err(HarnessError::NoOperations);
        }
        Ok(counts
            .enumerate()
            .map(|(p, count)| Plan::Random {
                count,
                menu: Arc::clone(&menu),
                rng: match seed {
                    Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(p as u64)),
                    None => ChaCha8Rng::from_entropy(),
                },
            })
            .collect())
    }
}

fn invoke<I: OperationInvoker>(invoker: &I, process: ProcessId, call: &OperationCall) -> Value {
    match panic::catch_unwind(AssertUnwindSafe(|| invoker.apply(call))) {
        Ok(Ok(value)) => value,
        Ok(Err(failure)) => {
            warn!(%process, %call, %failure, "Call failed.");
            Value::Failed(failure.reason().to_string())
        }
        Err(e) => {
            let panic = panic_message(&*e);
            warn!(%process, %call, %panic, "Call panicked.");
            Value::Failed(panic)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(panic) = panic.downcast_ref::<&'static str>() {
        panic.to_string()
    } else if let Some(panic) = panic.downcast_ref::<String>() {
        panic.clone()
    } else {
        "panic".to_string()
    }
}
