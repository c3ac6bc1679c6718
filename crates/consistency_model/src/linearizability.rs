use {
    crate::{Diagnostics, EmptyUndoLog, Event, ProcessId, SearchError, SequentialSpec, Verdict},
    std::{
        fmt::Debug,
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
    },
    tracing::{debug, trace, warn},
};

/// Decides whether a history of [`Event`]s is linearizable with respect to a reference
/// [`SequentialSpec`].
///
/// # Algorithm
///
/// The tester walks the history from left to right. An invocation makes its process
/// *pending*. When a process returns, its operation must take effect before the return, so the
/// tester *fires* pending operations: it applies them to the reference object and compares the
/// result with the one the process observed. Other pending processes may be fired first (their
/// operations overlap this return), and the returning process is fired last. A process that was
/// fired early is *committed* and simply goes idle when its own return is reached.
///
/// Each choice pushes a marker onto an explicit stack. When a branch fails the most recent
/// marker is popped and reversed, which includes calling [`SequentialSpec::undo`] for a fire,
/// and the search resumes with the next candidate. The call stack never grows with the history,
/// and the search can stop between any two steps.
///
/// ```text
/// candidates for a return by t (p processes):
///   t+1, t+2, ..., p-1, 0, ..., t-1, t
/// ```
///
/// After another process is fired the candidate scan restarts, so every order in which the
/// overlapping operations could have taken effect is explored.
pub struct LinearizabilityTester<S> {
    spec: S,
    max_steps: Option<u64>,
    cancelled: Arc<AtomicBool>,
    steps: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ThreadState {
    Idle,
    /// Index of the outstanding invocation.
    Pending(usize),
    /// Fired ahead of its return.
    Committed,
}

#[derive(Clone, Copy, Debug)]
enum Task {
    Solve(usize),
    Fire {
        returning: ProcessId,
        i: usize,
        k: usize,
    },
}

#[derive(Clone, Copy, Debug)]
enum Marker {
    Uninvoke {
        process: ProcessId,
    },
    UndoFire {
        returning: ProcessId,
        i: usize,
        k: usize,
        fired: ProcessId,
        prev: ThreadState,
    },
}

enum Fired<Ret> {
    Matched,
    Mismatched(Ret),
}

impl<S> LinearizabilityTester<S>
where
    S: SequentialSpec,
    S::Op: Debug,
    S::Ret: Debug,
{
    pub fn new(spec: S) -> Self {
        LinearizabilityTester {
            spec,
            max_steps: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            steps: 0,
        }
    }

    /// Bounds the number of search steps. Exceeding the bound yields [`Verdict::OutOfSteam`].
    pub fn max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Shares a cancellation flag. Setting it makes the running search return
    /// [`Verdict::Interrupted`] at its next step.
    pub fn cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Steps taken by the most recent [`solve`](Self::solve).
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn spec(&self) -> &S {
        &self.spec
    }

    pub fn into_spec(self) -> S {
        self.spec
    }

    /// Runs the search. Whatever the verdict, every operation applied to the reference object
    /// during the run has been undone by the time this returns. A [`SearchError`] aborts the run
    /// where it stands and may leave the reference object partially applied.
    pub fn solve(&mut self, events: &[Event<S::Op, S::Ret>]) -> Result<Verdict<S::Ret>, SearchError> {
        let process_count = events
            .iter()
            .map(|e| usize::from(e.process()) + 1)
            .max()
            .unwrap_or(0);
        let mut search = Search {
            spec: &mut self.spec,
            events,
            process_count,
            states: vec![ThreadState::Idle; process_count],
            stack: Vec::new(),
            diagnostics: Diagnostics::new(process_count),
        };
        self.steps = 0;

        let mut current = Some(Task::Solve(0));
        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                debug!(steps = self.steps, "Search interrupted.");
                search.unwind()?;
                return Ok(Verdict::Interrupted);
            }
            self.steps += 1;
            if let Some(max_steps) = self.max_steps {
                if self.steps > max_steps {
                    warn!(max_steps, "Search giving up. Step budget exhausted.");
                    search.unwind()?;
                    return Ok(Verdict::OutOfSteam);
                }
            }

            let task = match current.take() {
                Some(task) => task,
                None => match search.stack.pop() {
                    None => break,
                    Some(marker) => {
                        current = search.revert(marker)?;
                        continue;
                    }
                },
            };
            current = match task {
                Task::Solve(i) if i == events.len() => {
                    debug!(steps = self.steps, "Linearization found.");
                    search.unwind()?;
                    return Ok(Verdict::Success);
                }
                Task::Solve(i) => search.solve(i)?,
                Task::Fire { returning, i, k } => search.fire(returning, i, k)?,
            };
        }

        debug!(
            steps = self.steps,
            furthest = search.diagnostics.furthest,
            "No linearization exists."
        );
        Ok(Verdict::Failure(search.diagnostics))
    }
}

struct Search<'a, S: SequentialSpec> {
    spec: &'a mut S,
    events: &'a [Event<S::Op, S::Ret>],
    process_count: usize,
    states: Vec<ThreadState>,
    stack: Vec<Marker>,
    diagnostics: Diagnostics<S::Ret>,
}

impl<'a, S> Search<'a, S>
where
    S: SequentialSpec,
    S::Op: Debug,
    S::Ret: Debug,
{
    /// The `k`-th process to try firing before `returning`'s return. `returning` comes last.
    fn candidate(&self, returning: ProcessId, k: usize) -> ProcessId {
        if k + 1 == self.process_count {
            returning
        } else {
            ProcessId::from((usize::from(returning) + 1 + k) % self.process_count)
        }
    }

    fn solve(&mut self, i: usize) -> Result<Option<Task>, SearchError> {
        let events = self.events;
        match &events[i] {
            Event::Invoke { process, label, .. } => {
                let process = *process;
                trace!(i, %process, label = %label, "Invoke.");
                self.diagnostics.reached(process, i);
                if self.states[process] != ThreadState::Idle {
                    return Err(SearchError::AlreadyPending { index: i, process });
                }
                self.states[process] = ThreadState::Pending(i);
                self.stack.push(Marker::Uninvoke { process });
                Ok(Some(Task::Solve(i + 1)))
            }
            Event::Return { process, result } => {
                let process = *process;
                trace!(i, %process, ?result, "Return.");
                self.diagnostics.reached(process, i);
                let k = match self.states[process] {
                    ThreadState::Idle => {
                        return Err(SearchError::ReturnWithoutInvocation { index: i, process })
                    }
                    // Already took effect, so nothing else needs to be fired before the return.
                    ThreadState::Committed => self.process_count - 1,
                    ThreadState::Pending(_) => 0,
                };
                Ok(Some(Task::Fire {
                    returning: process,
                    i,
                    k,
                }))
            }
        }
    }

    fn fire(&mut self, returning: ProcessId, i: usize, k: usize) -> Result<Option<Task>, SearchError> {
        if k >= self.process_count {
            return Ok(None);
        }
        let candidate = self.candidate(returning, k);
        let prev = self.states[candidate];

        if candidate == returning {
            let fired = match prev {
                ThreadState::Idle => {
                    return Err(SearchError::ReturnWithoutInvocation {
                        index: i,
                        process: returning,
                    })
                }
                ThreadState::Committed => true,
                ThreadState::Pending(invocation) => self.try_fire(returning, invocation, i)?,
            };
            if !fired {
                return Ok(None);
            }
            self.states[returning] = ThreadState::Idle;
            self.stack.push(Marker::UndoFire {
                returning,
                i,
                k,
                fired: returning,
                prev,
            });
            return Ok(Some(Task::Solve(i + 1)));
        }

        let invocation = match prev {
            ThreadState::Pending(invocation) => invocation,
            _ => {
                return Ok(Some(Task::Fire {
                    returning,
                    i,
                    k: k + 1,
                }))
            }
        };
        if !self.try_fire(candidate, invocation, i)? {
            return Ok(Some(Task::Fire {
                returning,
                i,
                k: k + 1,
            }));
        }
        self.states[candidate] = ThreadState::Committed;
        self.stack.push(Marker::UndoFire {
            returning,
            i,
            k,
            fired: candidate,
            prev,
        });
        Ok(Some(Task::Fire {
            returning,
            i,
            k: 0,
        }))
    }

    /// Applies the invocation's operation and keeps it applied only if the result matches the
    /// observed one.
    fn try_fire(&mut self, process: ProcessId, invocation: usize, i: usize) -> Result<bool, SearchError> {
        let events = self.events;
        let (op, expected) = match &events[invocation] {
            Event::Invoke { op, expected, .. } => (op, expected),
            Event::Return { .. } => unreachable!("pending state always refers to an invocation"),
        };
        let fired = {
            let ret = self.spec.apply(op);
            if expected.as_ref() == Some(&ret) {
                Fired::Matched
            } else {
                Fired::Mismatched(ret)
            }
        };
        match fired {
            Fired::Matched => {
                trace!(i, %process, ?op, "Fired.");
                Ok(true)
            }
            Fired::Mismatched(ret) => {
                trace!(i, %process, ?op, ?ret, ?expected, "Unable to fire.");
                self.undo(i)?;
                self.diagnostics.rejected(process, i, ret);
                Ok(false)
            }
        }
    }

    fn revert(&mut self, marker: Marker) -> Result<Option<Task>, SearchError> {
        match marker {
            Marker::Uninvoke { process } => {
                self.states[process] = ThreadState::Idle;
                Ok(None)
            }
            Marker::UndoFire {
                returning,
                i,
                k,
                fired,
                prev,
            } => {
                trace!(i, process = %fired, "Undoing fire.");
                if let ThreadState::Pending(_) = prev {
                    self.undo(i)?;
                }
                self.states[fired] = prev;
                Ok(Some(Task::Fire {
                    returning,
                    i,
                    k: k + 1,
                }))
            }
        }
    }

    /// Reverses every fire still on the stack, leaving the reference object as it started.
    fn unwind(&mut self) -> Result<(), SearchError> {
        while let Some(marker) = self.stack.pop() {
            if let Marker::UndoFire {
                i,
                fired,
                prev: prev @ ThreadState::Pending(_),
                ..
            } = marker
            {
                self.undo(i)?;
                self.states[fired] = prev;
            }
        }
        Ok(())
    }

    fn undo(&mut self, i: usize) -> Result<(), SearchError> {
        self.spec
            .undo()
            .map_err(|source: EmptyUndoLog| SearchError::EmptyUndoLog { index: i, source })
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::{History, Queue, QueueOp, QueueRet, Register, RegisterOp, RegisterRet},
        proptest::prelude::*,
        std::{thread, time::Duration},
        tracing_subscriber::EnvFilter,
    };

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    type QueueHistory = History<QueueOp<u32>, QueueRet<u32>>;

    fn enq(h: &mut QueueHistory, p: usize, v: u32) -> &mut QueueHistory {
        h.on_invoke(p.into(), format!("enqueue({v})"), QueueOp::Enqueue(v))
            .unwrap()
    }

    fn deq(h: &mut QueueHistory, p: usize) -> &mut QueueHistory {
        h.on_invoke(p.into(), "dequeue()", QueueOp::Dequeue).unwrap()
    }

    fn ret(h: &mut QueueHistory, p: usize, r: QueueRet<u32>) -> &mut QueueHistory {
        h.on_return(p.into(), r).unwrap()
    }

    fn solve(history: &QueueHistory) -> Verdict<QueueRet<u32>> {
        init_tracing();
        LinearizabilityTester::new(Queue::default())
            .solve(history.events())
            .unwrap()
    }

    #[test]
    fn accepts_empty_history() {
        let mut tester = LinearizabilityTester::new(Queue::<u32>::default());
        assert_eq!(tester.solve(&[]), Ok(Verdict::Success));
        assert_eq!(tester.steps(), 1);
    }

    #[test]
    fn accepts_sequential_fifo_history() {
        let mut h = QueueHistory::new();
        enq(&mut h, 0, 2);
        ret(&mut h, 0, QueueRet::EnqueueOk);
        deq(&mut h, 0);
        ret(&mut h, 0, QueueRet::DequeueOk(Some(2)));
        enq(&mut h, 0, 3);
        ret(&mut h, 0, QueueRet::EnqueueOk);
        deq(&mut h, 0);
        ret(&mut h, 0, QueueRet::DequeueOk(Some(3)));
        enq(&mut h, 0, 5);
        ret(&mut h, 0, QueueRet::EnqueueOk);
        assert_eq!(solve(&h), Verdict::Success);
    }

    #[test]
    fn rejects_sequential_lifo_history() {
        let mut h = QueueHistory::new();
        enq(&mut h, 0, 1);
        ret(&mut h, 0, QueueRet::EnqueueOk);
        enq(&mut h, 0, 2);
        ret(&mut h, 0, QueueRet::EnqueueOk);
        deq(&mut h, 0);
        ret(&mut h, 0, QueueRet::DequeueOk(Some(2)));

        let verdict = solve(&h);
        let diagnostics = verdict.diagnostics().expect("failure");
        assert_eq!(diagnostics.furthest, 5);
        assert_eq!(
            diagnostics.process(0.into()).unwrap().rejected,
            vec![QueueRet::DequeueOk(Some(1))]
        );
        assert_eq!(diagnostics.prefix(h.events()).len(), 6);
    }

    #[test]
    fn linearizes_overlapping_operations_in_either_order() {
        // P1's dequeue overlaps P0's enqueue, so it may observe the element...
        let mut h = QueueHistory::new();
        enq(&mut h, 0, 7);
        deq(&mut h, 1);
        ret(&mut h, 1, QueueRet::DequeueOk(Some(7)));
        ret(&mut h, 0, QueueRet::EnqueueOk);
        assert_eq!(solve(&h), Verdict::Success);

        // ...or miss it.
        let mut h = QueueHistory::new();
        enq(&mut h, 0, 7);
        deq(&mut h, 1);
        ret(&mut h, 1, QueueRet::DequeueOk(None));
        ret(&mut h, 0, QueueRet::EnqueueOk);
        assert_eq!(solve(&h), Verdict::Success);
    }

    #[test]
    fn rejects_stale_read_after_completed_write() {
        let mut h = QueueHistory::new();
        enq(&mut h, 0, 7);
        ret(&mut h, 0, QueueRet::EnqueueOk);
        deq(&mut h, 1);
        ret(&mut h, 1, QueueRet::DequeueOk(None));
        assert!(matches!(solve(&h), Verdict::Failure(_)));
    }

    #[test]
    fn explores_every_firing_order() {
        // Both enqueues overlap the dequeue, which observed 2. Only the order that fires P1 before
        // P0 works, and the scan for P2's return reaches P0 first.
        let mut h = QueueHistory::new();
        enq(&mut h, 0, 1);
        enq(&mut h, 1, 2);
        deq(&mut h, 2);
        ret(&mut h, 2, QueueRet::DequeueOk(Some(2)));
        ret(&mut h, 0, QueueRet::EnqueueOk);
        ret(&mut h, 1, QueueRet::EnqueueOk);
        assert_eq!(solve(&h), Verdict::Success);
    }

    #[test]
    fn rejects_fifo_violation_across_processes() {
        let mut h = QueueHistory::new();
        enq(&mut h, 0, 1);
        ret(&mut h, 0, QueueRet::EnqueueOk);
        enq(&mut h, 1, 2);
        ret(&mut h, 1, QueueRet::EnqueueOk);
        deq(&mut h, 0);
        deq(&mut h, 1);
        ret(&mut h, 0, QueueRet::DequeueOk(Some(2)));
        ret(&mut h, 1, QueueRet::DequeueOk(Some(2)));
        assert!(matches!(solve(&h), Verdict::Failure(_)));
    }

    #[test]
    fn ignores_operations_that_never_returned() {
        let mut h = QueueHistory::new();
        enq(&mut h, 0, 1);
        deq(&mut h, 1);
        ret(&mut h, 1, QueueRet::DequeueOk(None));
        assert_eq!(solve(&h), Verdict::Success);
    }

    #[test]
    fn is_deterministic() {
        let mut h = QueueHistory::new();
        enq(&mut h, 0, 1);
        enq(&mut h, 1, 2);
        ret(&mut h, 1, QueueRet::EnqueueOk);
        deq(&mut h, 1);
        ret(&mut h, 0, QueueRet::EnqueueOk);
        ret(&mut h, 1, QueueRet::DequeueOk(Some(3)));

        let mut tester = LinearizabilityTester::new(Queue::default());
        let first = tester.solve(h.events()).unwrap();
        let first_steps = tester.steps();
        let second = tester.solve(h.events()).unwrap();
        assert!(matches!(first, Verdict::Failure(_)));
        assert_eq!(first, second);
        assert_eq!(first_steps, tester.steps());
    }

    #[test]
    fn out_of_steam_is_not_failure() {
        let mut h = QueueHistory::new();
        enq(&mut h, 0, 1);
        ret(&mut h, 0, QueueRet::EnqueueOk);
        deq(&mut h, 0);
        ret(&mut h, 0, QueueRet::DequeueOk(Some(1)));

        let mut generous = LinearizabilityTester::new(Queue::default()).max_steps(1_000);
        assert_eq!(generous.solve(h.events()), Ok(Verdict::Success));

        let mut stingy = LinearizabilityTester::new(Queue::default()).max_steps(1);
        let verdict = stingy.solve(h.events()).unwrap();
        assert_eq!(verdict, Verdict::OutOfSteam);
        assert!(!verdict.is_conclusive());
    }

    #[test]
    fn honors_cancellation() {
        let mut h = QueueHistory::new();
        enq(&mut h, 0, 1);
        ret(&mut h, 0, QueueRet::EnqueueOk);

        let mut tester = LinearizabilityTester::new(Queue::default());
        tester.cancel_handle().store(true, Ordering::Relaxed);
        assert_eq!(tester.solve(h.events()), Ok(Verdict::Interrupted));
        assert_eq!(tester.spec(), &Queue::default());
    }

    #[test]
    fn unwinds_when_cancelled_mid_search() {
        init_tracing();
        // Twelve overlapping enqueues admit 12! orders, and no order explains the dequeue, so
        // the search runs far longer than the cancellation delay.
        let mut h = QueueHistory::new();
        for p in 0..12 {
            enq(&mut h, p, p as u32);
        }
        for p in 0..12 {
            ret(&mut h, p, QueueRet::EnqueueOk);
        }
        deq(&mut h, 0);
        ret(&mut h, 0, QueueRet::DequeueOk(Some(99)));

        let mut tester = LinearizabilityTester::new(Queue::default());
        let cancel = tester.cancel_handle();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cancel.store(true, Ordering::Relaxed);
        });
        assert_eq!(tester.solve(h.events()), Ok(Verdict::Interrupted));
        canceller.join().unwrap();
        assert!(tester.steps() > 1);
        assert_eq!(tester.spec(), &Queue::default());
    }

    #[test]
    fn restores_reference_object_after_every_verdict() {
        let mut h = QueueHistory::new();
        enq(&mut h, 0, 1);
        deq(&mut h, 1);
        ret(&mut h, 0, QueueRet::EnqueueOk);
        enq(&mut h, 0, 2);
        ret(&mut h, 1, QueueRet::DequeueOk(Some(1)));

        let initial: Queue<u32> = [9].into_iter().collect();
        let mut tester = LinearizabilityTester::new(initial.clone());
        // 9 is dequeued first, so this history fails against the non-empty queue.
        assert!(matches!(tester.solve(h.events()), Ok(Verdict::Failure(_))));
        assert_eq!(tester.spec(), &initial);

        let mut tester = LinearizabilityTester::new(Queue::default());
        assert_eq!(tester.solve(h.events()), Ok(Verdict::Success));
        assert_eq!(tester.spec(), &Queue::default());

        let mut tester = LinearizabilityTester::new(Queue::default()).max_steps(6);
        assert_eq!(tester.solve(h.events()), Ok(Verdict::OutOfSteam));
        assert_eq!(tester.spec(), &Queue::default());
    }

    #[test]
    fn checks_registers() {
        let mut h = History::new();
        h.on_invoke(0.into(), "write(A)", RegisterOp::Write('A'))
            .unwrap()
            .on_invoke(1.into(), "read()", RegisterOp::Read)
            .unwrap()
            .on_return(1.into(), RegisterRet::ReadOk('A'))
            .unwrap()
            .on_invoke(2.into(), "read()", RegisterOp::Read)
            .unwrap()
            .on_return(2.into(), RegisterRet::ReadOk('?'))
            .unwrap()
            .on_return(0.into(), RegisterRet::WriteOk)
            .unwrap();
        let mut tester = LinearizabilityTester::new(Register::new('?'));
        let verdict = tester.solve(h.events()).unwrap();
        // P2 read the initial value after P1 already observed the write.
        let diagnostics = verdict.diagnostics().expect("failure");
        assert_eq!(diagnostics.furthest, 4);
        assert_eq!(
            diagnostics.process(2.into()).unwrap().rejected,
            vec![RegisterRet::ReadOk('A')]
        );
    }

    #[test]
    fn reports_malformed_histories() {
        let events = vec![Event::Return {
            process: ProcessId::from(0),
            result: Some(QueueRet::<u32>::EnqueueOk),
        }];
        let mut tester = LinearizabilityTester::new(Queue::default());
        assert_eq!(
            tester.solve(&events),
            Err(SearchError::ReturnWithoutInvocation {
                index: 0,
                process: 0.into()
            })
        );

        let events = vec![
            Event::Invoke {
                process: ProcessId::from(0),
                label: "dequeue()".into(),
                op: QueueOp::<u32>::Dequeue,
                expected: None,
            },
            Event::Invoke {
                process: ProcessId::from(0),
                label: "dequeue()".into(),
                op: QueueOp::Dequeue,
                expected: None,
            },
        ];
        assert_eq!(
            tester.solve(&events),
            Err(SearchError::AlreadyPending {
                index: 1,
                process: 0.into()
            })
        );
    }

    #[test]
    fn surfaces_broken_undo() {
        struct Forgetful;
        impl SequentialSpec for Forgetful {
            type Op = ();
            type Ret = bool;
            fn apply(&mut self, _op: &()) -> bool {
                true
            }
            fn undo(&mut self) -> Result<(), EmptyUndoLog> {
                Err(EmptyUndoLog)
            }
        }

        let mut h = History::new();
        h.on_invret(0.into(), "op()", (), false).unwrap();
        let mut tester = LinearizabilityTester::new(Forgetful);
        assert_eq!(
            tester.solve(h.events()),
            Err(SearchError::EmptyUndoLog {
                index: 1,
                source: EmptyUndoLog
            })
        );
    }

    proptest! {
        #[test]
        fn accepts_any_sequential_history(
            ops in proptest::collection::vec(
                (0..3usize, prop_oneof![any::<u8>().prop_map(QueueOp::Enqueue), Just(QueueOp::Dequeue)]),
                0..24,
            ),
        ) {
            let mut reference = Queue::<u8>::default();
            let mut h = History::new();
            for (p, op) in ops {
                let ret = reference.apply(&op);
                h.on_invret(p.into(), format!("{op:?}"), op, ret).unwrap();
            }
            let mut tester = LinearizabilityTester::new(Queue::default());
            prop_assert_eq!(tester.solve(h.events()), Ok(Verdict::Success));
            prop_assert_eq!(tester.spec(), &Queue::default());
        }
    }
}
