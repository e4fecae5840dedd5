use crate::context::ExecutionContext;
use crate::error::GraphResult;
use crate::graph::Graph;
use crate::observer::{LifecycleObserver, NullObserver};
use crate::scheduler::Scheduler;
use crate::time::EngineTime;
use std::cell::Cell;
use std::rc::Rc;

/// Which kind of `ExecutionContext` is driving a run. Purely descriptive
/// — the engine's control flow is identical either way, since both
/// implement the same trait; this exists for observers/logging that
/// want to report which mode a run is in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunMode {
    BackTest,
    RealTime,
}

/// A cloneable, same-thread handle that can ask a running engine to stop
/// before its configured end time. Built on `Rc<Cell<bool>>` rather than
/// an atomic: the engine's node graph is `Rc`-based throughout and was
/// never going to be `Send`, so there's no reason to pay for atomics
/// here. Cross-thread shutdown (e.g. a Ctrl-C handler) needs its own
/// channel wired into a push source the same way any other external
/// event would be.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Rc<Cell<bool>>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.set(true);
    }

    pub fn is_requested(&self) -> bool {
        self.0.get()
    }
}

/// Drives one `Graph` through its full lifecycle: initialise, start, a
/// sequence of `evaluate_graph` ticks interleaved with the execution
/// context's notion of "what's next", then stop — the stop phase runs on
/// every exit from `run`, success, error, or panic, via a scope guard.
pub struct GraphEngine<C: ExecutionContext> {
    graph: Graph,
    ctx: C,
    observer: Box<dyn LifecycleObserver>,
    scheduler: Scheduler,
    dirty: Vec<bool>,
    stop: StopHandle,
    run_mode: RunMode,
}

impl<C: ExecutionContext> GraphEngine<C> {
    pub fn new(graph: Graph, ctx: C, run_mode: RunMode) -> Self {
        let node_count = graph.len();
        let mut scheduler = Scheduler::new(node_count);

        // A node with no input has nothing upstream to mark it dirty, so
        // without an explicit wake-up it would never run at all. Seed
        // every such node (pull generators, free-running timers, ...) to
        // MIN_DT so it's eligible at the earliest tick; a caller wanting
        // a later first tick can still override with `schedule` before
        // `run`, since that call happens after this one and simply
        // overwrites the slot. A node with an input is left alone here —
        // it only becomes eligible through active-input propagation, and
        // auto-scheduling it too would fire it once on a phantom tick
        // before any of its inputs are valid.
        for &i in graph.eval_order() {
            if graph.node(i).borrow().input_root().is_none() {
                scheduler.set(i, EngineTime::MIN_DT);
            }
        }

        Self {
            graph,
            ctx,
            observer: Box::new(NullObserver),
            scheduler,
            dirty: vec![false; node_count],
            stop: StopHandle::default(),
            run_mode,
        }
    }

    pub fn with_observer(mut self, observer: impl LifecycleObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Requests that node `index` be evaluated again at `at`. Exposed so
    /// test harnesses and push-source adapters can schedule nodes
    /// without going through a `NodeContext` (which only exists inside a
    /// live lifecycle call).
    pub fn schedule(&mut self, index: usize, at: EngineTime) {
        self.scheduler.set(index, at);
    }

    /// Runs from the context's current time through `end_time`
    /// inclusive. `start_time` must already be reflected in `ctx` before
    /// calling this (the context owns its own clock).
    pub fn run(&mut self, end_time: EngineTime) -> GraphResult<()> {
        if end_time < self.ctx.current_engine_time() {
            return Err(crate::error::GraphError::InvalidTimeRange {
                start: self.ctx.current_engine_time(),
                end: end_time,
            });
        }

        let now0 = self.ctx.current_engine_time();
        self.graph.initialise_all(now0)?;

        // The guard is constructed before `start_all` runs, not after, so
        // a node that fails partway through starting still gets `stop_all`
        // invoked on unwind via `?` — otherwise nodes started earlier in
        // that same loop would never see a matching stop.
        let mut guard = scopeguard::guard(self, |engine| {
            let now = engine.ctx.current_engine_time();
            engine.observer.on_before_stop(now);
            let observer = engine.observer.as_mut();
            if let Err(err) = engine.graph.stop_all(now, observer) {
                log::error!("error stopping graph during shutdown: {err}");
            }
            engine.observer.on_after_stop(now);
        });

        // Reborrow once into a plain `&mut` so the observer and the graph
        // can be split into disjoint field borrows for the call below —
        // going through `guard`'s own `DerefMut` impl a second time while
        // the first borrow is still live would fight the borrow checker.
        let engine: &mut GraphEngine<C> = &mut **guard;
        engine.observer.on_before_start(now0);
        engine.graph.start_all(now0, engine.observer.as_mut())?;
        engine.observer.on_after_start(now0);

        loop {
            if guard.stop.is_requested() {
                guard.ctx.force_time(end_time);
                break;
            }
            let now = guard.ctx.current_engine_time();
            if now > end_time {
                break;
            }
            guard.evaluate_graph(now)?;
            if guard.stop.is_requested() {
                guard.ctx.force_time(end_time);
                break;
            }
            let proposed = guard.scheduler.proposed_next_engine_time();
            match guard.ctx.advance(proposed, end_time)? {
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }

    /// The context's current notion of engine time. Exposed so callers
    /// (and tests) can confirm a run that ended via `request_stop` still
    /// left the clock at `end_time` rather than wherever the last
    /// completed tick happened to land.
    pub fn current_engine_time(&self) -> EngineTime {
        self.ctx.current_engine_time()
    }

    /// One tick: drains any pending push-source data, then evaluates
    /// every non-push node whose scheduler slot equals `now` or whose
    /// active input was ticked earlier in this same pass. Rank order
    /// guarantees a producer is visited before its consumers, so a
    /// single forward sweep is enough to propagate same-tick activity —
    /// there's no second pass needed to catch a node marked dirty after
    /// we'd already walked past it.
    fn evaluate_graph(&mut self, now: EngineTime) -> GraphResult<()> {
        self.observer.on_before_evaluation(now);

        for dirty in &mut self.dirty {
            *dirty = false;
        }

        if self.ctx.take_pending_push() {
            for pos in 0..self.graph.push_source_indices().len() {
                let i = self.graph.push_source_indices()[pos];
                let ticked = {
                    let node = self.graph.node(i).clone();
                    let ticked = node.borrow_mut().eval(now)?;
                    node.borrow_mut().take_pending_schedule();
                    ticked
                };
                if ticked {
                    self.propagate(i);
                }
            }
        }

        for pos in 0..self.graph.eval_order().len() {
            let i = self.graph.eval_order()[pos];
            let was_scheduled = self.scheduler.slot(i) == now;
            let was_dirty = self.dirty[i];
            if !was_scheduled && !was_dirty {
                continue;
            }

            let node = self.graph.node(i).clone();
            self.observer.on_before_node_evaluation(now, &node);
            let ticked = node.borrow_mut().eval(now)?;
            self.observer.on_after_node_evaluation(now, &node);

            let pending = node.borrow_mut().take_pending_schedule();
            if was_scheduled {
                match pending {
                    Some(at) => self.scheduler.set(i, at),
                    None => self.scheduler.clear(i),
                }
            } else if let Some(at) = pending {
                self.scheduler.set(i, at);
            }

            if ticked {
                self.propagate(i);
            }
        }

        self.observer.on_after_evaluation(now);
        Ok(())
    }

    fn propagate(&mut self, src: usize) {
        for &(dst, active) in self.graph.downstreams(src) {
            if active {
                self.dirty[dst] = true;
            }
        }
    }
}
