//! Patterns built out of ordinary nodes rather than new engine
//! primitives: a feedback tap that lets a value loop back into a graph
//! without the edge list ever containing a cycle, and a scalar switch
//! node that swaps in a fresh inner graph whenever its key changes.

use crate::builder::{GraphBuilder, NodeBuilder};
use crate::error::{GraphError, GraphResult};
use crate::ids::GraphId;
use crate::node::{NodeBehavior, NodeContext};
use crate::scheduler::Scheduler;
use crate::time::EngineTime;
use crate::typemeta::TypeMeta;
use crate::value::{InputHandle, OutputHandle, ScalarInput, ScalarOutput, TsInput, TsOutput};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

struct FeedbackCell<T> {
    pending: Option<T>,
}

#[derive(Debug)]
struct FeedbackSource<T: Clone + fmt::Debug + 'static> {
    cell: Rc<RefCell<FeedbackCell<T>>>,
}

impl<T: Clone + fmt::Debug + 'static> NodeBehavior for FeedbackSource<T> {
    fn start(&mut self, ctx: &mut NodeContext) -> anyhow::Result<()> {
        ctx.schedule_at(ctx.now() + EngineTime::MIN_TD);
        Ok(())
    }

    fn eval(&mut self, ctx: &mut NodeContext) -> anyhow::Result<bool> {
        let now = ctx.now();
        ctx.schedule_at(now + EngineTime::MIN_TD);
        let pending = self.cell.borrow_mut().pending.take();
        match pending {
            Some(value) => {
                ctx.output_root()
                    .expect("feedback source always has an output")
                    .borrow_mut()
                    .as_any_mut()
                    .downcast_mut::<ScalarOutput<T>>()
                    .expect("feedback source output is always scalar")
                    .apply_result(value, now);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Debug)]
struct FeedbackSink<T: Clone + fmt::Debug + 'static> {
    cell: Rc<RefCell<FeedbackCell<T>>>,
}

impl<T: Clone + fmt::Debug + 'static> NodeBehavior for FeedbackSink<T> {
    fn eval(&mut self, ctx: &mut NodeContext) -> anyhow::Result<bool> {
        let now = ctx.now();
        let value = ctx.input_root().and_then(|input| {
            let borrowed = input.borrow();
            let scalar = borrowed.as_any().downcast_ref::<ScalarInput<T>>()?;
            if scalar.modified(now) {
                scalar.value()
            } else {
                None
            }
        });
        if let Some(v) = value {
            self.cell.borrow_mut().pending = Some(v);
        }
        Ok(false)
    }
}

/// Builds a feedback pair: `(source, sink)`. Wire `source`'s output
/// wherever the looped-back value is consumed, and wire the
/// loop-closing producer's output into `sink`'s input. The sink writes
/// into a cell the source polls on the following tick — one tick later,
/// never the same tick — which is what breaks the cycle the edge list
/// would otherwise contain.
///
/// The cell is captured once, at the call site, and shared by both
/// returned builders. That's fine for a graph built once via
/// `GraphBuilder::make_instance` and run for its lifetime (the usual
/// case), but it means two *separate* `Graph` instances built from
/// builders containing the same feedback pair — e.g. two
/// re-instantiations of a nested switch/map subgraph — would share
/// feedback state across instances. Call `feedback` fresh for each
/// subgraph template instead of hoisting it outside the `build_inner`
/// closure if that applies.
pub fn feedback<T: Clone + fmt::Debug + 'static>(shape: TypeMeta) -> (NodeBuilder, NodeBuilder) {
    let cell: Rc<RefCell<FeedbackCell<T>>> = Rc::new(RefCell::new(FeedbackCell { pending: None }));

    let source_cell = cell.clone();
    let source = NodeBuilder::new(
        "feedback_source",
        None,
        Some(shape.clone()),
        false,
        false,
        || {
            let out: OutputHandle = Rc::new(RefCell::new(ScalarOutput::<T>::new()));
            (None, Some(out), None)
        },
        move || Box::new(FeedbackSource { cell: source_cell.clone() }) as Box<dyn NodeBehavior>,
    );

    let sink_cell = cell;
    let sink = NodeBuilder::new(
        "feedback_sink",
        Some(shape),
        None,
        false,
        false,
        || {
            let input: InputHandle = Rc::new(RefCell::new(ScalarInput::<T>::new(true)));
            (Some(input), None, None)
        },
        move || Box::new(FeedbackSink { cell: sink_cell.clone() }) as Box<dyn NodeBehavior>,
    );

    (source, sink)
}

/// A scalar-keyed switch node: reads a key of type `K` from its own
/// input, and whenever that key changes, tears down the current inner
/// graph (if any) and instantiates a fresh one from `build_inner(key)`.
/// The inner graph's node `0` must accept an `I`-shaped scalar input
/// (the value this node mirrors in from its own upstream each tick) and
/// node `output_index` must expose the `O`-shaped scalar output this
/// node republishes as its own.
///
/// Scoped to scalar `I`/`O`: a fully general version would need a
/// value-shape-directed copy between arbitrary `TypeMeta` trees, which
/// the rest of the runtime supports but this convenience node does not
/// attempt — callers with bundle/list-shaped switch payloads can follow
/// the same pattern with their own `NodeBehavior`.
pub struct ScalarSwitchNode<K, I, O>
where
    K: Eq + Clone + fmt::Debug + 'static,
    I: Clone + fmt::Debug + 'static,
    O: Clone + fmt::Debug + 'static,
{
    self_index: usize,
    output_index: usize,
    build_inner: Box<dyn Fn(&K) -> GraphResult<GraphBuilder>>,
    reload_on_ticked: bool,
    /// The live inner graph plus its own scheduler and dirty flags —
    /// the same pair `GraphEngine` keeps for the outer graph, since this
    /// node is effectively running a miniature engine tick for the inner
    /// graph on every outer eval rather than re-walking every inner node
    /// unconditionally.
    instance: Option<(K, crate::graph::Graph, Scheduler, Vec<bool>)>,
    generation: u64,
    _marker: std::marker::PhantomData<(I, O)>,
}

impl<K, I, O> fmt::Debug for ScalarSwitchNode<K, I, O>
where
    K: Eq + Clone + fmt::Debug + 'static,
    I: Clone + fmt::Debug + 'static,
    O: Clone + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarSwitchNode")
            .field("self_index", &self.self_index)
            .field("current_key", &self.instance.as_ref().map(|(k, ..)| k))
            .finish()
    }
}

impl<K, I, O> ScalarSwitchNode<K, I, O>
where
    K: Eq + Clone + fmt::Debug + 'static,
    I: Clone + fmt::Debug + 'static,
    O: Clone + fmt::Debug + 'static,
{
    pub fn new(
        self_index: usize,
        output_index: usize,
        reload_on_ticked: bool,
        build_inner: impl Fn(&K) -> GraphResult<GraphBuilder> + 'static,
    ) -> Self {
        Self {
            self_index,
            output_index,
            build_inner: Box::new(build_inner),
            reload_on_ticked,
            instance: None,
            generation: 0,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<K, I, O> NodeBehavior for ScalarSwitchNode<K, I, O>
where
    K: Eq + Clone + fmt::Debug + 'static,
    I: Clone + fmt::Debug + 'static,
    O: Clone + fmt::Debug + 'static,
{
    fn eval(&mut self, ctx: &mut NodeContext) -> anyhow::Result<bool> {
        let now = ctx.now();

        let key_input = ctx
            .input_root()
            .and_then(|i| i.borrow().as_any().downcast_ref::<ScalarInput<K>>().and_then(|s| s.value()));
        let Some(key) = key_input else {
            return Ok(false);
        };

        let key_changed = self.instance.as_ref().map(|(k, ..)| k != &key).unwrap_or(true);
        if key_changed {
            if let Some((_, old_graph, ..)) = self.instance.take() {
                old_graph.stop_all(now, &mut crate::observer::NullObserver)?;
                old_graph.dispose_all(now)?;
            }
            let builder = (self.build_inner)(&key)?;
            if builder.contains_push_source() {
                return Err(GraphError::PushSourceNotSupported.into());
            }
            let graph_id = GraphId::root().nested(self.self_index, self.generation);
            self.generation += 1;
            let graph = builder.make_instance(graph_id)?;
            graph.initialise_all(now)?;
            graph.start_all(now, &mut crate::observer::NullObserver)?;

            let node_count = graph.len();
            let mut scheduler = Scheduler::new(node_count);
            for &i in graph.eval_order() {
                if graph.node(i).borrow().input_root().is_none() {
                    scheduler.set(i, EngineTime::MIN_DT);
                }
            }
            let dirty = vec![false; node_count];
            self.instance = Some((key, graph, scheduler, dirty));
        }

        let Some((_, graph, scheduler, dirty)) = &mut self.instance else {
            return Ok(false);
        };

        for d in dirty.iter_mut() {
            *d = false;
        }

        if key_changed || self.reload_on_ticked {
            if let Some(input_root) = ctx.input_root() {
                if let Some(upstream_value) = input_root
                    .borrow()
                    .as_any()
                    .downcast_ref::<ScalarInput<I>>()
                    .and_then(|s| s.value())
                {
                    if let Some(stub_output) = graph.node(0).borrow().output_root() {
                        stub_output
                            .borrow_mut()
                            .as_any_mut()
                            .downcast_mut::<ScalarOutput<I>>()
                            .expect("switch inner node 0 must expose a scalar output of the mirrored input type")
                            .apply_result(upstream_value, now);
                    }
                    // Node 0 is written to directly rather than evaluated,
                    // so its downstreams need marking dirty by hand — the
                    // same propagation `GraphEngine::propagate` does for a
                    // node whose `eval` returned true.
                    for &(dst, active) in graph.downstreams(0) {
                        if active {
                            dirty[dst] = true;
                        }
                    }
                }
            }
        }

        for pos in 0..graph.eval_order().len() {
            let i = graph.eval_order()[pos];
            let was_scheduled = scheduler.slot(i) == now;
            let was_dirty = dirty[i];
            if !was_scheduled && !was_dirty {
                continue;
            }

            let node = graph.node(i).clone();
            let ticked = node.borrow_mut().eval(now)?;
            let pending = node.borrow_mut().take_pending_schedule();
            if was_scheduled {
                match pending {
                    Some(at) => scheduler.set(i, at),
                    None => scheduler.clear(i),
                }
            } else if let Some(at) = pending {
                scheduler.set(i, at);
            }

            if ticked {
                for &(dst, active) in graph.downstreams(i) {
                    if active {
                        dirty[dst] = true;
                    }
                }
            }
        }

        let ticked = graph
            .node(self.output_index)
            .borrow()
            .output_root()
            .map(|o| o.borrow().modified_at(now))
            .unwrap_or(false);

        if ticked {
            if let Some(value) = graph
                .node(self.output_index)
                .borrow()
                .output_root()
                .and_then(|o| o.borrow().as_any().downcast_ref::<ScalarOutput<O>>().and_then(|s| s.value().cloned()))
            {
                ctx.output_root()
                    .expect("switch node always has an output")
                    .borrow_mut()
                    .as_any_mut()
                    .downcast_mut::<ScalarOutput<O>>()
                    .expect("switch node output is always scalar")
                    .apply_result(value, now);
            }
        }

        Ok(ticked)
    }

    fn stop(&mut self, ctx: &mut NodeContext) -> anyhow::Result<()> {
        if let Some((_, graph, ..)) = &self.instance {
            graph.stop_all(ctx.now(), &mut crate::observer::NullObserver)?;
        }
        Ok(())
    }

    fn dispose(&mut self, ctx: &mut NodeContext) -> anyhow::Result<()> {
        if let Some((_, graph, ..)) = self.instance.take() {
            graph.dispose_all(ctx.now())?;
        }
        Ok(())
    }
}
