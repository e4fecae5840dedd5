use crate::error::{GraphError, GraphResult};
use crate::ids::NodeId;
use crate::time::EngineTime;
use crate::value::{InputHandle, OutputHandle, ScalarOutput, TsOutput};
use std::fmt;

/// User-supplied node logic. A `NodeBuilder` wraps one of these together
/// with the input/output shapes it reads from and writes to; the runtime
/// never inspects the behavior beyond these five lifecycle calls.
pub trait NodeBehavior: fmt::Debug {
    fn initialise(&mut self, _ctx: &mut NodeContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn start(&mut self, _ctx: &mut NodeContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Evaluate at the current engine time. Returns `true` if the node's
    /// output ticked this call, which is what causes active downstream
    /// edges to schedule their consumers.
    fn eval(&mut self, ctx: &mut NodeContext) -> anyhow::Result<bool>;

    fn stop(&mut self, _ctx: &mut NodeContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn dispose(&mut self, _ctx: &mut NodeContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The view a `NodeBehavior` gets into its own node during a lifecycle
/// call: the current time, its bound input/output roots, and a one-shot
/// slot to request a future wake-up.
pub struct NodeContext<'a> {
    now: EngineTime,
    input_root: Option<&'a InputHandle>,
    output_root: Option<&'a OutputHandle>,
    pending_schedule: &'a mut Option<EngineTime>,
}

impl<'a> NodeContext<'a> {
    pub fn now(&self) -> EngineTime {
        self.now
    }

    pub fn input_root(&self) -> Option<&InputHandle> {
        self.input_root
    }

    pub fn output_root(&self) -> Option<&OutputHandle> {
        self.output_root
    }

    /// Requests that this node be evaluated again at `at`. Overwrites any
    /// earlier request made during the same call.
    pub fn schedule_at(&mut self, at: EngineTime) {
        *self.pending_schedule = Some(at);
    }

    pub fn schedule_in(&mut self, delta: EngineTime) {
        self.schedule_at(self.now + delta);
    }
}

/// A constructed, wired node: identity, bound I/O, behavior, and the
/// scratch state the engine needs to drive its lifecycle. Owned by the
/// `Graph` it belongs to.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    input_root: Option<InputHandle>,
    output_root: Option<OutputHandle>,
    error_output: Option<OutputHandle>,
    capture_exception: bool,
    behavior: Box<dyn NodeBehavior>,
    pending_schedule: Option<EngineTime>,
    is_push_source: bool,
}

impl Node {
    pub fn new(
        id: NodeId,
        input_root: Option<InputHandle>,
        output_root: Option<OutputHandle>,
        error_output: Option<OutputHandle>,
        capture_exception: bool,
        behavior: Box<dyn NodeBehavior>,
        is_push_source: bool,
    ) -> Self {
        Self {
            id,
            input_root,
            output_root,
            error_output,
            capture_exception,
            behavior,
            pending_schedule: None,
            is_push_source,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn input_root(&self) -> Option<&InputHandle> {
        self.input_root.as_ref()
    }

    pub fn output_root(&self) -> Option<&OutputHandle> {
        self.output_root.as_ref()
    }

    pub fn is_push_source(&self) -> bool {
        self.is_push_source
    }

    pub fn initialise(&mut self, now: EngineTime) -> GraphResult<()> {
        let mut ctx = NodeContext {
            now,
            input_root: self.input_root.as_ref(),
            output_root: self.output_root.as_ref(),
            pending_schedule: &mut self.pending_schedule,
        };
        self.behavior.initialise(&mut ctx).map_err(|source| GraphError::Lifecycle {
            phase: "initialise",
            node: self.id.clone(),
            source,
        })
    }

    pub fn start(&mut self, now: EngineTime) -> GraphResult<()> {
        let mut ctx = NodeContext {
            now,
            input_root: self.input_root.as_ref(),
            output_root: self.output_root.as_ref(),
            pending_schedule: &mut self.pending_schedule,
        };
        self.behavior.start(&mut ctx).map_err(|source| GraphError::Lifecycle {
            phase: "start",
            node: self.id.clone(),
            source,
        })
    }

    /// Evaluates the node, clearing any earlier schedule request first.
    /// A failure is either propagated as an error or, for nodes wired
    /// with `capture_exception`, written to the node's error output and
    /// swallowed (the node simply does not tick this call).
    pub fn eval(&mut self, now: EngineTime) -> GraphResult<bool> {
        self.pending_schedule = None;
        let result = {
            let mut ctx = NodeContext {
                now,
                input_root: self.input_root.as_ref(),
                output_root: self.output_root.as_ref(),
                pending_schedule: &mut self.pending_schedule,
            };
            self.behavior.eval(&mut ctx)
        };
        match result {
            Ok(ticked) => Ok(ticked),
            Err(source) if self.capture_exception => {
                if let Some(error_output) = &self.error_output {
                    if let Some(scalar) = error_output.borrow_mut().as_any_mut().downcast_mut::<ScalarOutput<String>>() {
                        scalar.apply_result(source.to_string(), now);
                    }
                }
                Ok(false)
            }
            Err(source) => Err(GraphError::Eval {
                node: self.id.clone(),
                source,
            }),
        }
    }

    pub fn stop(&mut self, now: EngineTime) -> GraphResult<()> {
        let mut ctx = NodeContext {
            now,
            input_root: self.input_root.as_ref(),
            output_root: self.output_root.as_ref(),
            pending_schedule: &mut self.pending_schedule,
        };
        self.behavior.stop(&mut ctx).map_err(|source| GraphError::Lifecycle {
            phase: "stop",
            node: self.id.clone(),
            source,
        })
    }

    pub fn dispose(&mut self, now: EngineTime) -> GraphResult<()> {
        let mut ctx = NodeContext {
            now,
            input_root: self.input_root.as_ref(),
            output_root: self.output_root.as_ref(),
            pending_schedule: &mut self.pending_schedule,
        };
        self.behavior.dispose(&mut ctx).map_err(|source| GraphError::Lifecycle {
            phase: "dispose",
            node: self.id.clone(),
            source,
        })
    }

    /// Consumes the schedule request (if any) made during the last
    /// `eval`/lifecycle call, so the caller can apply it to the
    /// scheduler exactly once.
    pub fn take_pending_schedule(&mut self) -> Option<EngineTime> {
        self.pending_schedule.take()
    }

    pub fn error_output(&self) -> Option<&OutputHandle> {
        self.error_output.as_ref()
    }
}
