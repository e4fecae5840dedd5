use crate::graph::NodeHandle;
use crate::time::EngineTime;

/// Read-only hooks into the engine's lifecycle and evaluation loop.
/// Every method takes only shared references — an observer can inspect a
/// node's output but never mutate it, which is what keeps observation
/// safe to run interleaved with evaluation instead of requiring its own
/// copy of the graph.
pub trait LifecycleObserver {
    fn on_before_start(&mut self, _now: EngineTime) {}
    fn on_after_start(&mut self, _now: EngineTime) {}
    fn on_before_stop(&mut self, _now: EngineTime) {}
    fn on_after_stop(&mut self, _now: EngineTime) {}

    /// Per-node counterparts to the graph-level start/stop hooks above,
    /// fired once for every node `Graph::start_all`/`stop_all` visits, in
    /// the same order the nodes themselves are started/stopped.
    fn on_before_start_node(&mut self, _now: EngineTime, _node: &NodeHandle) {}
    fn on_after_start_node(&mut self, _now: EngineTime, _node: &NodeHandle) {}
    fn on_before_stop_node(&mut self, _now: EngineTime, _node: &NodeHandle) {}
    fn on_after_stop_node(&mut self, _now: EngineTime, _node: &NodeHandle) {}

    fn on_before_evaluation(&mut self, _now: EngineTime) {}
    fn on_after_evaluation(&mut self, _now: EngineTime) {}

    fn on_before_node_evaluation(&mut self, _now: EngineTime, _node: &NodeHandle) {}
    fn on_after_node_evaluation(&mut self, _now: EngineTime, _node: &NodeHandle) {}
}

/// An observer that does nothing; the engine's default when the caller
/// doesn't supply one.
#[derive(Debug, Default)]
pub struct NullObserver;

impl LifecycleObserver for NullObserver {}

/// Fans a single set of calls out to every observer in the list, in
/// order. Useful when more than one concern (logging, metrics snapshot,
/// a test harness) needs to watch the same run.
#[derive(Default)]
pub struct ObserverList(pub Vec<Box<dyn LifecycleObserver>>);

impl LifecycleObserver for ObserverList {
    fn on_before_start(&mut self, now: EngineTime) {
        for o in &mut self.0 {
            o.on_before_start(now);
        }
    }
    fn on_after_start(&mut self, now: EngineTime) {
        for o in &mut self.0 {
            o.on_after_start(now);
        }
    }
    fn on_before_stop(&mut self, now: EngineTime) {
        for o in &mut self.0 {
            o.on_before_stop(now);
        }
    }
    fn on_after_stop(&mut self, now: EngineTime) {
        for o in &mut self.0 {
            o.on_after_stop(now);
        }
    }
    fn on_before_start_node(&mut self, now: EngineTime, node: &NodeHandle) {
        for o in &mut self.0 {
            o.on_before_start_node(now, node);
        }
    }
    fn on_after_start_node(&mut self, now: EngineTime, node: &NodeHandle) {
        for o in &mut self.0 {
            o.on_after_start_node(now, node);
        }
    }
    fn on_before_stop_node(&mut self, now: EngineTime, node: &NodeHandle) {
        for o in &mut self.0 {
            o.on_before_stop_node(now, node);
        }
    }
    fn on_after_stop_node(&mut self, now: EngineTime, node: &NodeHandle) {
        for o in &mut self.0 {
            o.on_after_stop_node(now, node);
        }
    }
    fn on_before_evaluation(&mut self, now: EngineTime) {
        for o in &mut self.0 {
            o.on_before_evaluation(now);
        }
    }
    fn on_after_evaluation(&mut self, now: EngineTime) {
        for o in &mut self.0 {
            o.on_after_evaluation(now);
        }
    }
    fn on_before_node_evaluation(&mut self, now: EngineTime, node: &NodeHandle) {
        for o in &mut self.0 {
            o.on_before_node_evaluation(now, node);
        }
    }
    fn on_after_node_evaluation(&mut self, now: EngineTime, node: &NodeHandle) {
        for o in &mut self.0 {
            o.on_after_node_evaluation(now, node);
        }
    }
}
