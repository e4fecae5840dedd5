use crate::ids::{GraphId, NodeId};
use crate::node::Node;
use crate::time::EngineTime;
use std::cell::RefCell;
use std::rc::Rc;

pub type NodeHandle = Rc<RefCell<Node>>;

/// One instantiation of a wired graph: its nodes, the precomputed
/// downstream-active-edge adjacency used to propagate same-tick
/// scheduling, and the rank-sorted order `evaluate_graph` walks each
/// tick. Produced by `GraphBuilder::make_instance`, never constructed
/// directly.
#[derive(Debug)]
pub struct Graph {
    graph_id: GraphId,
    nodes: Vec<NodeHandle>,
    /// `downstreams[i]` lists, for every edge whose source is node `i`,
    /// the `(consumer_index, edge_is_active)` pair. An inactive edge is
    /// still recorded so dispose/stop ordering can walk the full edge
    /// set if ever needed, but only active edges cause same-tick
    /// scheduling in `evaluate_graph`.
    downstreams: Vec<Vec<(usize, bool)>>,
    /// Non-push node indices in `(rank, original index)` order.
    eval_order: Vec<usize>,
    push_source_indices: Vec<usize>,
}

impl Graph {
    pub(crate) fn new(
        graph_id: GraphId,
        nodes: Vec<NodeHandle>,
        downstreams: Vec<Vec<(usize, bool)>>,
        eval_order: Vec<usize>,
        push_source_indices: Vec<usize>,
    ) -> Self {
        Self {
            graph_id,
            nodes,
            downstreams,
            eval_order,
            push_source_indices,
        }
    }

    pub fn graph_id(&self) -> &GraphId {
        &self.graph_id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> &NodeHandle {
        &self.nodes[index]
    }

    pub fn node_id(&self, index: usize) -> NodeId {
        self.nodes[index].borrow().id().clone()
    }

    pub fn downstreams(&self, index: usize) -> &[(usize, bool)] {
        &self.downstreams[index]
    }

    pub fn eval_order(&self) -> &[usize] {
        &self.eval_order
    }

    pub fn push_source_indices(&self) -> &[usize] {
        &self.push_source_indices
    }

    pub fn all_indices(&self) -> std::ops::Range<usize> {
        0..self.nodes.len()
    }

    pub fn for_each_node(&self, mut f: impl FnMut(usize, &NodeHandle)) {
        for (i, node) in self.nodes.iter().enumerate() {
            f(i, node);
        }
    }

    pub fn initialise_all(&self, now: EngineTime) -> crate::error::GraphResult<()> {
        for node in &self.nodes {
            node.borrow_mut().initialise(now)?;
        }
        Ok(())
    }

    pub fn start_all(&self, now: EngineTime, observer: &mut dyn crate::observer::LifecycleObserver) -> crate::error::GraphResult<()> {
        for node in &self.nodes {
            observer.on_before_start_node(now, node);
            node.borrow_mut().start(now)?;
            observer.on_after_start_node(now, node);
        }
        Ok(())
    }

    pub fn stop_all(&self, now: EngineTime, observer: &mut dyn crate::observer::LifecycleObserver) -> crate::error::GraphResult<()> {
        for node in &self.nodes {
            observer.on_before_stop_node(now, node);
            node.borrow_mut().stop(now)?;
            observer.on_after_stop_node(now, node);
        }
        Ok(())
    }

    pub fn dispose_all(&self, now: EngineTime) -> crate::error::GraphResult<()> {
        for node in &self.nodes {
            node.borrow_mut().dispose(now)?;
        }
        Ok(())
    }
}
