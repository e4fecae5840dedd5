use super::edge::Edge;
use super::node_builder::NodeBuilder;
use crate::error::{GraphError, GraphResult};
use crate::graph::Graph;
use crate::ids::{GraphId, NodeId};
use crate::rank::rank_nodes;
use crate::time::EngineTime;
use crate::value::{resolve_input_path, resolve_output_path};

/// An immutable, reusable template for one graph: the node builders and
/// the canonical edge list between them. `make_instance` produces a
/// fresh, fully wired `Graph` each time it's called, which is what makes
/// nested switch/map subgraphs cheap to tear down and rebuild under a
/// new key.
#[derive(Debug)]
pub struct GraphBuilder {
    node_builders: Vec<NodeBuilder>,
    edges: Vec<Edge>,
}

impl GraphBuilder {
    /// Validates that `edges` is already in canonical
    /// `(src_node, dst_node, output_path, input_path)` order and that at
    /// least one node was supplied. Rejecting out-of-order edges here,
    /// rather than sorting them, keeps edge order a property the caller
    /// is responsible for — the same discipline the wiring layer that
    /// produces these edges should already be upholding.
    pub fn new(node_builders: Vec<NodeBuilder>, edges: Vec<Edge>) -> GraphResult<Self> {
        if node_builders.is_empty() {
            return Err(GraphError::NoSinkNodes);
        }
        if !edges.windows(2).all(|w| w[0] <= w[1]) {
            return Err(GraphError::EdgesNotCanonical);
        }
        Ok(Self { node_builders, edges })
    }

    pub fn node_count(&self) -> usize {
        self.node_builders.len()
    }

    /// Whether any node builder in this template is a push source. Used
    /// by nested switch/map nodes to reject an inner graph that tries to
    /// register one — a push source only makes sense wired into the
    /// context an engine's `run` loop owns, which a nested instance never
    /// is.
    pub fn contains_push_source(&self) -> bool {
        self.node_builders.iter().any(|b| b.is_push_source)
    }

    /// Constructs every node, binds every edge, and computes the
    /// rank-sorted evaluation order. Lifecycle calls (`initialise`,
    /// `start`, ...) are the `GraphEngine`'s responsibility, not this
    /// method's: a freshly made instance is wired but dormant.
    pub fn make_instance(&self, graph_id: GraphId) -> GraphResult<Graph> {
        let node_count = self.node_builders.len();
        let nodes: Vec<_> = self
            .node_builders
            .iter()
            .enumerate()
            .map(|(index, builder)| {
                std::rc::Rc::new(std::cell::RefCell::new(builder.make_instance(NodeId::new(graph_id.clone(), index))))
            })
            .collect();

        let mut downstreams: Vec<Vec<(usize, bool)>> = vec![Vec::new(); node_count];
        let mut rank_edges: Vec<(usize, usize)> = Vec::with_capacity(self.edges.len());

        for edge in &self.edges {
            let src_node_id = nodes[edge.src_node].borrow().id().clone();
            let dst_node_id = nodes[edge.dst_node].borrow().id().clone();

            let output_root = nodes[edge.src_node]
                .borrow()
                .output_root()
                .cloned()
                .ok_or_else(|| GraphError::InvalidPath {
                    what: "edge source has no output",
                    node: src_node_id.clone(),
                    path: edge.output_path.to_vec(),
                })?;
            let output = resolve_output_path(output_root, &edge.output_path, &src_node_id)?;

            let input_root = nodes[edge.dst_node]
                .borrow()
                .input_root()
                .cloned()
                .ok_or_else(|| GraphError::InvalidPath {
                    what: "edge destination has no input",
                    node: dst_node_id.clone(),
                    path: edge.input_path.to_vec(),
                })?;
            let input = resolve_input_path(input_root, &edge.input_path, &dst_node_id)?;

            let active = input.borrow().active();
            input.borrow_mut().bind_output(output)?;

            downstreams[edge.src_node].push((edge.dst_node, active));
            rank_edges.push((edge.src_node, edge.dst_node));
        }

        let push_source_indices: Vec<usize> = (0..node_count).filter(|&i| nodes[i].borrow().is_push_source()).collect();
        let sink_indices: Vec<usize> = (0..node_count).filter(|&i| self.node_builders[i].is_sink).collect();
        let ranked = rank_nodes(node_count, &rank_edges, &push_source_indices, &sink_indices)?;
        let eval_order: Vec<usize> = ranked.into_iter().filter(|i| !nodes[*i].borrow().is_push_source()).collect();

        Ok(Graph::new(graph_id, nodes, downstreams, eval_order, push_source_indices))
    }

    /// Tears an instance down: runs `dispose` on every node. Mirrors
    /// `make_instance` as the explicit counterpart nested subgraphs call
    /// when a switch/map key goes out of scope.
    pub fn release_instance(&self, graph: &Graph, now: EngineTime) -> GraphResult<()> {
        graph.dispose_all(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeBehavior, NodeContext};
    use crate::value::{OutputHandle, ScalarInput, ScalarOutput, TsInput};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug)]
    struct ConstNode(i64);
    impl NodeBehavior for ConstNode {
        fn eval(&mut self, ctx: &mut NodeContext) -> anyhow::Result<bool> {
            let out = ctx.output_root().unwrap();
            out.borrow_mut()
                .as_any_mut()
                .downcast_mut::<ScalarOutput<i64>>()
                .unwrap()
                .apply_result(self.0, ctx.now());
            Ok(true)
        }
    }

    #[derive(Debug)]
    struct PassThroughNode;
    impl NodeBehavior for PassThroughNode {
        fn eval(&mut self, ctx: &mut NodeContext) -> anyhow::Result<bool> {
            let value = {
                let input_root = ctx.input_root().unwrap().borrow();
                input_root.as_any().downcast_ref::<ScalarInput<i64>>().unwrap().value()
            };
            if let Some(v) = value {
                ctx.output_root()
                    .unwrap()
                    .borrow_mut()
                    .as_any_mut()
                    .downcast_mut::<ScalarOutput<i64>>()
                    .unwrap()
                    .apply_result(v, ctx.now());
                Ok(true)
            } else {
                Ok(false)
            }
        }
    }

    fn const_builder(value: i64) -> NodeBuilder {
        NodeBuilder::new(
            "const",
            None,
            Some(crate::typemeta::TypeMeta::scalar("i64")),
            false,
            false,
            move || {
                let out: OutputHandle = Rc::new(RefCell::new(ScalarOutput::<i64>::new()));
                (None, Some(out), None)
            },
            move || Box::new(ConstNode(value)),
        )
    }

    fn pass_through_builder() -> NodeBuilder {
        NodeBuilder::new(
            "pass_through",
            Some(crate::typemeta::TypeMeta::scalar("i64")),
            Some(crate::typemeta::TypeMeta::scalar("i64")),
            false,
            false,
            || {
                let input = Rc::new(RefCell::new(ScalarInput::<i64>::new(true))) as crate::value::InputHandle;
                let out: OutputHandle = Rc::new(RefCell::new(ScalarOutput::<i64>::new()));
                (Some(input), Some(out), None)
            },
            || Box::new(PassThroughNode),
        )
    }

    #[test]
    fn wiring_two_nodes_binds_output_to_input() {
        let builder = GraphBuilder::new(
            vec![const_builder(7), pass_through_builder()],
            vec![Edge::direct(0, 1)],
        )
        .unwrap();
        let graph = builder.make_instance(GraphId::root()).unwrap();
        assert_eq!(graph.eval_order(), &[0, 1]);

        graph.node(0).borrow_mut().eval(1.into()).unwrap();
        graph.node(1).borrow_mut().eval(1.into()).unwrap();

        let value = graph.node(1).borrow().output_root().unwrap().borrow().as_any().downcast_ref::<ScalarOutput<i64>>().unwrap().value().copied();
        assert_eq!(value, Some(7));
    }

    #[test]
    fn out_of_order_edges_are_rejected() {
        let err = GraphBuilder::new(
            vec![const_builder(1), pass_through_builder()],
            vec![
                Edge::new(1, 0, super::edge::Path::new(), super::edge::Path::new()),
                Edge::new(0, 1, super::edge::Path::new(), super::edge::Path::new()),
            ],
        );
        assert!(matches!(err, Err(GraphError::EdgesNotCanonical)));
    }

    #[test]
    fn empty_node_list_is_rejected() {
        let err = GraphBuilder::new(vec![], vec![]);
        assert!(matches!(err, Err(GraphError::NoSinkNodes)));
    }
}
