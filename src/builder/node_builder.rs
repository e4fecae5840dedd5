use crate::ids::NodeId;
use crate::node::{Node, NodeBehavior};
use crate::typemeta::TypeMeta;
use crate::value::{InputHandle, OutputHandle};
use std::fmt;
use std::rc::Rc;

/// An immutable factory for one node. `GraphBuilder::make_instance` calls
/// `make_instance` once per node the first time a graph is built, and
/// again every time a nested subgraph (switch/map) is re-instantiated
/// under a new key — so the builder itself carries no per-instance
/// state, only the closures needed to produce fresh instances.
#[derive(Clone)]
pub struct NodeBuilder {
    pub name: &'static str,
    pub input_shape: Option<TypeMeta>,
    pub output_shape: Option<TypeMeta>,
    pub is_push_source: bool,
    pub capture_exception: bool,
    /// Marks this node as one of the graph's declared outputs for
    /// `rank_nodes`'s reachability pass. Defaults to `false`; set via
    /// `as_sink()`. A builder with no sink marked at all keeps the older,
    /// permissive ranking behavior (nothing gets dropped).
    pub is_sink: bool,
    make_io: Rc<dyn Fn() -> (Option<InputHandle>, Option<OutputHandle>, Option<OutputHandle>)>,
    make_behavior: Rc<dyn Fn() -> Box<dyn NodeBehavior>>,
}

impl fmt::Debug for NodeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeBuilder").field("name", &self.name).finish_non_exhaustive()
    }
}

impl NodeBuilder {
    /// `make_io` returns `(input_root, output_root, error_output)` for a
    /// fresh instance; `make_behavior` returns the node's fresh logic.
    /// Shapes are supplied separately as `TypeMeta` rather than derived
    /// from the closures, since validating an edge's compatibility
    /// shouldn't require constructing a throwaway instance.
    pub fn new(
        name: &'static str,
        input_shape: Option<TypeMeta>,
        output_shape: Option<TypeMeta>,
        is_push_source: bool,
        capture_exception: bool,
        make_io: impl Fn() -> (Option<InputHandle>, Option<OutputHandle>, Option<OutputHandle>) + 'static,
        make_behavior: impl Fn() -> Box<dyn NodeBehavior> + 'static,
    ) -> Self {
        Self {
            name,
            input_shape,
            output_shape,
            is_push_source,
            capture_exception,
            is_sink: false,
            make_io: Rc::new(make_io),
            make_behavior: Rc::new(make_behavior),
        }
    }

    /// Marks this node as a declared graph output. See `is_sink`.
    pub fn as_sink(mut self) -> Self {
        self.is_sink = true;
        self
    }

    pub fn make_instance(&self, id: NodeId) -> Node {
        let (input_root, output_root, error_output) = (self.make_io)();
        Node::new(
            id,
            input_root,
            output_root,
            error_output,
            self.capture_exception,
            (self.make_behavior)(),
            self.is_push_source,
        )
    }
}
