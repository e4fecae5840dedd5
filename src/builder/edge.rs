use smallvec::SmallVec;

/// A path into a bundle/list output or input. Most wiring never
/// addresses more than a field or two deep, so this stays inline for
/// the common case instead of allocating.
pub type Path = SmallVec<[String; 2]>;

/// A single wire between two nodes in the same graph: the output at
/// `output_path` under `src_node`'s output root feeds the input at
/// `input_path` under `dst_node`'s input root.
///
/// `Ord` is derived in field declaration order, which is exactly the
/// canonical `(src_node, dst_node, output_path, input_path)` ordering
/// `GraphBuilder::new` requires — so a plain `edges.windows(2).all(|w| w[0]
/// <= w[1])` check is the whole validation.
#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct Edge {
    pub src_node: usize,
    pub dst_node: usize,
    pub output_path: Path,
    pub input_path: Path,
}

impl Edge {
    pub fn new(src_node: usize, dst_node: usize, output_path: Path, input_path: Path) -> Self {
        Self {
            src_node,
            dst_node,
            output_path,
            input_path,
        }
    }

    /// A root-to-root edge: neither side addresses a bundle/list field.
    pub fn direct(src_node: usize, dst_node: usize) -> Self {
        Self::new(src_node, dst_node, Path::new(), Path::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_canonical_tuple_order() {
        let a = Edge::new(0, 1, Path::new(), Path::new());
        let b = Edge::new(0, 2, Path::new(), Path::new());
        let c = Edge::new(1, 0, Path::new(), Path::new());
        assert!(a < b);
        assert!(b < c);
    }
}
