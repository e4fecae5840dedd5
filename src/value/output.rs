use super::delta::SetDelta;
use crate::error::{GraphError, GraphResult};
use crate::ids::NodeId;
use crate::time::EngineTime;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

/// A reference-counted handle to any time-series output. Every edge in a
/// wired graph ultimately points at one of these; inputs hold the handle
/// directly rather than re-walking a path on every read.
pub type OutputHandle = Rc<RefCell<dyn TsOutput>>;

/// Shared bookkeeping carried by every leaf output: scalar, set and
/// reference outputs own one directly. Bundle and list outputs derive
/// `valid`/`last_modified` from their children instead (see their
/// `TsOutput` impls) and so have no header of their own.
#[derive(Clone, Copy, Debug, Default)]
pub struct OutputHeader {
    valid: bool,
    last_modified: EngineTime,
}

impl OutputHeader {
    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn last_modified(&self) -> EngineTime {
        self.last_modified
    }

    pub fn mark_modified(&mut self, at: EngineTime) {
        self.valid = true;
        self.last_modified = at;
    }

    pub fn mark_invalid(&mut self) {
        self.valid = false;
        self.last_modified = EngineTime::MIN_DT;
    }
}

/// Common, object-safe surface shared by every shape an output can take.
/// Dispatch stays on this single non-generic trait; typed access to a
/// concrete shape (`ScalarOutput<T>`, `SetOutput<T>`) goes through
/// `as_any`/`as_any_mut` downcasting, which keeps the trait itself free of
/// generic methods and so usable as `dyn TsOutput`.
pub trait TsOutput: fmt::Debug {
    fn valid(&self) -> bool;
    fn last_modified(&self) -> EngineTime;
    fn mark_invalid(&mut self);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn modified_at(&self, now: EngineTime) -> bool {
        self.valid() && self.last_modified() == now
    }
}

fn downcast_output<T: 'static>(handle: &OutputHandle, node: &NodeId, what: &'static str) -> GraphResult<()> {
    if handle.borrow().as_any().is::<T>() {
        Ok(())
    } else {
        Err(GraphError::InvalidPath {
            what,
            node: node.clone(),
            path: Vec::new(),
        })
    }
}

#[derive(Debug, Default)]
pub struct ScalarOutput<T: Clone + fmt::Debug + 'static> {
    header: OutputHeader,
    value: Option<T>,
}

impl<T: Clone + fmt::Debug + 'static> ScalarOutput<T> {
    pub fn new() -> Self {
        Self {
            header: OutputHeader::default(),
            value: None,
        }
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn apply_result(&mut self, value: T, at: EngineTime) {
        self.value = Some(value);
        self.header.mark_modified(at);
    }
}

impl<T: Clone + fmt::Debug + 'static> TsOutput for ScalarOutput<T> {
    fn valid(&self) -> bool {
        self.header.valid()
    }

    fn last_modified(&self) -> EngineTime {
        self.header.last_modified()
    }

    fn mark_invalid(&mut self) {
        self.header.mark_invalid();
        self.value = None;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct SetOutput<T: Eq + Hash + Clone + fmt::Debug + 'static> {
    header: OutputHeader,
    value: HashSet<T>,
    delta: Option<SetDelta<T>>,
}

impl<T: Eq + Hash + Clone + fmt::Debug + 'static> Default for SetOutput<T> {
    fn default() -> Self {
        Self {
            header: OutputHeader::default(),
            value: HashSet::new(),
            delta: None,
        }
    }
}

impl<T: Eq + Hash + Clone + fmt::Debug + 'static> SetOutput<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> &HashSet<T> {
        &self.value
    }

    /// The delta applied in the tick at `now`, or `None` if the set didn't
    /// tick then. Gated on `modified_at` rather than cleared by a separate
    /// per-tick housekeeping call, so a consumer reading an old tick's
    /// delta after the fact never sees it as current.
    pub fn delta_value(&self, now: EngineTime) -> Option<&SetDelta<T>> {
        if self.modified_at(now) {
            self.delta.as_ref()
        } else {
            None
        }
    }

    /// Applies a delta of adds/removes relative to the current set,
    /// clamping against elements already present/absent so a redundant
    /// add or remove never reports as a change. Errors if the same
    /// element is both added and removed in one tick.
    pub fn apply_result(&mut self, delta: SetDelta<T>, at: EngineTime) -> anyhow::Result<()> {
        if delta.added.intersection(&delta.removed).next().is_some() {
            anyhow::bail!("set delta adds and removes the same element in one tick");
        }
        let added: HashSet<T> = delta.added.into_iter().filter(|e| !self.value.contains(e)).collect();
        let removed: HashSet<T> = delta.removed.into_iter().filter(|e| self.value.contains(e)).collect();
        let was_valid = self.header.valid();
        let changed = !added.is_empty() || !removed.is_empty();

        for e in &added {
            self.value.insert(e.clone());
        }
        for e in &removed {
            self.value.remove(e);
        }

        if changed || !was_valid {
            self.header.mark_modified(at);
        }
        self.delta = Some(SetDelta { added, removed });
        Ok(())
    }

    /// Explicitly discards the stored delta, independent of `now`. Not
    /// required for correct reads — `delta_value` already gates on
    /// `modified_at` — but useful for a test or adapter that wants to
    /// assert no delta is carried forward without waiting for the clock
    /// to move past it.
    pub fn clear_delta(&mut self) {
        self.delta = None;
    }
}

impl<T: Eq + Hash + Clone + fmt::Debug + 'static> TsOutput for SetOutput<T> {
    fn valid(&self) -> bool {
        self.header.valid()
    }

    fn last_modified(&self) -> EngineTime {
        self.header.last_modified()
    }

    fn mark_invalid(&mut self) {
        self.header.mark_invalid();
        self.value.clear();
        self.delta = None;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Fixed-schema mapping of field name to child output. Carries no header
/// of its own: `valid`/`last_modified` are derived from children, so a
/// bundle is "modified" in a tick exactly when any field ticked in it,
/// matching a peered input's one-hop delegation to this same output.
#[derive(Debug)]
pub struct BundleOutput {
    fields: Vec<(String, OutputHandle)>,
}

impl BundleOutput {
    pub fn new(fields: Vec<(String, OutputHandle)>) -> Self {
        Self { fields }
    }

    pub fn child(&self, name: &str) -> Option<OutputHandle> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &OutputHandle)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl TsOutput for BundleOutput {
    fn valid(&self) -> bool {
        self.fields.iter().any(|(_, o)| o.borrow().valid())
    }

    fn last_modified(&self) -> EngineTime {
        self.fields
            .iter()
            .map(|(_, o)| o.borrow().last_modified())
            .max()
            .unwrap_or(EngineTime::MIN_DT)
    }

    fn mark_invalid(&mut self) {
        for (_, o) in &self.fields {
            o.borrow_mut().mark_invalid();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Positionally-indexed sibling of [`BundleOutput`] for the TSL shape.
#[derive(Debug)]
pub struct ListOutput {
    elements: Vec<OutputHandle>,
}

impl ListOutput {
    pub fn new(elements: Vec<OutputHandle>) -> Self {
        Self { elements }
    }

    pub fn child(&self, index: usize) -> Option<OutputHandle> {
        self.elements.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> impl Iterator<Item = &OutputHandle> {
        self.elements.iter()
    }
}

impl TsOutput for ListOutput {
    fn valid(&self) -> bool {
        self.elements.iter().any(|o| o.borrow().valid())
    }

    fn last_modified(&self) -> EngineTime {
        self.elements
            .iter()
            .map(|o| o.borrow().last_modified())
            .max()
            .unwrap_or(EngineTime::MIN_DT)
    }

    fn mark_invalid(&mut self) {
        for o in &self.elements {
            o.borrow_mut().mark_invalid();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Carries either no target or an indirection to another output. A chain
/// of references is resolved transitively by `resolve`, so a consumer
/// bound to a reference never has to know how many hops deep the real
/// value lives.
#[derive(Debug, Default)]
pub struct ReferenceOutput {
    header: OutputHeader,
    target: Option<OutputHandle>,
}

impl ReferenceOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<&OutputHandle> {
        self.target.as_ref()
    }

    pub fn apply_result(&mut self, target: Option<OutputHandle>, at: EngineTime) {
        self.target = target;
        self.header.mark_modified(at);
    }

    /// Follows the chain of references to the first non-reference output,
    /// or `None` if the chain ends empty.
    pub fn resolve(&self) -> Option<OutputHandle> {
        let mut current = self.target.clone();
        loop {
            let handle = current.take()?;
            let next = {
                let borrowed = handle.borrow();
                borrowed.as_any().downcast_ref::<ReferenceOutput>().map(|r| r.target.clone())
            };
            match next {
                Some(inner) => current = inner,
                None => return Some(handle),
            }
        }
    }
}

impl TsOutput for ReferenceOutput {
    fn valid(&self) -> bool {
        self.header.valid()
    }

    fn last_modified(&self) -> EngineTime {
        self.header.last_modified()
    }

    fn mark_invalid(&mut self) {
        self.header.mark_invalid();
        self.target = None;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Walks `path` from `root`, descending into bundle/list children by
/// name/index. An empty path returns `root` itself.
pub fn resolve_output_path(root: OutputHandle, path: &[String], node: &NodeId) -> GraphResult<OutputHandle> {
    let mut current = root;
    for (depth, segment) in path.iter().enumerate() {
        let next = {
            let borrowed = current.borrow();
            if let Some(bundle) = borrowed.as_any().downcast_ref::<BundleOutput>() {
                bundle.child(segment)
            } else if let Some(list) = borrowed.as_any().downcast_ref::<ListOutput>() {
                segment.parse::<usize>().ok().and_then(|i| list.child(i))
            } else {
                None
            }
        };
        current = next.ok_or_else(|| GraphError::InvalidPath {
            what: "output",
            node: node.clone(),
            path: path[..=depth].to_vec(),
        })?;
    }
    Ok(current)
}

#[allow(dead_code)]
fn assert_downcastable<T: 'static>(handle: &OutputHandle, node: &NodeId) -> GraphResult<()> {
    downcast_output::<T>(handle, node, "output")
}
