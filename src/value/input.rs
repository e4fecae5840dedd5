use super::delta::SetDelta;
use super::output::{BundleOutput, ListOutput, OutputHandle, ReferenceOutput, ScalarOutput, SetOutput, TsOutput};
use crate::error::{GraphError, GraphResult};
use crate::ids::NodeId;
use crate::time::EngineTime;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::rc::Rc;

pub type InputHandle = Rc<RefCell<dyn TsInput>>;

/// An active input causes its owning node to be scheduled for evaluation
/// whenever its bound output ticks; a passive input only ever contributes
/// a value when the node is evaluated for some other reason. Set once by
/// the node builder at construction.
#[derive(Clone, Copy, Debug, Default)]
pub struct InputHeader {
    active: bool,
}

impl InputHeader {
    pub fn new(active: bool) -> Self {
        Self { active }
    }
}

/// Common, object-safe surface shared by every input shape. As with
/// `TsOutput`, typed value access goes through `as_any` downcasting so the
/// trait itself stays non-generic and usable as `dyn TsInput`.
pub trait TsInput: fmt::Debug {
    fn valid(&self) -> bool;
    fn modified(&self, now: EngineTime) -> bool;
    fn active(&self) -> bool;
    fn set_active(&mut self, active: bool);
    fn bind_output(&mut self, output: OutputHandle) -> GraphResult<()>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

fn expect_shape<T: 'static>(output: &OutputHandle, node: &NodeId, what: &'static str) -> GraphResult<()> {
    if output.borrow().as_any().is::<T>() {
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
pub struct ScalarInput<T: Clone + fmt::Debug + 'static> {
    header: InputHeader,
    output: Option<OutputHandle>,
    _marker: PhantomData<T>,
}

impl<T: Clone + fmt::Debug + 'static> ScalarInput<T> {
    pub fn new(active: bool) -> Self {
        Self {
            header: InputHeader::new(active),
            output: None,
            _marker: PhantomData,
        }
    }

    pub fn value(&self) -> Option<T> {
        self.output.as_ref().and_then(|o| {
            o.borrow().as_any().downcast_ref::<ScalarOutput<T>>().and_then(|s| s.value().cloned())
        })
    }
}

impl<T: Clone + fmt::Debug + 'static> TsInput for ScalarInput<T> {
    fn valid(&self) -> bool {
        self.output.as_ref().map(|o| o.borrow().valid()).unwrap_or(false)
    }

    fn modified(&self, now: EngineTime) -> bool {
        self.output.as_ref().map(|o| o.borrow().modified_at(now)).unwrap_or(false)
    }

    fn active(&self) -> bool {
        self.header.active
    }

    fn set_active(&mut self, active: bool) {
        self.header.active = active;
    }

    fn bind_output(&mut self, output: OutputHandle) -> GraphResult<()> {
        self.output = Some(output);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct SetInput<T: Eq + Hash + Clone + fmt::Debug + 'static> {
    header: InputHeader,
    output: Option<OutputHandle>,
    _marker: PhantomData<T>,
}

impl<T: Eq + Hash + Clone + fmt::Debug + 'static> SetInput<T> {
    pub fn new(active: bool) -> Self {
        Self {
            header: InputHeader::new(active),
            output: None,
            _marker: PhantomData,
        }
    }

    pub fn value(&self) -> Option<std::collections::HashSet<T>> {
        self.output
            .as_ref()
            .and_then(|o| o.borrow().as_any().downcast_ref::<SetOutput<T>>().map(|s| s.value().clone()))
    }

    pub fn delta_value(&self, now: EngineTime) -> Option<SetDelta<T>> {
        self.output.as_ref().and_then(|o| {
            o.borrow().as_any().downcast_ref::<SetOutput<T>>().and_then(|s| s.delta_value(now).cloned())
        })
    }
}

impl<T: Eq + Hash + Clone + fmt::Debug + 'static> TsInput for SetInput<T> {
    fn valid(&self) -> bool {
        self.output.as_ref().map(|o| o.borrow().valid()).unwrap_or(false)
    }

    fn modified(&self, now: EngineTime) -> bool {
        self.output.as_ref().map(|o| o.borrow().modified_at(now)).unwrap_or(false)
    }

    fn active(&self) -> bool {
        self.header.active
    }

    fn set_active(&mut self, active: bool) {
        self.header.active = active;
    }

    fn bind_output(&mut self, output: OutputHandle) -> GraphResult<()> {
        self.output = Some(output);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A fixed-schema bundle input. Children are always materialized
/// (mirroring a peered input's own one-hop view plus a consistent
/// per-field view); `bind_output` additionally records the whole bundle
/// as a single peer so `valid`/`modified` can take the fast aggregate
/// path instead of visiting every field.
#[derive(Debug)]
pub struct BundleInput {
    header: InputHeader,
    peer: Option<OutputHandle>,
    children: Vec<(String, InputHandle)>,
}

impl BundleInput {
    pub fn new(active: bool, children: Vec<(String, InputHandle)>) -> Self {
        Self {
            header: InputHeader::new(active),
            peer: None,
            children,
        }
    }

    pub fn has_peer(&self) -> bool {
        self.peer.is_some()
    }

    pub fn child(&self, name: &str) -> Option<InputHandle> {
        self.children.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
    }
}

impl TsInput for BundleInput {
    fn valid(&self) -> bool {
        match &self.peer {
            Some(p) => p.borrow().valid(),
            None => self.children.iter().any(|(_, c)| c.borrow().valid()),
        }
    }

    fn modified(&self, now: EngineTime) -> bool {
        match &self.peer {
            Some(p) => p.borrow().modified_at(now),
            None => self.children.iter().any(|(_, c)| c.borrow().modified(now)),
        }
    }

    fn active(&self) -> bool {
        self.header.active
    }

    fn set_active(&mut self, active: bool) {
        self.header.active = active;
        for (_, c) in &self.children {
            c.borrow_mut().set_active(active);
        }
    }

    fn bind_output(&mut self, output: OutputHandle) -> GraphResult<()> {
        {
            let borrowed = output.borrow();
            let bundle = borrowed.as_any().downcast_ref::<BundleOutput>().ok_or_else(|| GraphError::InvalidPath {
                what: "bundle input bound to non-bundle output",
                node: NodeId::default(),
                path: Vec::new(),
            })?;
            for (name, child_input) in &self.children {
                if let Some(child_output) = bundle.child(name) {
                    child_input.borrow_mut().bind_output(child_output)?;
                }
            }
        }
        self.peer = Some(output);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Positionally-indexed sibling of [`BundleInput`] for the TSL shape.
#[derive(Debug)]
pub struct ListInput {
    header: InputHeader,
    peer: Option<OutputHandle>,
    elements: Vec<InputHandle>,
}

impl ListInput {
    pub fn new(active: bool, elements: Vec<InputHandle>) -> Self {
        Self {
            header: InputHeader::new(active),
            peer: None,
            elements,
        }
    }

    pub fn has_peer(&self) -> bool {
        self.peer.is_some()
    }

    pub fn child(&self, index: usize) -> Option<InputHandle> {
        self.elements.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl TsInput for ListInput {
    fn valid(&self) -> bool {
        match &self.peer {
            Some(p) => p.borrow().valid(),
            None => self.elements.iter().any(|c| c.borrow().valid()),
        }
    }

    fn modified(&self, now: EngineTime) -> bool {
        match &self.peer {
            Some(p) => p.borrow().modified_at(now),
            None => self.elements.iter().any(|c| c.borrow().modified(now)),
        }
    }

    fn active(&self) -> bool {
        self.header.active
    }

    fn set_active(&mut self, active: bool) {
        self.header.active = active;
        for c in &self.elements {
            c.borrow_mut().set_active(active);
        }
    }

    fn bind_output(&mut self, output: OutputHandle) -> GraphResult<()> {
        {
            let borrowed = output.borrow();
            let list = borrowed.as_any().downcast_ref::<ListOutput>().ok_or_else(|| GraphError::InvalidPath {
                what: "list input bound to non-list output",
                node: NodeId::default(),
                path: Vec::new(),
            })?;
            for (index, child_input) in self.elements.iter().enumerate() {
                if let Some(child_output) = list.child(index) {
                    child_input.borrow_mut().bind_output(child_output)?;
                }
            }
        }
        self.peer = Some(output);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A reference-shaped input is bound to a `ReferenceOutput` and reads
/// through to whatever leaf output the reference currently targets.
/// Critically, `modified` answers off the *reference's own* tick, not the
/// resolved leaf's: a consumer wired to a reference is scheduled when the
/// reference rebinds, never merely because the thing it now points at
/// happened to tick on some other cause.
#[derive(Debug, Default)]
pub struct ReferenceInput<T: Clone + fmt::Debug + 'static> {
    header: InputHeader,
    output: Option<OutputHandle>,
    _marker: PhantomData<T>,
}

impl<T: Clone + fmt::Debug + 'static> ReferenceInput<T> {
    pub fn new(active: bool) -> Self {
        Self {
            header: InputHeader::new(active),
            output: None,
            _marker: PhantomData,
        }
    }

    fn resolved_leaf(&self) -> Option<OutputHandle> {
        let out = self.output.as_ref()?;
        let borrowed = out.borrow();
        let reference = borrowed.as_any().downcast_ref::<ReferenceOutput>()?;
        reference.resolve()
    }

    pub fn value(&self) -> Option<T> {
        let leaf = self.resolved_leaf()?;
        let borrowed = leaf.borrow();
        borrowed.as_any().downcast_ref::<ScalarOutput<T>>().and_then(|s| s.value().cloned())
    }
}

impl<T: Clone + fmt::Debug + 'static> TsInput for ReferenceInput<T> {
    fn valid(&self) -> bool {
        self.resolved_leaf().map(|l| l.borrow().valid()).unwrap_or(false)
    }

    fn modified(&self, now: EngineTime) -> bool {
        self.output.as_ref().map(|o| o.borrow().modified_at(now)).unwrap_or(false)
    }

    fn active(&self) -> bool {
        self.header.active
    }

    fn set_active(&mut self, active: bool) {
        self.header.active = active;
    }

    fn bind_output(&mut self, output: OutputHandle) -> GraphResult<()> {
        expect_shape::<ReferenceOutput>(&output, &NodeId::default(), "reference input")?;
        self.output = Some(output);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Walks `path` from `root`, descending into bundle/list children by
/// name/index. Only meaningful against an unbound composite: a peered
/// bundle/list has no addressable children of its own at the wiring
/// layer, since a single edge binds the whole shape at once.
pub fn resolve_input_path(root: InputHandle, path: &[String], node: &NodeId) -> GraphResult<InputHandle> {
    let mut current = root;
    for (depth, segment) in path.iter().enumerate() {
        let next = {
            let borrowed = current.borrow();
            if let Some(bundle) = borrowed.as_any().downcast_ref::<BundleInput>() {
                bundle.child(segment)
            } else if let Some(list) = borrowed.as_any().downcast_ref::<ListInput>() {
                segment.parse::<usize>().ok().and_then(|i| list.child(i))
            } else {
                None
            }
        };
        current = next.ok_or_else(|| GraphError::InvalidPath {
            what: "input",
            node: node.clone(),
            path: path[..=depth].to_vec(),
        })?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::super::output::ScalarOutput;
    use super::*;

    fn scalar_output(value: i64, at: u64) -> OutputHandle {
        let mut out: ScalarOutput<i64> = ScalarOutput::new();
        out.apply_result(value, at.into());
        Rc::new(RefCell::new(out))
    }

    #[test]
    fn scalar_input_reads_through_bound_output() {
        let mut input: ScalarInput<i64> = ScalarInput::new(true);
        input.bind_output(scalar_output(7, 3)).unwrap();
        assert_eq!(input.value(), Some(7));
        assert!(input.modified(3.into()));
        assert!(!input.modified(4.into()));
    }

    #[test]
    fn peered_bundle_delegates_to_single_output() {
        let x = scalar_output(1, 5);
        let y = scalar_output(2, 5);
        let bundle_output = Rc::new(RefCell::new(BundleOutput::new(vec![
            ("x".to_string(), x),
            ("y".to_string(), y),
        ])));

        let x_in: InputHandle = Rc::new(RefCell::new(ScalarInput::<i64>::new(true)));
        let y_in: InputHandle = Rc::new(RefCell::new(ScalarInput::<i64>::new(true)));
        let mut bundle_in = BundleInput::new(true, vec![("x".to_string(), x_in.clone()), ("y".to_string(), y_in)]);
        bundle_in.bind_output(bundle_output).unwrap();

        assert!(bundle_in.has_peer());
        assert!(bundle_in.valid());
        assert!(bundle_in.modified(5.into()));
        assert_eq!(
            x_in.borrow().as_any().downcast_ref::<ScalarInput<i64>>().unwrap().value(),
            Some(1)
        );
    }

    #[test]
    fn reference_input_modified_tracks_rebind_not_leaf_tick() {
        let leaf = scalar_output(9, 1);
        let mut reference = ReferenceOutput::new();
        reference.apply_result(Some(leaf.clone()), 1.into());
        let reference_handle: OutputHandle = Rc::new(RefCell::new(reference));

        let mut input: ReferenceInput<i64> = ReferenceInput::new(true);
        input.bind_output(reference_handle.clone()).unwrap();
        assert_eq!(input.value(), Some(9));
        assert!(input.modified(1.into()));

        // The leaf ticks again at t=2 without the reference itself rebinding.
        leaf.borrow_mut()
            .as_any_mut()
            .downcast_mut::<ScalarOutput<i64>>()
            .unwrap()
            .apply_result(10, 2.into());
        assert!(!input.modified(2.into()), "leaf-only tick must not mark the reference input modified");
        assert_eq!(input.value(), Some(10));
    }
}
