use super::*;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::{Callback, Config};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

struct ContextState {
    id: ContextId,
    element: NodeId,
    target: NodeId,
    config: Config,
    own: Record,
    model: Rc<RefCell<Record>>,
    parent: Option<Context>,
    methods: HashMap<String, Callback>,
    model_bindings: HashMap<String, Vec<NodeId>>,
}

/// Realized state of one configuration on one element.
///
/// Reads resolve against the per-element record first, then the enclosing
/// context (child configurations), then the configuration's seed data.
#[derive(Clone)]
pub struct Context(Rc<RefCell<ContextState>>);

impl Context {
    pub(crate) fn new(
        element: NodeId,
        config: Config,
        model: Rc<RefCell<Record>>,
        parent: Option<Context>,
    ) -> Self {
        let target = config.target().unwrap_or(element);
        Self(Rc::new(RefCell::new(ContextState {
            id: ContextId::next(),
            element,
            target,
            config,
            own: Record::new(),
            model,
            parent,
            methods: HashMap::new(),
            model_bindings: HashMap::new(),
        })))
    }

    pub fn id(&self) -> ContextId {
        self.0.borrow().id
    }

    pub fn element(&self) -> NodeId {
        self.0.borrow().element
    }

    pub fn target(&self) -> NodeId {
        self.0.borrow().target
    }

    pub fn config(&self) -> Config {
        self.0.borrow().config.clone()
    }

    pub fn parent(&self) -> Option<Context> {
        self.0.borrow().parent.clone()
    }

    pub fn ptr_eq(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// `Value::Null` when the name is unset everywhere.
    pub fn get(&self, name: &str) -> Value {
        self.lookup(name).unwrap_or_default()
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<Value> {
        let state = self.0.borrow();
        if let Some(value) = state.own.get(name) {
            return Some(value.clone());
        }
        if let Some(parent) = &state.parent {
            if let Some(value) = parent.lookup(name) {
                return Some(value);
            }
        }
        state.model.borrow().get(name).cloned()
    }

    /// Writes the per-element record.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.borrow_mut().own.insert(name.into(), value.into());
    }

    /// Writes the seed data, visible to every context sharing it.
    pub fn set_shared(&self, name: impl Into<String>, value: impl Into<Value>) {
        let model = self.0.borrow().model.clone();
        model.borrow_mut().insert(name.into(), value.into());
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.0.borrow().own.contains_key(name)
    }

    /// The element stored under a singular ref name.
    pub fn node(&self, name: &str) -> Option<NodeId> {
        self.get(name).as_node()
    }

    /// Elements stored under a ref name, in insertion order.
    pub fn refs(&self, name: &str) -> Vec<NodeId> {
        self.get(name).nodes()
    }

    pub fn method(&self, name: &str) -> Option<Callback> {
        let state = self.0.borrow();
        if let Some(method) = state.methods.get(name) {
            return Some(method.clone());
        }
        state.parent.as_ref().and_then(|parent| parent.method(name))
    }

    pub fn set_method(&self, name: impl Into<String>, method: Callback) {
        self.0.borrow_mut().methods.insert(name.into(), method);
    }

    /// Context whose data backs writes made on behalf of this one: the
    /// nearest ancestor already holding `name`, else the direct parent.
    pub(crate) fn data_holder(&self, name: &str) -> Option<Context> {
        let parent = self.parent()?;
        let mut cursor = Some(parent.clone());
        while let Some(current) = cursor {
            if current.has_own(name) {
                return Some(current);
            }
            cursor = current.parent();
        }
        Some(parent)
    }

    /// Reads `name` from the data this context writes refs into.
    pub(crate) fn data_get(&self, name: &str) -> Option<Value> {
        match self.data_holder(name) {
            Some(holder) => holder.lookup(name),
            None => self.0.borrow().model.borrow().get(name).cloned(),
        }
    }

    pub(crate) fn data_set(&self, name: &str, value: Value) {
        match self.data_holder(name) {
            Some(holder) => holder.set(name, value),
            None => self.set_shared(name, value),
        }
    }

    pub(crate) fn declares_model(&self, name: &str) -> bool {
        let state = self.0.borrow();
        state.model_bindings.contains_key(name)
            || state.config.inner().model.iter().any(|model| model == name)
    }

    /// Nearest context in the chain (self first) declaring the model `name`.
    pub(crate) fn model_owner(&self, name: &str) -> Option<Context> {
        let mut cursor = Some(self.clone());
        while let Some(current) = cursor {
            if current.declares_model(name) {
                return Some(current);
            }
            cursor = current.parent();
        }
        None
    }

    pub(crate) fn add_model_binding(&self, name: &str, element: NodeId) {
        let mut state = self.0.borrow_mut();
        let bound = state.model_bindings.entry(name.to_string()).or_default();
        if !bound.contains(&element) {
            bound.push(element);
        }
    }

    pub(crate) fn remove_model_binding(&self, name: &str, element: NodeId) {
        if let Some(bound) = self.0.borrow_mut().model_bindings.get_mut(name) {
            bound.retain(|node| *node != element);
        }
    }

    pub(crate) fn model_bindings(&self, name: &str) -> Vec<NodeId> {
        self.0
            .borrow()
            .model_bindings
            .get(name)
            .cloned()
            .unwrap_or_default()
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.borrow();
        f.debug_struct("Context")
            .field("id", &state.id)
            .field("element", &state.element)
            .field("target", &state.target)
            .field("config", &state.config.id())
            .field("own", &state.own)
            .field("parent", &state.parent.as_ref().map(Context::id))
            .finish_non_exhaustive()
    }
}
