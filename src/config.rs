use super::*;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::Engine;
use crate::events::Event;

/// Handler shared by events, methods and lifecycle callbacks.
pub type Callback = Rc<dyn Fn(&mut Engine, &Call<'_>) -> Result<()>>;

/// Arguments threaded through every handler invocation.
#[derive(Debug, Clone, Copy)]
pub struct Call<'a> {
    /// Element the directive or listener is bound to.
    pub element: NodeId,
    /// Lifecycle receiver: the configuration's `target`, or `element`.
    pub target: NodeId,
    pub context: &'a Context,
    pub event: Option<&'a Event>,
}

fn callback<F>(f: F) -> Callback
where
    F: Fn(&mut Engine, &Call<'_>) -> Result<()> + 'static,
{
    Rc::new(f)
}

#[derive(Clone)]
pub enum Action {
    Call(Callback),
    /// Looked up on the context chain when the action fires.
    Named(String),
}

impl Action {
    pub fn call<F>(f: F) -> Self
    where
        F: Fn(&mut Engine, &Call<'_>) -> Result<()> + 'static,
    {
        Self::Call(callback(f))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call(_) => f.write_str("Action::Call(..)"),
            Self::Named(name) => write!(f, "Action::Named({name:?})"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum EventDirective {
    Action(Action),
    /// The key is a child selector; the inner events bind on its matches.
    Nested(Events),
    /// Label only; the inner entries behave as if declared one level up.
    Group(Events),
}

/// Ordered `events` directive.
#[derive(Debug, Clone, Default)]
pub struct Events {
    entries: Vec<(String, EventDirective)>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(self, event: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Engine, &Call<'_>) -> Result<()> + 'static,
    {
        self.action(event, Action::call(f))
    }

    pub fn on_named(self, event: impl Into<String>, method: impl Into<String>) -> Self {
        self.action(event, Action::named(method))
    }

    pub fn action(mut self, event: impl Into<String>, action: Action) -> Self {
        self.entries
            .push((event.into(), EventDirective::Action(action)));
        self
    }

    pub fn child(mut self, selector: impl Into<String>, events: Events) -> Self {
        self.entries
            .push((selector.into(), EventDirective::Nested(events)));
        self
    }

    pub fn group(mut self, label: impl Into<String>, events: Events) -> Self {
        self.entries
            .push((label.into(), EventDirective::Group(events)));
        self
    }

    pub fn entries(&self) -> &[(String, EventDirective)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Value of an `events_<name>` top-level key.
#[derive(Debug, Clone)]
pub enum Shortcut {
    Action(Action),
    /// `(child selector, action)` pairs, each bound for `<name>` on the
    /// matching descendants.
    Delegated(Vec<(String, Action)>),
}

#[derive(Clone, Default)]
pub struct Callbacks {
    pub(crate) created: Option<Callback>,
    pub(crate) added: Option<Callback>,
    pub(crate) removed: Option<Callback>,
    pub(crate) nested: Vec<(String, Callbacks)>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Engine, &Call<'_>) -> Result<()> + 'static,
    {
        self.created = Some(callback(f));
        self
    }

    pub fn added<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Engine, &Call<'_>) -> Result<()> + 'static,
    {
        self.added = Some(callback(f));
        self
    }

    pub fn removed<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Engine, &Call<'_>) -> Result<()> + 'static,
    {
        self.removed = Some(callback(f));
        self
    }

    pub fn child(mut self, selector: impl Into<String>, callbacks: Callbacks) -> Self {
        self.nested.push((selector.into(), callbacks));
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("created", &self.created.is_some())
            .field("added", &self.added.is_some())
            .field("removed", &self.removed.is_some())
            .field("nested", &self.nested)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSpec {
    pub name: String,
    pub selector: String,
    pub cardinality: Cardinality,
}

impl RefSpec {
    pub fn one(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: selector.into(),
            cardinality: Cardinality::One,
        }
    }

    pub fn many(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: selector.into(),
            cardinality: Cardinality::Many,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refs {
    /// Store the bound element under this name on the enclosing data.
    Slot(String),
    Named(Vec<RefSpec>),
}

/// Seed data of a configuration.
#[derive(Clone)]
pub enum Data {
    /// One record shared by every element bound to the configuration.
    Shared(Rc<RefCell<Record>>),
    /// Invoked once per element.
    Factory(Rc<dyn Fn(&Document, NodeId) -> Record>),
    /// Child configurations read through the enclosing context.
    Inherit(Context),
}

impl Data {
    pub fn shared(record: Record) -> Self {
        Self::Shared(Rc::new(RefCell::new(record)))
    }

    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&Document, NodeId) -> Record + 'static,
    {
        Self::Factory(Rc::new(f))
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared(record) => f.debug_tuple("Shared").field(&record.borrow()).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
            Self::Inherit(context) => f.debug_tuple("Inherit").field(&context.id()).finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigId(u64);

impl ConfigId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config-{}", self.0)
    }
}

pub(crate) struct Configuration {
    pub(crate) id: ConfigId,
    pub(crate) data: Option<Data>,
    pub(crate) events: Option<Events>,
    pub(crate) methods: Vec<(String, Callback)>,
    pub(crate) callbacks: Option<Callbacks>,
    pub(crate) refs: Option<Refs>,
    pub(crate) model: Vec<String>,
    pub(crate) model_target: Option<String>,
    pub(crate) attr_changes: Vec<(String, Action)>,
    pub(crate) shortcuts: Vec<(String, Shortcut)>,
    pub(crate) unknown: Vec<(String, Value)>,
    pub(crate) scope: Option<NodeId>,
    pub(crate) target: Option<NodeId>,
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods = self.methods.iter().map(|(name, _)| name).collect::<Vec<_>>();
        f.debug_struct("Configuration")
            .field("id", &self.id)
            .field("data", &self.data)
            .field("events", &self.events)
            .field("methods", &methods)
            .field("callbacks", &self.callbacks)
            .field("refs", &self.refs)
            .field("model", &self.model)
            .field("model_target", &self.model_target)
            .field("attr_changes", &self.attr_changes)
            .field("shortcuts", &self.shortcuts)
            .field("unknown", &self.unknown)
            .field("scope", &self.scope)
            .field("target", &self.target)
            .finish()
    }
}

/// Immutable configuration. Clones share identity; two separately built
/// configurations are never equal.
#[derive(Clone)]
pub struct Config(Rc<Configuration>);

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn id(&self) -> ConfigId {
        self.0.id
    }

    pub fn scope(&self) -> Option<NodeId> {
        self.0.scope
    }

    pub fn target(&self) -> Option<NodeId> {
        self.0.target
    }

    pub(crate) fn inner(&self) -> &Configuration {
        &self.0
    }

    pub(crate) fn callbacks(&self) -> Option<&Callbacks> {
        self.0.callbacks.as_ref()
    }
}

impl PartialEq for Config {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Config {}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("id", &self.0.id)
            .field("scope", &self.0.scope)
            .field("target", &self.0.target)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct ConfigBuilder {
    data: Option<Data>,
    events: Option<Events>,
    methods: Vec<(String, Callback)>,
    callbacks: Option<Callbacks>,
    refs: Option<Refs>,
    model: Vec<String>,
    model_target: Option<String>,
    attr_changes: Vec<(String, Action)>,
    shortcuts: Vec<(String, Shortcut)>,
    unknown: Vec<(String, Value)>,
    scope: Option<NodeId>,
    target: Option<NodeId>,
}

impl ConfigBuilder {
    pub fn data(mut self, data: Data) -> Self {
        self.data = Some(data);
        self
    }

    pub fn shared_data(self, record: Record) -> Self {
        self.data(Data::shared(record))
    }

    pub fn data_factory<F>(self, f: F) -> Self
    where
        F: Fn(&Document, NodeId) -> Record + 'static,
    {
        self.data(Data::factory(f))
    }

    pub fn events(mut self, events: Events) -> Self {
        self.events = Some(events);
        self
    }

    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Engine, &Call<'_>) -> Result<()> + 'static,
    {
        self.methods.push((name.into(), callback(f)));
        self
    }

    pub fn callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    pub fn refs(mut self, refs: Refs) -> Self {
        self.refs = Some(refs);
        self
    }

    pub fn model<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.model.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn attr_change(mut self, attribute: impl Into<String>, action: Action) -> Self {
        self.attr_changes
            .push((attribute.into().to_ascii_lowercase(), action));
        self
    }

    /// `events_<event>` shortcut.
    pub fn shortcut(mut self, event: impl Into<String>, shortcut: Shortcut) -> Self {
        self.shortcuts.push((event.into(), shortcut));
        self
    }

    pub fn scope(mut self, scope: NodeId) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn target(mut self, target: NodeId) -> Self {
        self.target = Some(target);
        self
    }

    pub(crate) fn model_target(mut self, name: String) -> Self {
        self.model_target = Some(name);
        self
    }

    /// Dynamic entry point for directives named at runtime. Names the typed
    /// builder understands are resolved here; anything else is kept and
    /// reported as unknown when the configuration binds.
    pub fn directive(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        match (name.as_str(), &value) {
            ("refs", Value::String(slot)) => {
                self.refs = Some(Refs::Slot(slot.clone()));
            }
            ("model", Value::List(items)) => {
                self.model
                    .extend(items.iter().filter_map(|item| item.as_str().map(ToOwned::to_owned)));
            }
            ("model", Value::String(single)) => self.model.push(single.clone()),
            (key, Value::String(method)) if key.starts_with("events_") && key.len() > 7 => {
                self.shortcuts.push((
                    key["events_".len()..].to_string(),
                    Shortcut::Action(Action::named(method.clone())),
                ));
            }
            _ => self.unknown.push((name, value)),
        }
        self
    }

    pub fn build(self) -> Config {
        Config(Rc::new(Configuration {
            id: ConfigId::next(),
            data: self.data,
            events: self.events,
            methods: self.methods,
            callbacks: self.callbacks,
            refs: self.refs,
            model: self.model,
            model_target: self.model_target,
            attr_changes: self.attr_changes,
            shortcuts: self.shortcuts,
            unknown: self.unknown,
            scope: self.scope,
            target: self.target,
        }))
    }
}
