use super::*;
use tracing::{debug, warn};

use crate::binder::BindOrigin;
use crate::config::{Action, Call, Config, ConfigId};
use crate::events::ListenerStore;
use crate::registry::Registry;
use crate::template::Template;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Records diagnostic trace lines; warnings are recorded regardless.
    pub debug: bool,
    pub trace_log_limit: usize,
    /// Whether the mutation feed is recorded from the start.
    pub observe: bool,
    /// Upper bound on batches drained by one `flush` before giving up.
    pub flush_batch_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            debug: false,
            trace_log_limit: 10_000,
            observe: true,
            flush_batch_limit: 10_000,
        }
    }
}

/// What `Engine::register` binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindTarget {
    /// Registered, then applied to every current match.
    Selector(String),
    /// Applied once to this element (or to a fragment's child elements)
    /// without touching the registry.
    Node(NodeId),
}

impl From<&str> for BindTarget {
    fn from(value: &str) -> Self {
        Self::Selector(value.to_string())
    }
}

impl From<String> for BindTarget {
    fn from(value: String) -> Self {
        Self::Selector(value)
    }
}

impl From<&String> for BindTarget {
    fn from(value: &String) -> Self {
        Self::Selector(value.clone())
    }
}

impl From<NodeId> for BindTarget {
    fn from(value: NodeId) -> Self {
        Self::Node(value)
    }
}

/// Binding engine over one [`Document`].
pub struct Engine {
    pub(crate) dom: Document,
    pub(crate) registry: Registry,
    pub(crate) bindings: HashMap<NodeId, Vec<Context>>,
    pub(crate) listeners: ListenerStore,
    pub(crate) announced: HashSet<(NodeId, ConfigId)>,
    pub(crate) flushing: bool,
    templates: HashMap<String, Template>,
    options: EngineOptions,
    trace_logs: Vec<String>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("bound_elements", &self.bindings.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(document: Document) -> Self {
        Self::with_options(document, EngineOptions::default())
    }

    pub fn with_options(mut document: Document, options: EngineOptions) -> Self {
        document.feed_mut().set_observing(options.observe);
        Self {
            dom: document,
            registry: Registry::default(),
            bindings: HashMap::new(),
            listeners: ListenerStore::default(),
            announced: HashSet::new(),
            flushing: false,
            templates: HashMap::new(),
            options,
            trace_logs: Vec::new(),
        }
    }

    pub fn from_html(html: &str) -> Result<Self> {
        Ok(Self::new(Document::parse(html)?))
    }

    pub fn document(&self) -> &Document {
        &self.dom
    }

    /// Mutations made through this handle are picked up by the next
    /// [`Engine::flush`].
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.dom
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn register(&mut self, target: impl Into<BindTarget>, config: &Config) -> Result<()> {
        match target.into() {
            BindTarget::Selector(selector) => {
                if self.registry.insert(&selector, config)? {
                    self.trace_line(format!("[bind] registered {selector} ({})", config.id()));
                }
                self.scan(&selector, config)?;
            }
            BindTarget::Node(node) => {
                if !self.dom.is_valid_node(node) {
                    return Err(Error::InvalidNode(format!("cannot bind {node}")));
                }
                let elements = if self.dom.is_fragment(node) {
                    self.dom.child_elements(node)
                } else {
                    vec![node]
                };
                for element in elements {
                    self.apply(element, "", config, BindOrigin::Direct)?;
                }
            }
        }
        self.flush()
    }

    /// Applies `config` to every connected element matching `selector`.
    pub(crate) fn scan(&mut self, selector: &str, config: &Config) -> Result<()> {
        let found = self.dom.query_selector_all(selector)?;
        if found.is_empty() {
            self.trace_line(format!("[bind] no current matches for {selector}"));
        }
        for element in found {
            if self.dom.is_connected(element) {
                self.apply(element, selector, config, BindOrigin::Scan)?;
            }
        }
        Ok(())
    }

    /// Runs the add path over the subtree rooted at `node`, exactly as if it
    /// had just been inserted.
    pub fn rescan(&mut self, node: NodeId) -> Result<()> {
        for element in self.dom.subtree_elements(node) {
            if self.dom.is_connected(element) {
                self.on_added(element, BindOrigin::Rescan)?;
            }
        }
        self.flush()
    }

    /// Active contexts of `node`, in binding order.
    pub fn contexts(&self, node: NodeId) -> Vec<Context> {
        self.bindings.get(&node).cloned().unwrap_or_default()
    }

    pub fn context_for(&self, node: NodeId, config: &Config) -> Option<Context> {
        self.bindings
            .get(&node)?
            .iter()
            .find(|context| context.config() == *config)
            .cloned()
    }

    pub fn is_bound(&self, node: NodeId) -> bool {
        self.bindings.get(&node).is_some_and(|list| !list.is_empty())
    }

    pub fn registered_selectors(&self) -> Vec<String> {
        self.registry.selectors()
    }

    /// Number of `(selector, config)` pairs currently registered.
    pub fn registration_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of child configurations spawned by directives and still live.
    pub fn child_registration_count(&self) -> usize {
        self.registry.child_count()
    }

    pub fn listener_count(&self, node: NodeId, event_type: &str) -> usize {
        self.listeners.count(node, event_type)
    }

    /// Invokes a method visible from `context` (own methods, then the
    /// enclosing contexts).
    pub fn call_method(&mut self, context: &Context, name: &str) -> Result<()> {
        let Some(method) = context.method(name) else {
            return Err(Error::Handler(format!("no method named {name}")));
        };
        let call = Call {
            element: context.element(),
            target: context.target(),
            context,
            event: None,
        };
        method(self, &call)?;
        self.flush()
    }

    /// Invokes an action as the handler for `context` would.
    pub fn run(&mut self, context: &Context, action: &Action) -> Result<()> {
        let call = Call {
            element: context.element(),
            target: context.target(),
            context,
            event: None,
        };
        self.run_action(action, &call)?;
        self.flush()
    }

    pub fn find_descendant(&self, root: NodeId, selector: &str) -> Result<Option<NodeId>> {
        self.dom.find_descendant(root, selector)
    }

    pub fn find_all_descendants(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>> {
        self.dom.find_all_descendants(root, selector)
    }

    /// Compiles `source`, reusing the cached render function when the same
    /// source was compiled before.
    pub fn compile_template(&mut self, source: &str) -> Result<Template> {
        if let Some(template) = self.templates.get(source) {
            return Ok(template.clone());
        }
        self.trace_line(format!("[template] pre compilation: {source}"));
        let template = crate::template::compile_template(source)?;
        self.trace_line(format!("[template] post compilation: {}", template.describe()));
        self.templates.insert(source.to_string(), template.clone());
        Ok(template)
    }

    pub fn enable_debug(&mut self, enabled: bool) {
        self.options.debug = enabled;
    }

    pub fn debug_enabled(&self) -> bool {
        self.options.debug
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.trace_logs)
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::InvalidOption(
                "set_trace_log_limit requires at least 1 entry".into(),
            ));
        }
        self.options.trace_log_limit = max_entries;
        while self.trace_logs.len() > self.options.trace_log_limit {
            self.trace_logs.remove(0);
        }
        Ok(())
    }

    pub fn set_flush_batch_limit(&mut self, max_batches: usize) -> Result<()> {
        if max_batches == 0 {
            return Err(Error::InvalidOption(
                "set_flush_batch_limit requires at least 1 batch".into(),
            ));
        }
        self.options.flush_batch_limit = max_batches;
        Ok(())
    }

    /// Stops recording mutations. Pending records are dropped.
    pub fn disconnect(&mut self) {
        self.dom.feed_mut().set_observing(false);
        self.options.observe = false;
        self.trace_line("[observe] disconnected".into());
    }

    pub fn observe(&mut self) {
        self.dom.feed_mut().set_observing(true);
        self.options.observe = true;
        self.trace_line("[observe] observing".into());
    }

    pub fn is_observing(&self) -> bool {
        self.dom.is_observed()
    }

    /// Stops observing and forgets every registration, binding and listener.
    /// No `removed` callbacks fire.
    pub fn shutdown(&mut self) {
        self.disconnect();
        self.registry.clear();
        self.bindings.clear();
        self.listeners.clear();
        self.announced.clear();
        self.templates.clear();
        self.trace_line("[observe] shut down".into());
    }

    pub(crate) fn trace_line(&mut self, line: String) {
        if self.options.debug {
            debug!("{line}");
            self.push_trace(line);
        }
    }

    pub(crate) fn warn_line(&mut self, line: String) {
        warn!("{line}");
        self.push_trace(line);
    }

    fn push_trace(&mut self, line: String) {
        if self.trace_logs.len() >= self.options.trace_log_limit {
            self.trace_logs.remove(0);
        }
        self.trace_logs.push(line);
    }
}
