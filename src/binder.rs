use super::*;

use crate::config::{Call, Config, Data, Refs};
use crate::engine::Engine;

/// Which path asked for a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BindOrigin {
    /// Registration-time scan of the current tree.
    Scan,
    /// Insertion delivered by the mutation feed.
    Observed,
    /// Explicit `Engine::rescan`.
    Rescan,
    /// `register` with a node instead of a selector.
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Created,
    Added,
    Removed,
}

impl Lifecycle {
    fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Added => "added",
            Self::Removed => "removed",
        }
    }
}

impl Engine {
    /// Binds `config` to `element` at most once per live element.
    pub(crate) fn apply(
        &mut self,
        element: NodeId,
        selector: &str,
        config: &Config,
        origin: BindOrigin,
    ) -> Result<()> {
        if !self.dom.is_element(element) {
            return Ok(());
        }
        if let Some(scope) = config.scope() {
            if !self.dom.contains(scope, element) {
                self.trace_line(format!(
                    "[bind] {} outside scope {} of {selector}",
                    self.dom.node_label(element),
                    self.dom.node_label(scope)
                ));
                return Ok(());
            }
        }

        let pair = (element, config.id());
        if let Some(existing) = self.context_for(element, config) {
            // Announced earlier in this flush, by a registration scan or by
            // the traversal of an enclosing inserted subtree.
            if origin == BindOrigin::Observed && !self.announced.insert(pair) {
                return Ok(());
            }
            self.trace_line(format!(
                "[bind] {selector} already bound to {} ({}), refiring added",
                self.dom.node_label(element),
                existing.id()
            ));
            self.restore_ref_slot(&existing);
            return self.fire_lifecycle(&existing, Lifecycle::Added);
        }

        let context = self.materialize(element, config);
        self.bindings
            .entry(element)
            .or_default()
            .push(context.clone());
        let in_flush = self.flushing || self.dom.pending_mutations() > 0;
        if origin == BindOrigin::Observed || (origin == BindOrigin::Scan && in_flush) {
            self.announced.insert(pair);
        }
        self.trace_line(format!(
            "[bind] {selector} -> {} ({}, {})",
            self.dom.node_label(element),
            context.id(),
            config.id()
        ));

        let setup = stacker::maybe_grow(64 * 1024, 32 * 1024 * 1024, || {
            self.dispatch_directives(element, selector, &context)
        })
        .and_then(|()| self.fire_lifecycle(&context, Lifecycle::Created));
        if let Err(err) = setup {
            self.unbind_failed(&context);
            return Err(err);
        }
        self.fire_lifecycle(&context, Lifecycle::Added)
    }

    /// Rolls back a context whose directives or `created` callback failed,
    /// so a later pass binds the element from scratch.
    fn unbind_failed(&mut self, context: &Context) {
        let element = context.element();
        if let Some(contexts) = self.bindings.get_mut(&element) {
            contexts.retain(|existing| !existing.ptr_eq(context));
            if contexts.is_empty() {
                self.bindings.remove(&element);
            }
        }
        self.release_ref(context);
        self.release_model_target(context);
        self.warn_line(format!(
            "[bind] setup failed on {} ({}), binding dropped",
            self.dom.node_label(element),
            context.id()
        ));
        self.discard_context(context);
    }

    fn materialize(&self, element: NodeId, config: &Config) -> Context {
        let (model, parent) = match &config.inner().data {
            None => (Rc::new(RefCell::new(Record::new())), None),
            Some(Data::Shared(record)) => (record.clone(), None),
            Some(Data::Factory(factory)) => {
                (Rc::new(RefCell::new(factory(&self.dom, element))), None)
            }
            Some(Data::Inherit(parent)) => {
                (Rc::new(RefCell::new(Record::new())), Some(parent.clone()))
            }
        };
        Context::new(element, config.clone(), model, parent)
    }

    pub(crate) fn fire_lifecycle(&mut self, context: &Context, which: Lifecycle) -> Result<()> {
        let config = context.config();
        let Some(callbacks) = config.callbacks() else {
            return Ok(());
        };
        let callback = match which {
            Lifecycle::Created => callbacks.created.clone(),
            Lifecycle::Added => callbacks.added.clone(),
            Lifecycle::Removed => callbacks.removed.clone(),
        };
        let Some(callback) = callback else {
            return Ok(());
        };
        self.trace_line(format!(
            "[bind] {} {} ({})",
            which.label(),
            self.dom.node_label(context.element()),
            context.id()
        ));
        let call = Call {
            element: context.element(),
            target: context.target(),
            context,
            event: None,
        };
        callback(self, &call)
    }

    /// Puts the element back into a collection ref it was spliced out of.
    fn restore_ref_slot(&mut self, context: &Context) {
        let config = context.config();
        let Some(Refs::Slot(name)) = &config.inner().refs else {
            return;
        };
        let element = Value::Node(context.element());
        if let Some(Value::List(mut items)) = context.data_get(name) {
            if !items.contains(&element) {
                items.push(element);
                context.data_set(name, Value::List(items));
            }
        }
    }
}
