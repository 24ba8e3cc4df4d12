use super::*;

use crate::config::{Action, Callbacks, Cardinality, Config, EventDirective, Events, Refs, Shortcut};
use crate::engine::Engine;
use crate::events::Listener;

/// Attribute marking elements that display a model property.
pub(crate) const MODEL_ATTR: &str = "data-model";

impl Engine {
    /// Runs every directive of the context's configuration once.
    pub(crate) fn dispatch_directives(
        &mut self,
        element: NodeId,
        selector: &str,
        context: &Context,
    ) -> Result<()> {
        let config = context.config();
        let inner = config.inner();

        for (name, method) in &inner.methods {
            context.set_method(name.clone(), method.clone());
        }
        if let Some(events) = &inner.events {
            self.bind_events(element, selector, context, events, "events")?;
        }
        for (event_type, shortcut) in &inner.shortcuts {
            self.bind_shortcut(element, selector, context, event_type, shortcut)?;
        }
        if let Some(callbacks) = &inner.callbacks {
            self.bind_nested_callbacks(selector, context, callbacks)?;
        }
        if let Some(refs) = &inner.refs {
            self.bind_refs(selector, context, refs)?;
        }
        for name in &inner.model {
            self.bind_model(selector, context, name)?;
        }
        if let Some(name) = &inner.model_target {
            self.bind_model_target(element, context, name);
        }
        for (name, _) in &inner.unknown {
            self.trace_line(format!("[directive] unknown configuration of {name}"));
        }
        Ok(())
    }

    fn add_listener(&mut self, element: NodeId, event_type: &str, context: &Context, action: Action) {
        self.trace_line(format!(
            "[directive] listen {event_type} on {} ({action:?})",
            self.dom.node_label(element)
        ));
        self.listeners.add(
            element,
            event_type.to_string(),
            Listener {
                owner: context.clone(),
                action,
            },
        );
    }

    fn bind_events(
        &mut self,
        element: NodeId,
        selector: &str,
        context: &Context,
        events: &Events,
        kind: &str,
    ) -> Result<()> {
        for (key, directive) in events.entries() {
            match directive {
                EventDirective::Action(action) => {
                    self.add_listener(element, key, context, action.clone());
                }
                EventDirective::Nested(inner) => {
                    let child = Config::builder().events(inner.clone());
                    self.resolve_child(context, kind, selector, key, child)?;
                }
                EventDirective::Group(inner) => {
                    let group = format!("{kind}.{key}");
                    self.bind_events(element, selector, context, inner, &group)?;
                }
            }
        }
        Ok(())
    }

    fn bind_shortcut(
        &mut self,
        element: NodeId,
        selector: &str,
        context: &Context,
        event_type: &str,
        shortcut: &Shortcut,
    ) -> Result<()> {
        match shortcut {
            Shortcut::Action(action) => {
                self.add_listener(element, event_type, context, action.clone());
            }
            Shortcut::Delegated(pairs) => {
                let kind = format!("events_{event_type}");
                for (child_selector, action) in pairs {
                    let child = Config::builder()
                        .events(Events::new().action(event_type, action.clone()));
                    self.resolve_child(context, &kind, selector, child_selector, child)?;
                }
            }
        }
        Ok(())
    }

    /// Only the nested child-selector entries bind here; the context's own
    /// lifecycle callbacks are fired by the binder.
    fn bind_nested_callbacks(
        &mut self,
        selector: &str,
        context: &Context,
        callbacks: &Callbacks,
    ) -> Result<()> {
        for (child_selector, nested) in &callbacks.nested {
            let child = Config::builder().callbacks(nested.clone());
            self.resolve_child(context, "callbacks", selector, child_selector, child)?;
        }
        Ok(())
    }

    fn bind_refs(&mut self, selector: &str, context: &Context, refs: &Refs) -> Result<()> {
        match refs {
            Refs::Slot(name) => {
                self.store_ref(context, name);
            }
            Refs::Named(specs) => {
                for spec in specs {
                    if !context.has_own(&spec.name) {
                        let empty = match spec.cardinality {
                            Cardinality::One => Value::Null,
                            Cardinality::Many => Value::List(Vec::new()),
                        };
                        context.set(spec.name.clone(), empty);
                    }
                    let child = Config::builder().refs(Refs::Slot(spec.name.clone()));
                    let kind = format!("refs.{}", spec.name);
                    self.resolve_child(context, &kind, selector, &spec.selector, child)?;
                }
            }
        }
        Ok(())
    }

    /// Writes the context's element into the ref slot `name` of the data it
    /// inherits: lists accumulate, an empty singular slot is assigned, and an
    /// occupied singular slot is left alone with a warning.
    pub(crate) fn store_ref(&mut self, context: &Context, name: &str) {
        let element = context.element();
        let label = self.dom.node_label(element);
        match context.data_get(name) {
            None => {
                context.data_set(name, Value::List(vec![Value::Node(element)]));
            }
            Some(Value::Null) => context.data_set(name, Value::Node(element)),
            Some(Value::List(mut items)) => {
                if !items.contains(&Value::Node(element)) {
                    items.push(Value::Node(element));
                    context.data_set(name, Value::List(items));
                }
            }
            Some(Value::Node(existing)) if existing == element => {}
            Some(other) => {
                self.warn_line(format!(
                    "[ref] slot {name} already holds {other}, skipping {label}"
                ));
                return;
            }
        }
        self.trace_line(format!("[ref] {name} <- {label}"));
    }

    /// Splices the element out of its ref slot, or nulls a singular slot
    /// that points at it.
    pub(crate) fn release_ref(&mut self, context: &Context) {
        let config = context.config();
        let Some(Refs::Slot(name)) = &config.inner().refs else {
            return;
        };
        let element = Value::Node(context.element());
        match context.data_get(name) {
            Some(Value::List(mut items)) => {
                let before = items.len();
                items.retain(|item| *item != element);
                if items.len() != before {
                    context.data_set(name, Value::List(items));
                }
            }
            Some(value) if value == element => context.data_set(name, Value::Null),
            _ => return,
        }
        self.trace_line(format!(
            "[ref] {name} released {}",
            self.dom.node_label(context.element())
        ));
    }

    fn bind_model(&mut self, selector: &str, context: &Context, name: &str) -> Result<()> {
        let key = format!("[{MODEL_ATTR}=\"{name}\"]");
        let child = Config::builder().model_target(name.to_string());
        self.resolve_child(context, "model", selector, &key, child)
    }

    /// Joins a display element to its model property: shows the current
    /// value and writes user input back.
    fn bind_model_target(&mut self, element: NodeId, context: &Context, name: &str) {
        let Some(owner) = context.parent().and_then(|parent| parent.model_owner(name)) else {
            self.warn_line(format!(
                "[ref] no model declares {name} for {}",
                self.dom.node_label(element)
            ));
            return;
        };
        owner.add_model_binding(name, element);
        let current = owner.get(name);
        if !current.is_null() {
            if let Err(err) = self.display_model_value(element, &current) {
                self.warn_line(format!("[ref] cannot display model {name}: {err}"));
            }
        }

        let property = name.to_string();
        let write_back = Action::call(move |engine, call| {
            let Some(model) = call.context.parent() else {
                return Ok(());
            };
            let value = engine.document().value(call.element).unwrap_or_default();
            engine.set_model(&model, &property, value)
        });
        self.add_listener(element, "input", context, write_back.clone());
        self.add_listener(element, "change", context, write_back);
    }

    pub(crate) fn release_model_target(&mut self, context: &Context) {
        let config = context.config();
        let Some(name) = &config.inner().model_target else {
            return;
        };
        if let Some(owner) = context.parent().and_then(|parent| parent.model_owner(name)) {
            owner.remove_model_binding(name, context.element());
        }
    }

    /// Writes a model property and pushes it to every element displaying
    /// it. The write lands on the nearest context declaring `name`.
    pub fn set_model(
        &mut self,
        context: &Context,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let value = value.into();
        let owner = context.model_owner(name).unwrap_or_else(|| context.clone());
        owner.set(name, value.clone());
        self.trace_line(format!("[directive] model {name} = {value}"));
        for node in owner.model_bindings(name) {
            if self.dom.is_connected(node) {
                self.display_model_value(node, &value)?;
            }
        }
        Ok(())
    }

    /// Last value written to the model property `name`.
    pub fn model_value(&self, context: &Context, name: &str) -> Value {
        context
            .model_owner(name)
            .unwrap_or_else(|| context.clone())
            .get(name)
    }

    fn display_model_value(&mut self, node: NodeId, value: &Value) -> Result<()> {
        let text = if value.is_null() {
            String::new()
        } else {
            value.as_string()
        };
        if self.dom.is_value_control(node) {
            if self.dom.value(node).as_deref() != Some(text.as_str()) {
                self.dom.set_value(node, &text)?;
            }
            return Ok(());
        }
        if self.dom.text_content(node) != text {
            self.dom.set_text_content(node, &text)?;
        }
        Ok(())
    }
}
