use super::*;

use crate::config::{Action, Call};
use crate::engine::Engine;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventInit {
    pub bubbles: bool,
    pub cancelable: bool,
    pub detail: Value,
}

impl EventInit {
    pub fn bubbling() -> Self {
        Self {
            bubbles: true,
            cancelable: true,
            detail: Value::Null,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<Value>) -> Self {
        self.detail = detail.into();
        self
    }
}

/// An event being dispatched. Handlers receive it by shared reference, so
/// the propagation flags are interior-mutable.
#[derive(Debug)]
pub struct Event {
    event_type: String,
    target: NodeId,
    current_target: Cell<NodeId>,
    bubbles: bool,
    cancelable: bool,
    detail: Value,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
    immediate_propagation_stopped: Cell<bool>,
}

impl Event {
    pub(crate) fn new(event_type: &str, target: NodeId, init: EventInit) -> Self {
        Self {
            event_type: event_type.to_string(),
            target,
            current_target: Cell::new(target),
            bubbles: init.bubbles,
            cancelable: init.cancelable,
            detail: init.detail,
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
            immediate_propagation_stopped: Cell::new(false),
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn current_target(&self) -> NodeId {
        self.current_target.get()
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn detail(&self) -> &Value {
        &self.detail
    }

    pub fn prevent_default(&self) {
        if self.cancelable {
            self.default_prevented.set(true);
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn stop_immediate_propagation(&self) {
        self.propagation_stopped.set(true);
        self.immediate_propagation_stopped.set(true);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub default_prevented: bool,
    pub propagation_stopped: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Listener {
    pub(crate) owner: Context,
    pub(crate) action: Action,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct ListenerStore {
    map: HashMap<NodeId, HashMap<String, Vec<Listener>>>,
}

impl ListenerStore {
    pub(crate) fn add(&mut self, node_id: NodeId, event: String, listener: Listener) {
        self.map
            .entry(node_id)
            .or_default()
            .entry(event)
            .or_default()
            .push(listener);
    }

    pub(crate) fn get(&self, node_id: NodeId, event: &str) -> Vec<Listener> {
        self.map
            .get(&node_id)
            .and_then(|events| events.get(event))
            .cloned()
            .unwrap_or_default()
    }

    /// Drops every listener attached on behalf of `owner`.
    pub(crate) fn remove_owned(&mut self, owner: ContextId) -> usize {
        let mut removed = 0usize;
        self.map.retain(|_, events| {
            events.retain(|_, listeners| {
                let before = listeners.len();
                listeners.retain(|listener| listener.owner.id() != owner);
                removed += before - listeners.len();
                !listeners.is_empty()
            });
            !events.is_empty()
        });
        removed
    }

    pub(crate) fn count(&self, node_id: NodeId, event: &str) -> usize {
        self.map
            .get(&node_id)
            .and_then(|events| events.get(event))
            .map_or(0, Vec::len)
    }

    pub(crate) fn clear(&mut self) {
        self.map.clear();
    }
}

impl Engine {
    pub(crate) fn dispatch_event(&mut self, target: NodeId, event: &Event) -> Result<()> {
        let mut path = vec![target];
        if event.bubbles {
            let mut cursor = self.dom.parent(target);
            while let Some(node) = cursor {
                path.push(node);
                cursor = self.dom.parent(node);
            }
        }

        for node in path {
            event.current_target.set(node);
            self.invoke_listeners(node, event)?;
            if event.propagation_stopped.get() {
                self.trace_line(format!(
                    "[event] {} target={} propagation stopped at {}",
                    event.event_type,
                    self.dom.node_label(target),
                    self.dom.node_label(node)
                ));
                break;
            }
        }
        Ok(())
    }

    fn invoke_listeners(&mut self, node_id: NodeId, event: &Event) -> Result<()> {
        let listeners = self.listeners.get(node_id, &event.event_type);
        for listener in listeners {
            if event.immediate_propagation_stopped.get() {
                break;
            }
            self.trace_line(format!(
                "[event] {} target={} current={}",
                event.event_type,
                self.dom.node_label(event.target),
                self.dom.node_label(node_id)
            ));
            let call = Call {
                element: node_id,
                target: listener.owner.target(),
                context: &listener.owner,
                event: Some(event),
            };
            self.run_action(&listener.action, &call)?;
        }
        Ok(())
    }

    /// Runs an action; named actions resolve on the context chain now, and a
    /// missing method is a warning rather than an error.
    pub(crate) fn run_action(&mut self, action: &Action, call: &Call<'_>) -> Result<()> {
        let callback = match action {
            Action::Call(callback) => callback.clone(),
            Action::Named(name) => match call.context.method(name) {
                Some(callback) => callback,
                None => {
                    self.warn_line(format!(
                        "[event] no method named {name} for {}",
                        self.dom.node_label(call.element)
                    ));
                    return Ok(());
                }
            },
        };
        callback(self, call)
    }

    /// Dispatches a synthetic event, then flushes pending mutations.
    pub fn dispatch_custom_event(
        &mut self,
        target: NodeId,
        event_type: &str,
        init: EventInit,
    ) -> Result<DispatchOutcome> {
        let outcome = self.dispatch_without_flush(target, event_type, init)?;
        self.flush()?;
        Ok(outcome)
    }

    pub(crate) fn dispatch_without_flush(
        &mut self,
        target: NodeId,
        event_type: &str,
        init: EventInit,
    ) -> Result<DispatchOutcome> {
        if !self.dom.is_valid_node(target) {
            return Err(Error::InvalidNode(format!("cannot dispatch to {target}")));
        }
        let event = Event::new(event_type, target, init);
        stacker::maybe_grow(64 * 1024, 32 * 1024 * 1024, || {
            self.dispatch_event(target, &event)
        })?;
        Ok(DispatchOutcome {
            default_prevented: event.default_prevented(),
            propagation_stopped: event.propagation_stopped.get(),
        })
    }

    /// Simulated user click. Disabled elements ignore it; checkboxes and
    /// radios toggle unless the click is cancelled.
    pub fn click(&mut self, target: NodeId) -> Result<DispatchOutcome> {
        if self.dom.disabled(target) {
            return Ok(DispatchOutcome {
                default_prevented: false,
                propagation_stopped: false,
            });
        }
        let toggles = self.dom.tag_name(target) == Some("input")
            && matches!(
                self.dom.attr(target, "type").as_deref(),
                Some("checkbox" | "radio")
            );
        let was_checked = self.dom.checked(target);
        if toggles {
            self.dom.set_checked(target, !was_checked)?;
        }
        let outcome = self.dispatch_without_flush(target, "click", EventInit::bubbling())?;
        if toggles {
            if outcome.default_prevented {
                self.dom.set_checked(target, was_checked)?;
            } else {
                self.dispatch_without_flush(target, "input", EventInit::bubbling())?;
                self.dispatch_without_flush(target, "change", EventInit::bubbling())?;
            }
        }
        self.flush()?;
        Ok(outcome)
    }

    /// Simulated typing: replaces the value, then fires `input` and `change`.
    pub fn type_text(&mut self, target: NodeId, text: &str) -> Result<()> {
        if self.dom.disabled(target) {
            return Ok(());
        }
        self.dom.set_value(target, text)?;
        self.dispatch_without_flush(target, "input", EventInit::bubbling())?;
        self.dispatch_without_flush(target, "change", EventInit::bubbling())?;
        self.flush()
    }
}
