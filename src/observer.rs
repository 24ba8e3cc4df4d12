use super::*;

use crate::binder::{BindOrigin, Lifecycle};
use crate::config::Call;
use crate::engine::Engine;
use crate::events::{Event, EventInit};
use crate::registry::MatchCursor;

impl Engine {
    /// Drains the mutation feed batch by batch until it is empty. Records
    /// produced while a batch is processed form the next batch. Nested calls
    /// (from handlers running inside a flush) return immediately.
    pub fn flush(&mut self) -> Result<()> {
        if self.flushing {
            return Ok(());
        }
        self.flushing = true;
        let result = self.drain_feed();
        self.flushing = false;
        self.announced.clear();
        result
    }

    /// Keeps draining after a failing callback so later records of the
    /// batch still bind and unbind; the first error is returned once the
    /// feed is empty.
    fn drain_feed(&mut self) -> Result<()> {
        let limit = self.options().flush_batch_limit;
        let mut batches = 0usize;
        let mut outcome = Ok(());
        loop {
            let records = self.dom.take_mutations();
            if records.is_empty() {
                return outcome;
            }
            batches += 1;
            if batches > limit {
                self.warn_line(format!("[observe] giving up after {limit} batches"));
                return Err(Error::FlushLimit(limit));
            }
            self.trace_line(format!(
                "[observe] batch {batches} with {} records",
                records.len()
            ));
            for record in records {
                keep_first_error(&mut outcome, self.process_record(record));
            }
        }
    }

    fn process_record(&mut self, record: MutationRecord) -> Result<()> {
        match record {
            MutationRecord::ChildList { added, removed, .. } => {
                let mut outcome = Ok(());
                for root in added {
                    keep_first_error(&mut outcome, self.process_added_root(root));
                }
                keep_first_error(&mut outcome, self.process_removed_roots(&removed));
                outcome
            }
            MutationRecord::Attributes {
                target,
                name,
                old_value,
            } => self.process_attribute_change(target, &name, old_value),
        }
    }

    fn process_added_root(&mut self, root: NodeId) -> Result<()> {
        let mut outcome = Ok(());
        for element in self.dom.subtree_elements(root) {
            // Handlers may detach later nodes of the snapshot.
            if self.dom.is_connected(element) {
                keep_first_error(&mut outcome, self.on_added(element, BindOrigin::Observed));
            }
        }
        outcome
    }

    /// Applies every registered configuration whose selector matches.
    /// Entries registered while this runs are seen by the same walk.
    pub(crate) fn on_added(&mut self, element: NodeId, origin: BindOrigin) -> Result<()> {
        let mut cursor = MatchCursor::default();
        let mut outcome = Ok(());
        while let Some((selector, config)) = self.registry.next_match(&self.dom, element, &mut cursor)? {
            keep_first_error(&mut outcome, self.apply(element, &selector, &config, origin));
        }
        outcome
    }

    fn process_removed_roots(&mut self, removed: &[NodeId]) -> Result<()> {
        let mut discarded = Vec::new();
        let mut outcome = Ok(());
        for root in removed {
            for element in self.dom.subtree_elements(*root) {
                let removal = self.on_removed(element, &mut discarded);
                keep_first_error(&mut outcome, removal);
            }
        }
        for context in discarded {
            self.discard_context(&context);
        }
        outcome
    }

    /// Fires `removed` once per active context and releases its refs. The
    /// contexts are handed back for discarding.
    fn on_removed(&mut self, element: NodeId, discarded: &mut Vec<Context>) -> Result<()> {
        let Some(contexts) = self.bindings.remove(&element) else {
            return Ok(());
        };
        discarded.extend(contexts.iter().cloned());
        let mut outcome = Ok(());
        for context in &contexts {
            self.release_ref(context);
            self.release_model_target(context);
            keep_first_error(&mut outcome, self.fire_lifecycle(context, Lifecycle::Removed));
        }
        outcome
    }

    /// Forgets a context together with everything it spawned: its listeners,
    /// the child configurations it registered and their contexts.
    pub(crate) fn discard_context(&mut self, context: &Context) {
        let id = context.id();
        let config_id = context.config().id();
        self.announced.remove(&(context.element(), config_id));
        let listeners = self.listeners.remove_owned(id);
        let (children, emptied) = self.registry.remove_owned(id);
        for selector in &emptied {
            self.dom.forget_selector(selector);
        }
        self.trace_line(format!(
            "[observe] discarded {id} ({listeners} listeners, {} children)",
            children.len()
        ));

        for child in children {
            let mut dropped = Vec::new();
            self.bindings.retain(|_, contexts| {
                contexts.retain(|existing| {
                    if existing.config() == child {
                        dropped.push(existing.clone());
                        false
                    } else {
                        true
                    }
                });
                !contexts.is_empty()
            });
            for context in dropped {
                self.discard_context(&context);
            }
        }
    }

    fn process_attribute_change(
        &mut self,
        target: NodeId,
        name: &str,
        old_value: Option<String>,
    ) -> Result<()> {
        let contexts = self.contexts(target);
        if contexts.is_empty() {
            return Ok(());
        }
        let new_value = self.dom.attr(target, name);
        let mut outcome = Ok(());
        for context in contexts {
            let config = context.config();
            for (attribute, action) in &config.inner().attr_changes {
                if attribute != name && attribute != "*" {
                    continue;
                }
                let detail = Value::object([
                    ("name", Value::from(name)),
                    ("old_value", Value::from(old_value.clone())),
                    ("new_value", Value::from(new_value.clone())),
                ]);
                let event = Event::new(
                    "attributechange",
                    target,
                    EventInit {
                        bubbles: false,
                        cancelable: false,
                        detail,
                    },
                );
                self.trace_line(format!(
                    "[observe] {name} changed on {}",
                    self.dom.node_label(target)
                ));
                let call = Call {
                    element: target,
                    target: context.target(),
                    context: &context,
                    event: Some(&event),
                };
                keep_first_error(&mut outcome, self.run_action(action, &call));
            }
        }
        outcome
    }
}

fn keep_first_error(outcome: &mut Result<()>, next: Result<()>) {
    if let Err(err) = next {
        if outcome.is_ok() {
            *outcome = Err(err);
        }
    }
}
