use super::*;

use crate::config::{ConfigBuilder, Data};
use crate::engine::Engine;
use crate::registry::ChildKey;
use crate::selector::split_selector_groups;

const ROOT_MARKER: &str = ":root";
const SCOPE_MARKER: &str = ":scope";

impl Engine {
    /// Turns a nested directive entry into a registered child configuration.
    ///
    /// A key starting with `:root` matches anywhere in the document. Any
    /// other key is composed under `parent_selector` and scoped to the
    /// owner's element. Either way the child targets the owner's element
    /// and reads through the owner's context.
    pub(crate) fn resolve_child(
        &mut self,
        owner: &Context,
        kind: &str,
        parent_selector: &str,
        key: &str,
        child: ConfigBuilder,
    ) -> Result<()> {
        let element = owner.element();
        let trimmed = key.trim();
        let mut child = child.target(element).data(Data::Inherit(owner.clone()));
        let selector = if trimmed.starts_with(ROOT_MARKER) {
            trimmed.to_string()
        } else {
            child = child.scope(element);
            let composed = compose_selector(parent_selector, trimmed)?;
            self.format_placeholders(element, &composed)
        };
        let config = child.build();

        let child_key = ChildKey {
            owner: owner.id(),
            kind: kind.to_string(),
            key: key.to_string(),
        };
        if !self.registry.insert_child(child_key, &selector, &config)? {
            self.trace_line(format!(
                "[bind] child {kind} {key} of {} already registered",
                owner.id()
            ));
            return Ok(());
        }
        self.trace_line(format!(
            "[bind] child {kind} {selector} for {} ({})",
            self.dom.node_label(element),
            config.id()
        ));
        self.scan(&selector, &config)
    }

    /// Replaces each `{name}` with the element's `data-name` attribute when
    /// it is present and non-empty.
    pub(crate) fn format_placeholders(&self, element: NodeId, selector: &str) -> String {
        let mut out = String::with_capacity(selector.len());
        let mut rest = selector;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open + 1..];
            let Some(close) = tail.find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };
            let name = &tail[..close];
            let is_word = !name.is_empty()
                && name
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
            match is_word
                .then(|| self.dom.dataset_get(element, name))
                .flatten()
                .filter(|value| !value.is_empty())
            {
                Some(value) => out.push_str(&value),
                None => out.push_str(&rest[open..open + close + 2]),
            }
            rest = &tail[close + 1..];
        }
        out.push_str(rest);
        out
    }
}

/// Descendant composition of a parent selector list and a child key.
/// `:scope` at the start of the key stands for the parent itself.
pub(crate) fn compose_selector(parent_selector: &str, key: &str) -> Result<String> {
    let parents = if parent_selector.trim().is_empty() {
        vec![String::new()]
    } else {
        split_selector_groups(parent_selector)?
    };
    let mut composed = Vec::new();
    for child in split_selector_groups(key)? {
        let child = child
            .strip_prefix(SCOPE_MARKER)
            .map(str::trim_start)
            .unwrap_or(&child)
            .to_string();
        for parent in &parents {
            let joined = format!("{parent} {child}");
            let joined = joined.trim();
            if !joined.is_empty() {
                composed.push(joined.to_string());
            }
        }
    }
    Ok(composed.join(", "))
}
