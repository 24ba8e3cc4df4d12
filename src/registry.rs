use super::*;

use crate::config::Config;
use crate::selector::parse_selector_groups;

#[derive(Debug)]
struct RegistryEntry {
    selector: String,
    configs: Vec<Config>,
}

/// Identity of a child configuration spawned by a directive: the context
/// that spawned it, which directive, and the child key as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ChildKey {
    pub(crate) owner: ContextId,
    pub(crate) kind: String,
    pub(crate) key: String,
}

/// Selector → configurations, in registration order.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    entries: Vec<RegistryEntry>,
    index: HashMap<String, usize>,
    children: HashMap<ChildKey, (String, Config)>,
    by_owner: HashMap<ContextId, Vec<ChildKey>>,
}

/// Position in a lazy [`Registry::next_match`] walk. Indices stay valid while the
/// registry grows, so entries appended mid-walk are still visited. Entries are
/// only dropped when their owner is discarded, which happens outside a walk or,
/// for a failed bind, to entries appended after the cursor.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct MatchCursor {
    entry: usize,
    config: usize,
}

impl Registry {
    /// Adds `config` under `selector`. Returns `false` when the pair was
    /// already present.
    pub(crate) fn insert(&mut self, selector: &str, config: &Config) -> Result<bool> {
        let idx = match self.index.get(selector) {
            Some(idx) => *idx,
            None => {
                parse_selector_groups(selector)?;
                let idx = self.entries.len();
                self.entries.push(RegistryEntry {
                    selector: selector.to_string(),
                    configs: Vec::new(),
                });
                self.index.insert(selector.to_string(), idx);
                idx
            }
        };
        let configs = &mut self.entries[idx].configs;
        if configs.contains(config) {
            return Ok(false);
        }
        configs.push(config.clone());
        Ok(true)
    }

    /// Removes `config` from `selector`. An entry left without
    /// configurations is dropped; the return value says whether it was.
    pub(crate) fn remove(&mut self, selector: &str, config: &Config) -> bool {
        let Some(idx) = self.index.get(selector).copied() else {
            return false;
        };
        let configs = &mut self.entries[idx].configs;
        configs.retain(|existing| existing != config);
        if !configs.is_empty() {
            return false;
        }
        self.entries.remove(idx);
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (entry.selector.clone(), idx))
            .collect();
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.iter().map(|entry| entry.configs.len()).sum()
    }

    pub(crate) fn selectors(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| !entry.configs.is_empty())
            .map(|entry| entry.selector.clone())
            .collect()
    }

    /// Next `(selector, config)` pair whose selector `element` satisfies.
    /// The selector is re-tested for every configuration, since handlers
    /// run between steps and may have changed the element.
    pub(crate) fn next_match(
        &self,
        dom: &Document,
        element: NodeId,
        cursor: &mut MatchCursor,
    ) -> Result<Option<(String, Config)>> {
        while let Some(entry) = self.entries.get(cursor.entry) {
            let Some(config) = entry.configs.get(cursor.config) else {
                cursor.entry += 1;
                cursor.config = 0;
                continue;
            };
            cursor.config += 1;
            if dom.matches(element, &entry.selector)? {
                return Ok(Some((entry.selector.clone(), config.clone())));
            }
        }
        Ok(None)
    }

    /// Registers a child configuration under its canonical key. Returns
    /// `false` when the key is already registered.
    pub(crate) fn insert_child(
        &mut self,
        key: ChildKey,
        selector: &str,
        config: &Config,
    ) -> Result<bool> {
        if self.children.contains_key(&key) {
            return Ok(false);
        }
        self.insert(selector, config)?;
        self.by_owner
            .entry(key.owner)
            .or_default()
            .push(key.clone());
        self.children
            .insert(key, (selector.to_string(), config.clone()));
        Ok(true)
    }

    /// Unregisters every child configuration spawned by `owner`. Returns
    /// the configurations and the selectors that no longer have any.
    pub(crate) fn remove_owned(&mut self, owner: ContextId) -> (Vec<Config>, Vec<String>) {
        let Some(keys) = self.by_owner.remove(&owner) else {
            return (Vec::new(), Vec::new());
        };
        let mut removed = Vec::new();
        let mut emptied = Vec::new();
        for key in keys {
            if let Some((selector, config)) = self.children.remove(&key) {
                if self.remove(&selector, &config) {
                    emptied.push(selector);
                }
                removed.push(config);
            }
        }
        (removed, emptied)
    }

    #[cfg(test)]
    pub(crate) fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn child_count(&self) -> usize {
        self.children.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.children.clear();
        self.by_owner.clear();
    }
}
