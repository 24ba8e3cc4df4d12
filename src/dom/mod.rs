use super::*;
use crate::selector::{SelectorGroups, parse_selector_groups};

mod html;
mod matching;
mod mutation;

pub use mutation::MutationRecord;
pub(crate) use mutation::MutationFeed;

#[derive(Debug, Clone)]
pub(crate) enum NodeType {
    Document,
    Fragment,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    node_type: NodeType,
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    pub(crate) attrs: HashMap<String, String>,
    pub(crate) value: String,
    pub(crate) checked: bool,
    pub(crate) disabled: bool,
}

impl Element {
    fn new(tag_name: &str, attrs: HashMap<String, String>) -> Self {
        Self {
            tag_name: tag_name.to_ascii_lowercase(),
            value: attrs.get("value").cloned().unwrap_or_default(),
            checked: attrs.contains_key("checked"),
            disabled: attrs.contains_key("disabled"),
            attrs,
        }
    }
}

/// The host document tree: an arena of nodes plus the structural mutation
/// feed the engine drains.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    id_index: HashMap<String, NodeId>,
    feed: MutationFeed,
    selector_cache: RefCell<HashMap<String, Rc<SelectorGroups>>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                node_type: NodeType::Document,
            }],
            root: NodeId(0),
            id_index: HashMap::new(),
            feed: MutationFeed::default(),
            selector_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Builds a document from markup. Parsing does not produce mutation
    /// records.
    pub fn parse(markup: &str) -> Result<Self> {
        let mut dom = Self::new();
        let root = dom.root;
        html::parse_into(&mut dom, root, markup)?;
        dom.rebuild_id_index();
        Ok(dom)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn create_node(&mut self, parent: Option<NodeId>, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            node_type,
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id.0].children.push(id);
        }
        id
    }

    /// Creates a detached element.
    pub fn create_element(&mut self, tag_name: &str) -> NodeId {
        self.create_node(None, NodeType::Element(Element::new(tag_name, HashMap::new())))
    }

    pub fn create_element_with_attrs<'a, I>(&mut self, tag_name: &str, attrs: I) -> NodeId
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let attrs = attrs
            .into_iter()
            .map(|(key, value)| (key.to_ascii_lowercase(), value.to_string()))
            .collect();
        self.create_node(None, NodeType::Element(Element::new(tag_name, attrs)))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.create_node(None, NodeType::Text(text.to_string()))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.create_node(None, NodeType::Fragment)
    }

    /// Parses markup into a new detached fragment.
    pub fn create_fragment_from_html(&mut self, markup: &str) -> Result<NodeId> {
        let fragment = self.create_fragment();
        html::parse_into(self, fragment, markup)?;
        Ok(fragment)
    }

    pub(crate) fn append_parsed_element(
        &mut self,
        parent: NodeId,
        tag_name: &str,
        attrs: HashMap<String, String>,
    ) -> NodeId {
        self.create_node(Some(parent), NodeType::Element(Element::new(tag_name, attrs)))
    }

    pub(crate) fn append_parsed_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.create_node(Some(parent), NodeType::Text(text))
    }

    pub(crate) fn node_type(&self, node_id: NodeId) -> Option<&NodeType> {
        self.nodes.get(node_id.0).map(|node| &node.node_type)
    }

    pub(crate) fn element(&self, node_id: NodeId) -> Option<&Element> {
        match self.node_type(node_id) {
            Some(NodeType::Element(element)) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, node_id: NodeId) -> Option<&mut Element> {
        match self.nodes.get_mut(node_id.0).map(|node| &mut node.node_type) {
            Some(NodeType::Element(element)) => Some(element),
            _ => None,
        }
    }

    fn require_element(&self, node_id: NodeId, op: &str) -> Result<&Element> {
        self.element(node_id)
            .ok_or_else(|| Error::InvalidNode(format!("{op} target {node_id} is not an element")))
    }

    pub fn is_element(&self, node_id: NodeId) -> bool {
        self.element(node_id).is_some()
    }

    pub fn is_fragment(&self, node_id: NodeId) -> bool {
        matches!(self.node_type(node_id), Some(NodeType::Fragment))
    }

    pub fn is_valid_node(&self, node_id: NodeId) -> bool {
        node_id.0 < self.nodes.len()
    }

    pub fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        self.element(node_id).map(|e| e.tag_name.as_str())
    }

    pub fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes.get(node_id.0).and_then(|node| node.parent)
    }

    pub fn children(&self, node_id: NodeId) -> &[NodeId] {
        self.nodes
            .get(node_id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    pub fn child_elements(&self, node_id: NodeId) -> Vec<NodeId> {
        self.children(node_id)
            .iter()
            .copied()
            .filter(|child| self.is_element(*child))
            .collect()
    }

    /// Strict descendant test: a node is not its own descendant.
    pub fn is_descendant_of(&self, node_id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = self.parent(node_id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// `node_id` is `ancestor` itself or one of its descendants.
    pub fn contains(&self, ancestor: NodeId, node_id: NodeId) -> bool {
        node_id == ancestor || self.is_descendant_of(node_id, ancestor)
    }

    pub fn is_connected(&self, node_id: NodeId) -> bool {
        let mut cursor = Some(node_id);
        while let Some(node) = cursor {
            if node == self.root {
                return true;
            }
            cursor = self.parent(node);
        }
        false
    }

    pub fn document_element(&self) -> Option<NodeId> {
        self.child_elements(self.root).into_iter().next()
    }

    pub fn body(&self) -> Option<NodeId> {
        let html = self.document_element()?;
        if self.tag_name(html) == Some("body") {
            return Some(html);
        }
        self.child_elements(html)
            .into_iter()
            .find(|child| self.tag_name(*child) == Some("body"))
    }

    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).copied()
    }

    fn rebuild_id_index(&mut self) {
        let mut next = HashMap::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if let NodeType::Element(element) = &self.nodes[node.0].node_type {
                if let Some(id) = element.attrs.get("id") {
                    if !id.is_empty() {
                        next.entry(id.clone()).or_insert(node);
                    }
                }
            }
            for child in self.nodes[node.0].children.iter().rev() {
                stack.push(*child);
            }
        }
        self.id_index = next;
    }

    pub fn attr(&self, node_id: NodeId, name: &str) -> Option<String> {
        self.element(node_id)
            .and_then(|element| element.attrs.get(&name.to_ascii_lowercase()).cloned())
    }

    pub fn has_attr(&self, node_id: NodeId, name: &str) -> bool {
        self.element(node_id)
            .is_some_and(|element| element.attrs.contains_key(&name.to_ascii_lowercase()))
    }

    pub fn set_attr(&mut self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        self.require_element(node_id, "setAttribute")?;
        let name = name.to_ascii_lowercase();
        let connected = self.is_connected(node_id);
        let Some(element) = self.element_mut(node_id) else {
            return Ok(());
        };
        let old_value = element.attrs.insert(name.clone(), value.to_string());
        match name.as_str() {
            "value" => element.value = value.to_string(),
            "checked" => element.checked = true,
            "disabled" => element.disabled = true,
            _ => {}
        }
        if name == "id" {
            self.rebuild_id_index();
        }
        if connected && old_value.as_deref() != Some(value) {
            self.feed.record(MutationRecord::Attributes {
                target: node_id,
                name,
                old_value,
            });
        }
        Ok(())
    }

    pub fn remove_attr(&mut self, node_id: NodeId, name: &str) -> Result<()> {
        self.require_element(node_id, "removeAttribute")?;
        let name = name.to_ascii_lowercase();
        let connected = self.is_connected(node_id);
        let Some(element) = self.element_mut(node_id) else {
            return Ok(());
        };
        let old_value = element.attrs.remove(&name);
        match name.as_str() {
            "checked" => element.checked = false,
            "disabled" => element.disabled = false,
            _ => {}
        }
        if name == "id" {
            self.rebuild_id_index();
        }
        if connected && old_value.is_some() {
            self.feed.record(MutationRecord::Attributes {
                target: node_id,
                name,
                old_value,
            });
        }
        Ok(())
    }

    /// Reads `data-*` attributes by their dataset key (`fooBar` → `data-foo-bar`).
    pub fn dataset_get(&self, node_id: NodeId, key: &str) -> Option<String> {
        self.attr(node_id, &dataset_key_to_attr_name(key))
    }

    pub fn class_contains(&self, node_id: NodeId, class_name: &str) -> bool {
        self.element(node_id)
            .is_some_and(|element| has_class(element, class_name))
    }

    pub fn class_add(&mut self, node_id: NodeId, class_name: &str) -> Result<()> {
        let element = self.require_element(node_id, "classList.add")?;
        let mut classes = class_tokens(element.attrs.get("class").map(String::as_str));
        if classes.iter().any(|name| name == class_name) {
            return Ok(());
        }
        classes.push(class_name.to_string());
        self.set_attr(node_id, "class", &classes.join(" "))
    }

    pub fn class_remove(&mut self, node_id: NodeId, class_name: &str) -> Result<()> {
        let element = self.require_element(node_id, "classList.remove")?;
        let mut classes = class_tokens(element.attrs.get("class").map(String::as_str));
        let before = classes.len();
        classes.retain(|name| name != class_name);
        if classes.len() == before {
            return Ok(());
        }
        self.set_attr(node_id, "class", &classes.join(" "))
    }

    pub fn class_toggle(&mut self, node_id: NodeId, class_name: &str) -> Result<bool> {
        if self.class_contains(node_id, class_name) {
            self.class_remove(node_id, class_name)?;
            Ok(false)
        } else {
            self.class_add(node_id, class_name)?;
            Ok(true)
        }
    }

    pub fn text_content(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![node_id];
        while let Some(node) = stack.pop() {
            match self.node_type(node) {
                Some(NodeType::Text(text)) => out.push_str(text),
                Some(_) => stack.extend(self.children(node).iter().rev().copied()),
                None => {}
            }
        }
        out
    }

    pub fn set_text_content(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        self.require_element(node_id, "textContent")?;
        let removed = self.detach_children(node_id);
        let mut added = Vec::new();
        if !value.is_empty() {
            added.push(self.create_node(Some(node_id), NodeType::Text(value.to_string())));
        }
        self.record_child_list(node_id, added, removed);
        self.rebuild_id_index();
        Ok(())
    }

    /// Replaces the children of `node_id` with the parsed markup.
    pub fn set_inner_html(&mut self, node_id: NodeId, markup: &str) -> Result<()> {
        self.require_element(node_id, "innerHTML")?;
        let fragment = self.create_fragment_from_html(markup)?;
        let removed = self.detach_children(node_id);
        self.record_child_list(node_id, Vec::new(), removed);
        self.append_child(node_id, fragment)
    }

    pub fn inner_html(&self, node_id: NodeId) -> String {
        self.children(node_id)
            .iter()
            .map(|child| self.dump_node(*child))
            .collect()
    }

    /// Form-control value (`input`, `textarea`, `select`).
    pub fn value(&self, node_id: NodeId) -> Option<String> {
        self.element(node_id).map(|element| element.value.clone())
    }

    pub fn set_value(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        self.require_element(node_id, "value")?;
        if let Some(element) = self.element_mut(node_id) {
            element.value = value.to_string();
        }
        Ok(())
    }

    pub fn checked(&self, node_id: NodeId) -> bool {
        self.element(node_id).is_some_and(|element| element.checked)
    }

    pub fn set_checked(&mut self, node_id: NodeId, checked: bool) -> Result<()> {
        self.require_element(node_id, "checked")?;
        if let Some(element) = self.element_mut(node_id) {
            element.checked = checked;
        }
        Ok(())
    }

    pub fn disabled(&self, node_id: NodeId) -> bool {
        self.element(node_id).is_some_and(|element| element.disabled)
    }

    /// Elements whose displayed state is their `value` rather than their text.
    pub fn is_value_control(&self, node_id: NodeId) -> bool {
        matches!(self.tag_name(node_id), Some("input" | "textarea" | "select"))
    }

    fn detach_children(&mut self, parent: NodeId) -> Vec<NodeId> {
        let old_children = std::mem::take(&mut self.nodes[parent.0].children);
        for child in &old_children {
            self.nodes[child.0].parent = None;
        }
        old_children
    }

    fn record_child_list(&mut self, target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) {
        if (added.is_empty() && removed.is_empty()) || !self.is_connected(target) {
            return;
        }
        self.feed.record(MutationRecord::ChildList {
            target,
            added,
            removed,
        });
    }

    fn check_insertion(&self, parent: NodeId, child: NodeId, op: &str) -> Result<()> {
        if !self.is_valid_node(parent) || !self.is_valid_node(child) {
            return Err(Error::InvalidNode(format!("{op} node is invalid")));
        }
        if !matches!(
            self.node_type(parent),
            Some(NodeType::Document | NodeType::Fragment | NodeType::Element(_))
        ) {
            return Err(Error::Dom(format!("{op} target cannot have children")));
        }
        if child == self.root || child == parent {
            return Err(Error::Dom(format!("invalid {op} node")));
        }
        // Prevent cycles: parent must not be inside child's subtree.
        if self.is_descendant_of(parent, child) {
            return Err(Error::Dom(format!("{op} would create a cycle")));
        }
        Ok(())
    }

    /// Nodes to splice in for `child`: a fragment contributes its children.
    fn take_insertable(&mut self, child: NodeId) -> Vec<NodeId> {
        if self.is_fragment(child) {
            return self.detach_children(child);
        }
        if let Some(old_parent) = self.parent(child) {
            self.nodes[old_parent.0].children.retain(|id| *id != child);
            self.nodes[child.0].parent = None;
            self.record_child_list(old_parent, Vec::new(), vec![child]);
        }
        vec![child]
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_insertion(parent, child, "appendChild")?;
        let inserted = self.take_insertable(child);
        for node in &inserted {
            self.nodes[node.0].parent = Some(parent);
        }
        self.nodes[parent.0].children.extend(inserted.iter().copied());
        self.record_child_list(parent, inserted, Vec::new());
        self.rebuild_id_index();
        Ok(())
    }

    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) -> Result<()> {
        self.check_insertion(parent, child, "insertBefore")?;
        if self.parent(reference) != Some(parent) {
            return Err(Error::Dom("insertBefore reference is not a direct child".into()));
        }
        if child == reference {
            return Ok(());
        }
        let inserted = self.take_insertable(child);
        let index = self.nodes[parent.0]
            .children
            .iter()
            .position(|id| *id == reference)
            .ok_or_else(|| Error::Dom("insertBefore reference is missing".into()))?;
        for node in &inserted {
            self.nodes[node.0].parent = Some(parent);
        }
        self.nodes[parent.0]
            .children
            .splice(index..index, inserted.iter().copied());
        self.record_child_list(parent, inserted, Vec::new());
        self.rebuild_id_index();
        Ok(())
    }

    /// Detaches `node` from its parent; a no-op for detached nodes.
    pub fn remove_node(&mut self, node: NodeId) -> Result<()> {
        if node == self.root {
            return Err(Error::Dom("cannot remove document root".into()));
        }
        if !self.is_valid_node(node) {
            return Err(Error::InvalidNode("removeChild node is invalid".into()));
        }
        let Some(parent) = self.parent(node) else {
            return Ok(());
        };
        self.nodes[parent.0].children.retain(|id| *id != node);
        self.nodes[node.0].parent = None;
        self.record_child_list(parent, Vec::new(), vec![node]);
        self.rebuild_id_index();
        Ok(())
    }

    /// Element nodes of the subtree rooted at `root`, root first, in
    /// document order. Iterative so deep trees cannot exhaust the stack.
    pub fn subtree_elements(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if self.is_element(node) {
                out.push(node);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    pub(crate) fn parsed_selector(&self, selector: &str) -> Result<Rc<SelectorGroups>> {
        if let Some(groups) = self.selector_cache.borrow().get(selector) {
            return Ok(groups.clone());
        }
        let groups = Rc::new(parse_selector_groups(selector)?);
        self.selector_cache
            .borrow_mut()
            .insert(selector.to_string(), groups.clone());
        Ok(groups)
    }

    /// Drops the parsed form of a selector nothing is registered under.
    pub(crate) fn forget_selector(&self, selector: &str) {
        self.selector_cache.borrow_mut().remove(selector);
    }

    #[cfg(test)]
    pub(crate) fn cached_selector_count(&self) -> usize {
        self.selector_cache.borrow().len()
    }

    pub fn matches(&self, node_id: NodeId, selector: &str) -> Result<bool> {
        let groups = self.parsed_selector(selector)?;
        Ok(self.is_element(node_id)
            && groups
                .iter()
                .any(|steps| self.matches_selector_chain(node_id, steps)))
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let groups = self.parsed_selector(selector)?;
        Ok(self
            .subtree_elements(self.root)
            .into_iter()
            .filter(|candidate| {
                groups
                    .iter()
                    .any(|steps| self.matches_selector_chain(*candidate, steps))
            })
            .collect())
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    /// First element at or below `root` matching `selector`, in pre-order.
    pub fn find_descendant(&self, root: NodeId, selector: &str) -> Result<Option<NodeId>> {
        let groups = self.parsed_selector(selector)?;
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if self.is_element(node)
                && groups
                    .iter()
                    .any(|steps| self.matches_selector_chain(node, steps))
            {
                return Ok(Some(node));
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        Ok(None)
    }

    /// Every element at or below `root` matching `selector`, in pre-order.
    pub fn find_all_descendants(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>> {
        let groups = self.parsed_selector(selector)?;
        Ok(self
            .subtree_elements(root)
            .into_iter()
            .filter(|node| {
                groups
                    .iter()
                    .any(|steps| self.matches_selector_chain(*node, steps))
            })
            .collect())
    }

    pub(crate) fn feed_mut(&mut self) -> &mut MutationFeed {
        &mut self.feed
    }

    pub fn pending_mutations(&self) -> usize {
        self.feed.len()
    }

    pub fn is_observed(&self) -> bool {
        self.feed.is_observing()
    }

    pub fn dump_node(&self, node_id: NodeId) -> String {
        match self.node_type(node_id) {
            Some(NodeType::Text(text)) => escape_html_text(text),
            Some(NodeType::Element(element)) => {
                let mut attrs = element.attrs.iter().collect::<Vec<_>>();
                attrs.sort_by(|a, b| a.0.cmp(b.0));
                let mut out = format!("<{}", element.tag_name);
                for (key, value) in attrs {
                    out.push_str(&format!(" {key}=\"{}\"", escape_html_attr(value)));
                }
                out.push('>');
                if html::is_void_tag(&element.tag_name) {
                    return out;
                }
                out.push_str(&self.inner_html(node_id));
                out.push_str(&format!("</{}>", element.tag_name));
                out
            }
            Some(NodeType::Document | NodeType::Fragment) => self.inner_html(node_id),
            None => String::new(),
        }
    }

    /// Short label used in trace lines (`#id`, or the tag name).
    pub(crate) fn node_label(&self, node: NodeId) -> String {
        if let Some(id) = self.attr(node, "id").filter(|id| !id.is_empty()) {
            return format!("#{id}");
        }
        self.tag_name(node)
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| node.to_string())
    }
}

fn has_class(element: &Element, class_name: &str) -> bool {
    element
        .attrs
        .get("class")
        .is_some_and(|classes| classes.split_whitespace().any(|name| name == class_name))
}

fn class_tokens(class_attr: Option<&str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in class_attr.unwrap_or_default().split_whitespace() {
        if !out.iter().any(|existing| existing == token) {
            out.push(token.to_string());
        }
    }
    out
}

fn dataset_key_to_attr_name(key: &str) -> String {
    let mut out = String::from("data-");
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn escape_html_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_html_attr(value: &str) -> String {
    escape_html_text(value).replace('"', "&quot;")
}
