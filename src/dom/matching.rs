use super::*;
use crate::selector::{
    NthChildSelector, SelectorAttrCondition, SelectorCombinator, SelectorPart,
    SelectorPseudoClass, SelectorStep,
};

impl Document {
    pub(crate) fn matches_selector_chain(&self, node_id: NodeId, steps: &[SelectorPart]) -> bool {
        let Some(last) = steps.last() else {
            return false;
        };
        if !self.matches_step(node_id, &last.step) {
            return false;
        }

        let mut current = node_id;
        for idx in (1..steps.len()).rev() {
            let prev_step = &steps[idx - 1].step;
            let combinator = steps[idx]
                .combinator
                .unwrap_or(SelectorCombinator::Descendant);

            let matched = match combinator {
                SelectorCombinator::Child => self
                    .parent(current)
                    .filter(|parent| self.matches_step(*parent, prev_step)),
                SelectorCombinator::Descendant => {
                    let mut cursor = self.parent(current);
                    let mut found = None;
                    while let Some(parent) = cursor {
                        if self.matches_step(parent, prev_step) {
                            found = Some(parent);
                            break;
                        }
                        cursor = self.parent(parent);
                    }
                    found
                }
                SelectorCombinator::AdjacentSibling => self
                    .previous_element_sibling(current)
                    .filter(|sibling| self.matches_step(*sibling, prev_step)),
                SelectorCombinator::GeneralSibling => {
                    let mut cursor = self.previous_element_sibling(current);
                    let mut found = None;
                    while let Some(sibling) = cursor {
                        if self.matches_step(sibling, prev_step) {
                            found = Some(sibling);
                            break;
                        }
                        cursor = self.previous_element_sibling(sibling);
                    }
                    found
                }
            };

            let Some(matched) = matched else {
                return false;
            };
            current = matched;
        }

        true
    }

    pub(crate) fn matches_step(&self, node_id: NodeId, step: &SelectorStep) -> bool {
        let Some(element) = self.element(node_id) else {
            return false;
        };

        if !step.universal {
            if let Some(tag) = &step.tag {
                if !element.tag_name.eq_ignore_ascii_case(tag) {
                    return false;
                }
            }
        }

        if let Some(id) = &step.id {
            if element.attrs.get("id") != Some(id) {
                return false;
            }
        }

        if step
            .classes
            .iter()
            .any(|class_name| !has_class(element, class_name))
        {
            return false;
        }

        if !step
            .attrs
            .iter()
            .all(|cond| matches_attr_condition(element, cond))
        {
            return false;
        }

        step.pseudo_classes
            .iter()
            .all(|pseudo| self.matches_pseudo(node_id, element, pseudo))
    }

    fn matches_pseudo(&self, node_id: NodeId, element: &Element, pseudo: &SelectorPseudoClass) -> bool {
        match pseudo {
            SelectorPseudoClass::Root => self.parent(node_id) == Some(self.root),
            SelectorPseudoClass::FirstChild => self.previous_element_sibling(node_id).is_none(),
            SelectorPseudoClass::LastChild => self.next_element_sibling(node_id).is_none(),
            SelectorPseudoClass::OnlyChild => {
                self.previous_element_sibling(node_id).is_none()
                    && self.next_element_sibling(node_id).is_none()
            }
            SelectorPseudoClass::FirstOfType => self.type_position(node_id).is_some_and(|(i, _)| i == 1),
            SelectorPseudoClass::LastOfType => {
                self.type_position(node_id).is_some_and(|(i, total)| i == total)
            }
            SelectorPseudoClass::OnlyOfType => {
                self.type_position(node_id).is_some_and(|(_, total)| total == 1)
            }
            SelectorPseudoClass::Empty => self.children(node_id).is_empty(),
            SelectorPseudoClass::Checked => element.checked,
            SelectorPseudoClass::Disabled => element.disabled,
            SelectorPseudoClass::Enabled => !element.disabled,
            SelectorPseudoClass::NthChild(selector) => self.is_nth_child(node_id, selector, false),
            SelectorPseudoClass::NthLastChild(selector) => {
                self.is_nth_child(node_id, selector, true)
            }
            SelectorPseudoClass::Is(inners) | SelectorPseudoClass::Where(inners) => inners
                .iter()
                .any(|inner| self.matches_selector_chain(node_id, inner)),
            SelectorPseudoClass::Not(inners) => !inners
                .iter()
                .any(|inner| self.matches_selector_chain(node_id, inner)),
            SelectorPseudoClass::Has(inners) => {
                let descendants = self.subtree_elements(node_id);
                inners.iter().any(|inner| {
                    descendants
                        .iter()
                        .skip(1)
                        .any(|target| self.matches_selector_chain(*target, inner))
                })
            }
        }
    }

    fn sibling_elements(&self, node_id: NodeId) -> Vec<NodeId> {
        match self.parent(node_id) {
            Some(parent) => self.child_elements(parent),
            None => vec![node_id],
        }
    }

    pub(crate) fn previous_element_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let siblings = self.sibling_elements(node_id);
        let pos = siblings.iter().position(|id| *id == node_id)?;
        pos.checked_sub(1).map(|prev| siblings[prev])
    }

    pub(crate) fn next_element_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let siblings = self.sibling_elements(node_id);
        let pos = siblings.iter().position(|id| *id == node_id)?;
        siblings.get(pos + 1).copied()
    }

    fn is_nth_child(&self, node_id: NodeId, selector: &NthChildSelector, from_end: bool) -> bool {
        let siblings = self.sibling_elements(node_id);
        let Some(pos) = siblings.iter().position(|id| *id == node_id) else {
            return false;
        };
        let index = if from_end { siblings.len() - pos } else { pos + 1 };
        selector.matches_index(index)
    }

    /// 1-based position among same-tag siblings, plus their count.
    fn type_position(&self, node_id: NodeId) -> Option<(usize, usize)> {
        let tag = self.tag_name(node_id)?;
        let same = self
            .sibling_elements(node_id)
            .into_iter()
            .filter(|sibling| self.tag_name(*sibling) == Some(tag))
            .collect::<Vec<_>>();
        let pos = same.iter().position(|id| *id == node_id)?;
        Some((pos + 1, same.len()))
    }
}

fn matches_attr_condition(element: &Element, cond: &SelectorAttrCondition) -> bool {
    match cond {
        SelectorAttrCondition::Exists { key } => element.attrs.contains_key(key),
        SelectorAttrCondition::Eq { key, value } => element.attrs.get(key) == Some(value),
        SelectorAttrCondition::StartsWith { key, value } => element
            .attrs
            .get(key)
            .is_some_and(|attr| !value.is_empty() && attr.starts_with(value)),
        SelectorAttrCondition::EndsWith { key, value } => element
            .attrs
            .get(key)
            .is_some_and(|attr| !value.is_empty() && attr.ends_with(value)),
        SelectorAttrCondition::Contains { key, value } => element
            .attrs
            .get(key)
            .is_some_and(|attr| !value.is_empty() && attr.contains(value)),
        SelectorAttrCondition::Includes { key, value } => element
            .attrs
            .get(key)
            .is_some_and(|attr| attr.split_whitespace().any(|token| token == value)),
        SelectorAttrCondition::DashMatch { key, value } => element
            .attrs
            .get(key)
            .is_some_and(|attr| attr == value || attr.starts_with(&format!("{value}-"))),
    }
}
