use super::*;
use std::collections::VecDeque;

/// One structural or attribute change of a connected node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attributes {
        target: NodeId,
        name: String,
        old_value: Option<String>,
    },
}

impl MutationRecord {
    pub fn target(&self) -> NodeId {
        match self {
            Self::ChildList { target, .. } | Self::Attributes { target, .. } => *target,
        }
    }
}

/// Pending records, delivered in the order the mutations happened.
#[derive(Debug)]
pub(crate) struct MutationFeed {
    observing: bool,
    pending: VecDeque<MutationRecord>,
}

impl Default for MutationFeed {
    fn default() -> Self {
        Self {
            observing: true,
            pending: VecDeque::new(),
        }
    }
}

impl MutationFeed {
    pub(super) fn record(&mut self, record: MutationRecord) {
        if self.observing {
            self.pending.push_back(record);
        }
    }

    pub(crate) fn set_observing(&mut self, observing: bool) {
        self.observing = observing;
        if !observing {
            self.pending.clear();
        }
    }

    pub(crate) fn is_observing(&self) -> bool {
        self.observing
    }

    pub(crate) fn take(&mut self) -> Vec<MutationRecord> {
        self.pending.drain(..).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

impl Document {
    /// Drains every pending record.
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        self.feed.take()
    }
}
