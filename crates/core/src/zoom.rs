use serde::{Deserialize, Serialize};

use crate::model::{NodeId, RecordId, Tree};

pub const DEFAULT_SHOW_TO_DEPTH: u32 = 1;

/// Which subtree fills the viewport and how deep it is drawn.
///
/// Only [`zoom_in`](ZoomState::zoom_in), [`zoom_out`](ZoomState::zoom_out)
/// and [`reset`](ZoomState::reset) change it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomState {
    /// `None` means the true root.
    pub root_node_id: Option<RecordId>,
    /// Deepest depth rendered, counted from the true root.
    pub show_to_depth: u32,
}

impl Default for ZoomState {
    fn default() -> Self {
        Self {
            root_node_id: None,
            show_to_depth: DEFAULT_SHOW_TO_DEPTH,
        }
    }
}

impl ZoomState {
    pub fn new(root_node_id: Option<RecordId>, show_to_depth: u32) -> Self {
        Self {
            root_node_id,
            show_to_depth,
        }
    }

    /// Isolate `node` and reveal one more level below it.
    pub fn zoom_in(&mut self, tree: &Tree, node: NodeId) {
        let n = tree.node(node);
        if n.height > 0 {
            self.show_to_depth = n.depth + 1;
        }
        self.root_node_id = Some(n.record.clone());
        tracing::debug!(root = %n.record, depth = self.show_to_depth, "zoom in");
    }

    /// Step back out: the grandparent (else parent, else the node) becomes root.
    pub fn zoom_out(&mut self, tree: &Tree, node: NodeId) {
        let n = tree.node(node);
        if n.depth > 0 {
            self.show_to_depth = n.depth - 1;
        }
        let ancestor = n
            .parent
            .and_then(|p| tree.node(p).parent)
            .or(n.parent)
            .unwrap_or(node);
        let root = tree.node(ancestor).record.clone();
        tracing::debug!(root = %root, depth = self.show_to_depth, "zoom out");
        self.root_node_id = Some(root);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
