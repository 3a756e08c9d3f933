use crate::model::{NodeId, RecordId};
use crate::treemap::{LaidOutNode, TreemapLayout};
use crate::zoom::ZoomState;

/// Ids drawn on top of everything else, in paint order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stacking {
    pub selection: Vec<RecordId>,
    pub focused: Option<RecordId>,
}

impl Stacking {
    pub fn new(selection: Vec<RecordId>, focused: Option<RecordId>) -> Self {
        Self {
            selection,
            focused,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selection.is_empty() && self.focused.is_none()
    }

    /// Position in the combined selection-then-focused list; unlisted ids sort first.
    fn rank(&self, id: &RecordId) -> isize {
        self.selection
            .iter()
            .chain(self.focused.iter())
            .position(|s| s == id)
            .map_or(-1, |p| p as isize)
    }
}

/// Nodes to draw for `zoom`, in paint order.
///
/// A node is drawn when it sits exactly at `show_to_depth`, or is a leaf
/// above it, and it lies under the zoom root. An unknown zoom root yields
/// an empty list.
pub fn select(layout: &TreemapLayout, zoom: &ZoomState, stacking: &Stacking) -> Vec<LaidOutNode> {
    let tree = layout.tree();
    let root: Option<NodeId> = match &zoom.root_node_id {
        None => None,
        Some(record) => match tree.find(record) {
            Some(id) => Some(id),
            None => {
                tracing::warn!(root = %record, "zoom root not in tree, nothing to show");
                return Vec::new();
            }
        },
    };

    let depth = zoom.show_to_depth;
    let mut visible: Vec<LaidOutNode> = tree
        .descendants()
        .into_iter()
        .filter(|&id| {
            let n = tree.node(id);
            n.depth == depth || (n.depth < depth && n.is_leaf())
        })
        .filter(|&id| root.map_or(true, |r| tree.has_ancestor(id, r)))
        .map(|id| layout.node(id))
        .collect();

    if !stacking.is_empty() {
        visible.sort_by_key(|n| stacking.rank(&n.id));
    }
    visible
}
