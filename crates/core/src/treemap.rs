use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::model::{NodeId, RecordId, Tree};

/// Golden ratio, the default target aspect ratio for squarified rows.
pub const PHI: f64 = 1.618_033_988_749_895;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    /// Negative or non-finite dimensions collapse to zero.
    pub fn new(width: f64, height: f64) -> Self {
        let clean = |v: f64| if v.is_finite() && v > 0.0 { v } else { 0.0 };
        Self {
            width: clean(width),
            height: clean(height),
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Rectangle bounds in layout space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Bounds {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn contains(&self, other: &Bounds, tolerance: f64) -> bool {
        other.x0 >= self.x0 - tolerance
            && other.y0 >= self.y0 - tolerance
            && other.x1 <= self.x1 + tolerance
            && other.y1 <= self.y1 + tolerance
    }

    /// Interiors intersect by more than `tolerance` on both axes.
    pub fn overlaps(&self, other: &Bounds, tolerance: f64) -> bool {
        let dx = self.x1.min(other.x1) - self.x0.max(other.x0);
        let dy = self.y1.min(other.y1) - self.y0.max(other.y0);
        dx > tolerance && dy > tolerance
    }

    fn round(&mut self) {
        self.x0 = self.x0.round();
        self.y0 = self.y0.round();
        self.x1 = self.x1.round();
        self.y1 = self.y1.round();
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TilingStrategy {
    Squarify,
    /// Squarify once, then keep each parent's rows while its children stay the same.
    #[default]
    Resquarify,
    /// Children stacked vertically.
    Slice,
    /// Children laid side by side horizontally.
    Dice,
    /// Dice at even depths, slice at odd depths.
    SliceDice,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    pub padding: f64,
    pub round: bool,
    pub tile: TilingStrategy,
    pub ratio: f64,
    /// Layout weight given to leaves whose value is zero or negative.
    pub epsilon: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            padding: 0.0,
            round: true,
            tile: TilingStrategy::Resquarify,
            ratio: PHI,
            epsilon: 1e-9,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Row {
    dice: bool,
    members: Vec<RecordId>,
}

#[derive(Clone, Debug, PartialEq)]
struct RowSet {
    ratio: f64,
    rows: Vec<Row>,
}

/// A hierarchy node together with its computed bounds.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LaidOutNode {
    pub node: NodeId,
    pub id: RecordId,
    pub depth: u32,
    pub height: u32,
    pub value: f64,
    pub is_leaf: bool,
    #[serde(flatten)]
    pub bounds: Bounds,
}

/// Result of laying a tree out in a viewport.
///
/// Produced by [`layout`], [`relayout`] and [`resize`]; never mutated after
/// construction.
#[derive(Clone, Debug)]
pub struct TreemapLayout {
    tree: Arc<Tree>,
    viewport: Viewport,
    options: LayoutOptions,
    bounds: Vec<Bounds>,
    rows: HashMap<RecordId, RowSet>,
}

impl TreemapLayout {
    pub fn tree(&self) -> &Arc<Tree> {
        &self.tree
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    pub fn bounds(&self, id: NodeId) -> Bounds {
        self.bounds[id.index()]
    }

    pub fn node(&self, id: NodeId) -> LaidOutNode {
        let n = self.tree.node(id);
        LaidOutNode {
            node: id,
            id: n.record.clone(),
            depth: n.depth,
            height: n.height,
            value: n.aggregate,
            is_leaf: n.is_leaf(),
            bounds: self.bounds[id.index()],
        }
    }

    pub fn find(&self, record: &RecordId) -> Option<LaidOutNode> {
        self.tree.find(record).map(|id| self.node(id))
    }

    /// All nodes in breadth-first order.
    pub fn nodes(&self) -> impl Iterator<Item = LaidOutNode> + '_ {
        self.tree.descendants().into_iter().map(move |id| self.node(id))
    }
}

/// Lays `tree` out from scratch.
pub fn layout(tree: Arc<Tree>, viewport: Viewport, options: LayoutOptions) -> TreemapLayout {
    let out = compute(tree, viewport, options, None);
    tracing::debug!(
        width = viewport.width,
        height = viewport.height,
        tile = ?options.tile,
        "treemap laid out"
    );
    out
}

/// Lays out new data with the previous layout's size and options.
///
/// With [`TilingStrategy::Resquarify`] every parent whose children are
/// unchanged keeps its previous rows, so value changes do not reshuffle cells.
pub fn relayout(prev: &TreemapLayout, tree: Arc<Tree>) -> TreemapLayout {
    let carried = (prev.options.tile == TilingStrategy::Resquarify).then_some(&prev.rows);
    compute(tree, prev.viewport, prev.options, carried)
}

/// Returns `prev` resized to `viewport`.
///
/// Rows computed for the previous size are reused, so every child keeps its
/// proportions relative to its parent.
pub fn resize(prev: &TreemapLayout, viewport: Viewport) -> TreemapLayout {
    if prev.viewport == viewport {
        return prev.clone();
    }
    tracing::debug!(
        from_width = prev.viewport.width,
        from_height = prev.viewport.height,
        width = viewport.width,
        height = viewport.height,
        "treemap resized"
    );
    compute(prev.tree.clone(), viewport, prev.options, Some(&prev.rows))
}

struct Pass<'a> {
    tree: &'a Tree,
    options: LayoutOptions,
    weights: Vec<f64>,
    bounds: Vec<Bounds>,
    rows: HashMap<RecordId, RowSet>,
    carried: Option<&'a HashMap<RecordId, RowSet>>,
}

fn compute(
    tree: Arc<Tree>,
    viewport: Viewport,
    options: LayoutOptions,
    carried: Option<&HashMap<RecordId, RowSet>>,
) -> TreemapLayout {
    let mut pass = Pass {
        tree: &tree,
        options,
        weights: weights(&tree, options.epsilon),
        bounds: vec![Bounds::default(); tree.len()],
        rows: HashMap::new(),
        carried,
    };
    pass.bounds[tree.root.index()] = Bounds::new(0.0, 0.0, viewport.width, viewport.height);

    let mut padding_stack = vec![0.0];
    for id in tree.each_before() {
        pass.position(id, &mut padding_stack);
    }
    if options.round {
        for b in &mut pass.bounds {
            b.round();
        }
    }

    let Pass { bounds, rows, .. } = pass;
    TreemapLayout {
        tree,
        viewport,
        options,
        bounds,
        rows,
    }
}

/// Leaf weights clamped to `epsilon`, internal weights summed bottom-up.
fn weights(tree: &Tree, epsilon: f64) -> Vec<f64> {
    let epsilon = if epsilon > 0.0 { epsilon } else { f64::MIN_POSITIVE };
    let mut w = vec![0.0; tree.len()];
    for i in (0..tree.len()).rev() {
        let node = &tree.nodes[i];
        w[i] = if node.is_leaf() {
            if node.aggregate > epsilon {
                node.aggregate
            } else {
                epsilon
            }
        } else {
            node.children.iter().map(|c| w[c.index()]).sum()
        };
    }
    w
}

impl Pass<'_> {
    fn position(&mut self, id: NodeId, padding_stack: &mut Vec<f64>) {
        let tree = self.tree;
        let node = tree.node(id);
        let depth = node.depth as usize;
        if padding_stack.len() <= depth + 1 {
            padding_stack.resize(depth + 2, 0.0);
        }
        let p = padding_stack[depth];
        let b = self.bounds[id.index()];
        let (x0, x1) = collapse(b.x0 + p, b.x1 - p);
        let (y0, y1) = collapse(b.y0 + p, b.y1 - p);
        self.bounds[id.index()] = Bounds::new(x0, y0, x1, y1);

        if node.is_leaf() {
            return;
        }

        let outer = self.options.padding.max(0.0);
        let p = outer / 2.0;
        padding_stack[depth + 1] = p;
        let (cx0, cx1) = collapse(x0 + outer - p, x1 - (outer - p));
        let (cy0, cy1) = collapse(y0 + outer - p, y1 - (outer - p));
        self.tile(id, Bounds::new(cx0, cy0, cx1, cy1));
    }

    fn tile(&mut self, parent: NodeId, area: Bounds) {
        let tree = self.tree;
        let node = tree.node(parent);
        let children = &node.children;
        let total = self.weights[parent.index()];
        match self.options.tile {
            TilingStrategy::Dice => self.dice(children, total, area),
            TilingStrategy::Slice => self.slice(children, total, area),
            TilingStrategy::SliceDice => {
                if node.depth % 2 == 1 {
                    self.slice(children, total, area)
                } else {
                    self.dice(children, total, area)
                }
            }
            TilingStrategy::Squarify | TilingStrategy::Resquarify => {
                if let Some(rows) = self.reusable_rows(parent) {
                    self.apply_rows(&rows, total, area);
                    self.rows.insert(node.record.clone(), rows);
                } else {
                    let rows = self.squarify(children, total, area);
                    // Rows packed into an empty rectangle carry no aspect information.
                    if area.area() > 0.0 {
                        self.rows.insert(node.record.clone(), rows);
                    }
                }
            }
        }
    }

    /// Carried rows for `parent` when they cover exactly its current children.
    fn reusable_rows(&self, parent: NodeId) -> Option<RowSet> {
        let node = self.tree.node(parent);
        let set = self.carried?.get(&node.record)?;
        if set.ratio != self.options.ratio {
            return None;
        }
        let members: usize = set.rows.iter().map(|r| r.members.len()).sum();
        if members != node.children.len() {
            return None;
        }
        let current: HashSet<&RecordId> = node
            .children
            .iter()
            .map(|c| &self.tree.node(*c).record)
            .collect();
        set.rows
            .iter()
            .flat_map(|r| r.members.iter())
            .all(|m| current.contains(m))
            .then(|| set.clone())
    }

    fn resolve(&self, members: &[RecordId]) -> Vec<NodeId> {
        members.iter().filter_map(|m| self.tree.find(m)).collect()
    }

    fn apply_rows(&mut self, set: &RowSet, total: f64, area: Bounds) {
        let Bounds {
            mut x0,
            mut y0,
            x1,
            y1,
        } = area;
        let mut value = total;
        for row in &set.rows {
            let ids = self.resolve(&row.members);
            let row_value: f64 = ids.iter().map(|c| self.weights[c.index()]).sum();
            if row.dice {
                let y2 = if value > 0.0 {
                    (y0 + (y1 - y0) * row_value / value).min(y1)
                } else {
                    y1
                };
                self.dice(&ids, row_value, Bounds::new(x0, y0, x1, y2));
                y0 = y2;
            } else {
                let x2 = if value > 0.0 {
                    (x0 + (x1 - x0) * row_value / value).min(x1)
                } else {
                    x1
                };
                self.slice(&ids, row_value, Bounds::new(x0, y0, x2, y1));
                x0 = x2;
            }
            value -= row_value;
        }
    }

    /// Packs children into rows along the shorter side, growing each row
    /// while its worst aspect ratio keeps improving.
    fn squarify(&mut self, children: &[NodeId], total: f64, area: Bounds) -> RowSet {
        let ratio = self.options.ratio;
        let Bounds {
            mut x0,
            mut y0,
            x1,
            y1,
        } = area;
        let mut rows = Vec::new();
        let mut value = total;
        let n = children.len();
        let mut i0 = 0;

        while i0 < n {
            let dx = x1 - x0;
            let dy = y1 - y0;
            let mut i1 = i0 + 1;
            let first = self.weights[children[i0].index()];
            let mut sum = first;
            let mut min_value = first;
            let mut max_value = first;
            let alpha = (dy / dx).max(dx / dy) / (value * ratio);
            let mut beta = sum * sum * alpha;
            let mut min_ratio = (max_value / beta).max(beta / min_value);

            while i1 < n {
                let w = self.weights[children[i1].index()];
                sum += w;
                min_value = min_value.min(w);
                max_value = max_value.max(w);
                beta = sum * sum * alpha;
                let new_ratio = (max_value / beta).max(beta / min_value);
                if new_ratio > min_ratio {
                    sum -= w;
                    break;
                }
                min_ratio = new_ratio;
                i1 += 1;
            }

            let members = &children[i0..i1];
            let dice = dx < dy;
            tracing::trace!(len = members.len(), dice, "squarify row");
            if dice {
                let y2 = if dy != 0.0 && value > 0.0 {
                    (y0 + dy * sum / value).min(y1)
                } else {
                    y1
                };
                self.dice(members, sum, Bounds::new(x0, y0, x1, y2));
                y0 = y2;
            } else {
                let x2 = if dx != 0.0 && value > 0.0 {
                    (x0 + dx * sum / value).min(x1)
                } else {
                    x1
                };
                self.slice(members, sum, Bounds::new(x0, y0, x2, y1));
                x0 = x2;
            }
            rows.push(Row {
                dice,
                members: members
                    .iter()
                    .map(|c| self.tree.node(*c).record.clone())
                    .collect(),
            });
            value -= sum;
            i0 = i1;
        }

        RowSet { ratio, rows }
    }

    fn dice(&mut self, children: &[NodeId], total: f64, area: Bounds) {
        let k = if total != 0.0 { area.width() / total } else { 0.0 };
        let mut x = area.x0;
        for c in children {
            let x_next = x + self.weights[c.index()] * k;
            self.bounds[c.index()] = Bounds::new(x, area.y0, x_next, area.y1);
            x = x_next;
        }
    }

    fn slice(&mut self, children: &[NodeId], total: f64, area: Bounds) {
        let k = if total != 0.0 { area.height() / total } else { 0.0 };
        let mut y = area.y0;
        for c in children {
            let y_next = y + self.weights[c.index()] * k;
            self.bounds[c.index()] = Bounds::new(area.x0, y, area.x1, y_next);
            y = y_next;
        }
    }
}

fn collapse(lo: f64, hi: f64) -> (f64, f64) {
    if hi < lo {
        let mid = (lo + hi) / 2.0;
        (mid, mid)
    } else {
        (lo, hi)
    }
}
