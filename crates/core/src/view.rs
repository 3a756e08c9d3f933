//! Derived treemap state driven by prop updates.
//!
//! Every update compares the old and new [`TreemapProps`] field by field,
//! turns the differences into [`Dirty`] flags and recomputes only the
//! derived fields whose dependencies intersect them.

use bitflags::bitflags;
use serde::Serialize;
use std::sync::Arc;

use crate::animate::{
    process, AnimationConfig, AnimationProcessor, DatumProcessor, Phase, ProcessedDatum,
    TransitionDescriptor,
};
use crate::click::{ClickGate, ClickOutcome};
use crate::config::TreemapConfig;
use crate::datum::{cell_processor, CELL_ANIMATABLE};
use crate::model::{RecordId, Tree};
use crate::scale::{compute_scales, ScalePair};
use crate::treemap::{
    layout, relayout, resize, Bounds, LaidOutNode, LayoutOptions, TreemapLayout, Viewport,
};
use crate::visibility::{select, Stacking};
use crate::zoom::ZoomState;

bitflags! {
    /// Which props changed between two updates.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Dirty: u16 {
        const DATA      = 1 << 0;
        const SIZE      = 1 << 1;
        const LAYOUT    = 1 << 2;
        const ROOT      = 1 << 3;
        const DEPTH     = 1 << 4;
        const FOCUS     = 1 << 5;
        const SELECTION = 1 << 6;
        const ANIMATE   = 1 << 7;
    }
}

impl Dirty {
    /// Full recompute of the layout; `SIZE` alone only resizes it.
    pub const RELAYOUT: Dirty = Dirty::DATA.union(Dirty::LAYOUT);
    pub const VISIBLE: Dirty = Dirty::RELAYOUT
        .union(Dirty::SIZE)
        .union(Dirty::ROOT)
        .union(Dirty::DEPTH)
        .union(Dirty::FOCUS)
        .union(Dirty::SELECTION);
    pub const SCALES: Dirty = Dirty::SIZE
        .union(Dirty::DATA)
        .union(Dirty::LAYOUT)
        .union(Dirty::ROOT);

    /// Field-level comparison. The tree and animation config compare by identity.
    pub fn between(old: &TreemapProps, new: &TreemapProps) -> Dirty {
        let mut d = Dirty::empty();
        d.set(Dirty::DATA, !Arc::ptr_eq(&old.tree, &new.tree));
        d.set(Dirty::SIZE, old.viewport != new.viewport);
        d.set(Dirty::LAYOUT, old.layout != new.layout);
        d.set(Dirty::ROOT, old.zoom.root_node_id != new.zoom.root_node_id);
        d.set(Dirty::DEPTH, old.zoom.show_to_depth != new.zoom.show_to_depth);
        d.set(Dirty::FOCUS, old.focused != new.focused);
        d.set(Dirty::SELECTION, old.selection != new.selection);
        d.set(Dirty::ANIMATE, !Arc::ptr_eq(&old.animate, &new.animate));
        d
    }
}

/// Inputs the rendering layer hands to the treemap.
#[derive(Clone, Debug)]
pub struct TreemapProps {
    pub tree: Arc<Tree>,
    pub viewport: Viewport,
    pub layout: LayoutOptions,
    pub zoom: ZoomState,
    pub focused: Option<RecordId>,
    pub selection: Vec<RecordId>,
    pub animate: Arc<AnimationConfig>,
}

impl TreemapProps {
    pub fn new(tree: Arc<Tree>, viewport: Viewport) -> Self {
        Self {
            tree,
            viewport,
            layout: LayoutOptions::default(),
            zoom: ZoomState::default(),
            focused: None,
            selection: Vec::new(),
            animate: Arc::new(AnimationConfig::default()),
        }
    }

    pub fn with_config(tree: Arc<Tree>, viewport: Viewport, config: &TreemapConfig) -> Self {
        Self {
            layout: config.layout,
            zoom: ZoomState::new(None, config.show_to_depth),
            animate: Arc::new(config.animation.config()),
            ..Self::new(tree, viewport)
        }
    }

    fn stacking(&self) -> Stacking {
        Stacking::new(self.selection.clone(), self.focused.clone())
    }
}

/// Layout-space bounds of the zoom root, if one is isolated and known.
fn zoom_bounds(layout: &TreemapLayout, zoom: &ZoomState) -> Option<Bounds> {
    zoom.root_node_id
        .as_ref()
        .and_then(|r| layout.find(r))
        .map(|n| n.bounds)
}

/// One processed cell of the visible frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameCell {
    pub id: RecordId,
    /// Paint order; later cells draw over earlier ones.
    pub index: usize,
    #[serde(flatten)]
    pub datum: ProcessedDatum,
}

/// Everything derived from [`TreemapProps`].
pub struct TreemapState {
    layout: TreemapLayout,
    visible: Vec<LaidOutNode>,
    scales: ScalePair,
    processor: DatumProcessor<LaidOutNode>,
    animation: Option<AnimationProcessor<LaidOutNode>>,
}

impl std::fmt::Debug for TreemapState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreemapState")
            .field("visible", &self.visible.len())
            .field("scales", &self.scales)
            .field("animation", &self.animation)
            .finish_non_exhaustive()
    }
}

impl TreemapState {
    pub fn new(props: &TreemapProps) -> Self {
        let layout = layout(props.tree.clone(), props.viewport, props.layout);
        let visible = select(&layout, &props.zoom, &props.stacking());
        let scales = compute_scales(props.viewport, zoom_bounds(&layout, &props.zoom).as_ref(), None);
        let processor = cell_processor(props.tree.clone(), scales);
        let animation = process(&props.animate, &CELL_ANIMATABLE, processor.clone());
        Self {
            layout,
            visible,
            scales,
            processor,
            animation,
        }
    }

    /// Brings the derived fields up to date with `new`; returns what changed.
    pub fn update(&mut self, old: &TreemapProps, new: &TreemapProps) -> Dirty {
        let dirty = Dirty::between(old, new);
        if dirty.is_empty() {
            return dirty;
        }
        tracing::debug!(?dirty, "props changed");

        if dirty.intersects(Dirty::RELAYOUT) {
            self.layout = if dirty.contains(Dirty::LAYOUT) {
                layout(new.tree.clone(), new.viewport, new.layout)
            } else {
                let next = relayout(&self.layout, new.tree.clone());
                resize(&next, new.viewport)
            };
        } else if dirty.contains(Dirty::SIZE) {
            self.layout = resize(&self.layout, new.viewport);
        }

        if dirty.intersects(Dirty::VISIBLE) {
            self.visible = select(&self.layout, &new.zoom, &new.stacking());
        }

        let mut rescaled = false;
        if dirty.intersects(Dirty::SCALES) {
            let root = zoom_bounds(&self.layout, &new.zoom);
            let next = compute_scales(new.viewport, root.as_ref(), Some(&self.scales));
            rescaled = next != self.scales;
            self.scales = next;
        }

        // The cell processor captures the tree, so new data rebuilds it too.
        if rescaled || dirty.intersects(Dirty::ANIMATE | Dirty::DATA) {
            self.processor = cell_processor(new.tree.clone(), self.scales);
            self.animation = process(&new.animate, &CELL_ANIMATABLE, self.processor.clone());
        }
        dirty
    }

    pub fn layout(&self) -> &TreemapLayout {
        &self.layout
    }

    pub fn visible(&self) -> &[LaidOutNode] {
        &self.visible
    }

    pub fn scales(&self) -> &ScalePair {
        &self.scales
    }

    pub fn processor(&self) -> &DatumProcessor<LaidOutNode> {
        &self.processor
    }

    /// `None` when animation is disabled.
    pub fn animation(&self) -> Option<&AnimationProcessor<LaidOutNode>> {
        self.animation.as_ref()
    }
}

/// Treemap controller: owns props, derived state and the click gate.
#[derive(Debug)]
pub struct TreemapView {
    props: TreemapProps,
    state: TreemapState,
    clicks: ClickGate<RecordId>,
}

impl TreemapView {
    pub fn new(props: TreemapProps) -> Self {
        let state = TreemapState::new(&props);
        Self {
            props,
            state,
            clicks: ClickGate::default(),
        }
    }

    pub fn with_config(tree: Arc<Tree>, viewport: Viewport, config: &TreemapConfig) -> Self {
        let mut view = Self::new(TreemapProps::with_config(tree, viewport, config));
        view.clicks = ClickGate::new(config.double_click_ms);
        view
    }

    pub fn props(&self) -> &TreemapProps {
        &self.props
    }

    pub fn state(&self) -> &TreemapState {
        &self.state
    }

    pub fn zoom(&self) -> &ZoomState {
        &self.props.zoom
    }

    fn apply(&mut self, change: impl FnOnce(&mut TreemapProps)) -> Dirty {
        let old = self.props.clone();
        change(&mut self.props);
        self.state.update(&old, &self.props)
    }

    /// Arms a single click, or zooms out when it completes a double click.
    pub fn on_click(&mut self, id: &RecordId, now: u64) -> Dirty {
        match self.clicks.on_click(id.clone(), now) {
            ClickOutcome::Pending => Dirty::empty(),
            ClickOutcome::DoubleClick(target) => self.on_double_click(&target),
        }
    }

    /// Fires a single click whose window has elapsed as a zoom in.
    pub fn poll(&mut self, now: u64) -> Dirty {
        match self.clicks.poll(now) {
            Some(target) => self.zoom_in(&target),
            None => Dirty::empty(),
        }
    }

    /// When the pending click, if any, is due for [`poll`](Self::poll).
    pub fn next_deadline(&self) -> Option<u64> {
        self.clicks.deadline()
    }

    pub fn on_double_click(&mut self, id: &RecordId) -> Dirty {
        self.clicks.cancel();
        let tree = self.props.tree.clone();
        let Some(node) = tree.find(id) else {
            tracing::warn!(%id, "double click on unknown node ignored");
            return Dirty::empty();
        };
        self.apply(|p| p.zoom.zoom_out(&tree, node))
    }

    pub fn zoom_in(&mut self, id: &RecordId) -> Dirty {
        let tree = self.props.tree.clone();
        let Some(node) = tree.find(id) else {
            tracing::warn!(%id, "click on unknown node ignored");
            return Dirty::empty();
        };
        self.apply(|p| p.zoom.zoom_in(&tree, node))
    }

    pub fn set_zoom(&mut self, zoom: ZoomState) -> Dirty {
        self.apply(|p| p.zoom = zoom)
    }

    pub fn reset_zoom(&mut self) -> Dirty {
        self.apply(|p| p.zoom.reset())
    }

    pub fn on_mouse_over(&mut self, id: &RecordId) -> Dirty {
        let id = id.clone();
        self.apply(|p| p.focused = Some(id))
    }

    /// Same as [`on_mouse_over`](Self::on_mouse_over); a no-op while over the same cell.
    pub fn on_mouse_move(&mut self, id: &RecordId) -> Dirty {
        if self.props.focused.as_ref() == Some(id) {
            return Dirty::empty();
        }
        self.on_mouse_over(id)
    }

    pub fn on_mouse_leave(&mut self) -> Dirty {
        self.apply(|p| p.focused = None)
    }

    pub fn set_selection(&mut self, selection: Vec<RecordId>) -> Dirty {
        self.apply(|p| p.selection = selection)
    }

    pub fn set_animation(&mut self, config: AnimationConfig) -> Dirty {
        self.apply(|p| p.animate = Arc::new(config))
    }

    pub fn set_layout_options(&mut self, options: LayoutOptions) -> Dirty {
        self.apply(|p| p.layout = options)
    }

    pub fn resize(&mut self, viewport: Viewport) -> Dirty {
        self.apply(|p| p.viewport = viewport)
    }

    /// Replaces the data. Zoom state is kept; a root that no longer exists
    /// shows an empty frame until the next zoom interaction.
    pub fn set_data(&mut self, tree: Arc<Tree>) -> Dirty {
        self.clicks.cancel();
        self.apply(|p| p.tree = tree)
    }

    /// Processed visible cells in paint order.
    pub fn frame(&self) -> Vec<FrameCell> {
        self.state
            .visible
            .iter()
            .enumerate()
            .map(|(index, node)| FrameCell {
                id: node.id.clone(),
                index,
                datum: (self.state.processor)(node),
            })
            .collect()
    }

    /// Descriptors for every visible cell in `phase`, or `None` with animation off.
    pub fn transitions(&self, phase: Phase) -> Option<Vec<(RecordId, TransitionDescriptor)>> {
        let animation = self.state.animation.as_ref()?;
        let describe = animation.phase(phase);
        Some(
            self.state
                .visible
                .iter()
                .enumerate()
                .map(|(i, node)| (node.id.clone(), describe(node, i)))
                .collect(),
        )
    }
}
