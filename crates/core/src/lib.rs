//! Treemap layout and animation state engine.
//!
//! Flat records become a [`Tree`](model::Tree), the tree is tiled into a
//! [`TreemapLayout`](treemap::TreemapLayout), the zoom state picks the
//! visible frontier, scales stretch the zoom root over the viewport and the
//! animation processor turns every visible cell into transition descriptors.
//! [`TreemapView`](view::TreemapView) wires the steps together and only
//! recomputes what a prop change touches.

pub mod animate;
pub mod click;
pub mod config;
pub mod datum;
pub mod error;
pub mod export;
pub mod hierarchy;
pub mod human;
pub mod model;
pub mod scale;
pub mod search;
pub mod source;
pub mod treemap;
pub mod view;
pub mod visibility;
pub mod zoom;

pub use animate::{AnimationConfig, AnimationProcessor, Phase, TransitionDescriptor};
pub use config::TreemapConfig;
pub use error::{Error, Result};
pub use hierarchy::build;
pub use model::*;
pub use scale::{compute_scales, LinearScale, ScalePair};
pub use source::load_records;
pub use treemap::{layout, relayout, resize, LaidOutNode, LayoutOptions, TreemapLayout, Viewport};
pub use view::{Dirty, FrameCell, TreemapProps, TreemapView};
pub use visibility::{select, Stacking};
pub use zoom::ZoomState;
