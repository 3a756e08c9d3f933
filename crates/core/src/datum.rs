use std::sync::Arc;

use crate::animate::{DatumProcessor, ProcessedDatum};
use crate::model::{AttrValue, Tree};
use crate::scale::ScalePair;
use crate::treemap::LaidOutNode;

/// Cell attributes the renderer interpolates between frames.
pub const CELL_ANIMATABLE: [&str; 7] = ["x0", "x1", "y0", "y1", "opacity", "height", "width"];

/// Projects a laid-out node into pixel space and attaches its record attributes.
///
/// `opacity` starts at zero; the animation config decides where it goes.
pub fn cell_processor(tree: Arc<Tree>, scales: ScalePair) -> DatumProcessor<LaidOutNode> {
    Arc::new(move |node: &LaidOutNode| {
        let px = scales.project(&node.bounds);
        let width = px.width();
        let height = px.height();

        let mut d = ProcessedDatum::new();
        d.insert("x0".into(), px.x0.into());
        d.insert("x1".into(), px.x1.into());
        d.insert("y0".into(), px.y0.into());
        d.insert("y1".into(), px.y1.into());
        d.insert("width".into(), width.into());
        d.insert("height".into(), height.into());
        d.insert("opacity".into(), 0.0.into());
        d.insert("value".into(), node.value.into());

        let Some(record) = tree.get(node.node) else {
            return d;
        };
        d.insert("label".into(), record.label().into());
        if let Some(category) = &record.attributes.category {
            d.insert("category".into(), category.clone());
        }
        if let Some(share) = record.attributes.attribution {
            d.insert("attribution_value".into(), share.into());
            d.insert("attribution_width".into(), (width * share).into());
        }
        if let Some(fill) = &record.attributes.attribution_fill {
            d.insert("attribution_fill".into(), AttrValue::Text(fill.clone()));
        }
        d
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::build;
    use crate::model::{RawRecord, RecordId};
    use crate::scale::compute_scales;
    use crate::treemap::{layout, LayoutOptions, Viewport};

    #[test]
    fn projects_through_zoom_scales() {
        let mut a = RawRecord::new(2u64, Some(RecordId::from(1u64)), 10.0).with_label("Africa");
        a.attributes.attribution = Some(0.25);
        let records = vec![
            RawRecord::new(1u64, None, 0.0),
            a,
            RawRecord::new(3u64, Some(RecordId::from(1u64)), 30.0),
        ];
        let tree = Arc::new(build(&records).unwrap());
        let vp = Viewport::new(400.0, 300.0);
        let l = layout(tree.clone(), vp, LayoutOptions::default());
        let africa = l.find(&"2".into()).unwrap();
        assert_eq!(africa.bounds.x0, 300.0);

        let zoomed = compute_scales(vp, Some(&africa.bounds), None);
        let d = cell_processor(tree, zoomed)(&africa);
        assert_eq!(d["x0"], AttrValue::Number(0.0));
        assert_eq!(d["x1"], AttrValue::Number(400.0));
        assert_eq!(d["width"], AttrValue::Number(400.0));
        assert_eq!(d["height"], AttrValue::Number(300.0));
        assert_eq!(d["opacity"], AttrValue::Number(0.0));
        assert_eq!(d["label"], AttrValue::from("Africa"));
        assert_eq!(d["attribution_width"], AttrValue::Number(100.0));
    }

    #[test]
    fn label_falls_back_to_id() {
        let tree = Arc::new(build(&[RawRecord::new(9u64, None, 1.0)]).unwrap());
        let vp = Viewport::new(10.0, 10.0);
        let l = layout(tree.clone(), vp, LayoutOptions::default());
        let root = l.find(&"9".into()).unwrap();
        let d = cell_processor(tree, compute_scales(vp, None, None))(&root);
        assert_eq!(d["label"], AttrValue::from("9"));
        assert!(!d.contains_key("attribution_width"));
    }
}
