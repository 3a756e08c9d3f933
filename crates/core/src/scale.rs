use serde::Serialize;

use crate::error::ScaleError;
use crate::treemap::{Bounds, Viewport};

/// Affine map from a domain interval to a range interval.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LinearScale {
    domain: [f64; 2],
    range: [f64; 2],
}

impl LinearScale {
    pub fn new(domain: [f64; 2], range: [f64; 2]) -> Result<Self, ScaleError> {
        if domain[0] == domain[1] || !domain.iter().all(|d| d.is_finite()) {
            return Err(ScaleError::DegenerateDomain(domain[0]));
        }
        Ok(Self { domain, range })
    }

    /// Maps the range onto itself.
    pub fn identity(range: [f64; 2]) -> Self {
        Self {
            domain: range,
            range,
        }
    }

    pub fn domain(&self) -> [f64; 2] {
        self.domain
    }

    pub fn range(&self) -> [f64; 2] {
        self.range
    }

    pub fn apply(&self, v: f64) -> f64 {
        let [d0, d1] = self.domain;
        let [r0, r1] = self.range;
        if d0 == d1 {
            return r0;
        }
        r0 + (v - d0) * (r1 - r0) / (d1 - d0)
    }

    pub fn invert(&self, px: f64) -> f64 {
        let [d0, d1] = self.domain;
        let [r0, r1] = self.range;
        if r0 == r1 {
            return d0;
        }
        d0 + (px - r0) * (d1 - d0) / (r1 - r0)
    }
}

/// Current x and y projections from layout space to pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ScalePair {
    pub x: LinearScale,
    pub y: LinearScale,
}

impl ScalePair {
    pub fn identity(viewport: Viewport) -> Self {
        Self {
            x: LinearScale::identity([0.0, viewport.width]),
            y: LinearScale::identity([0.0, viewport.height]),
        }
    }

    pub fn project(&self, b: &Bounds) -> Bounds {
        Bounds::new(
            self.x.apply(b.x0),
            self.y.apply(b.y0),
            self.x.apply(b.x1),
            self.y.apply(b.y1),
        )
    }
}

/// Scales that stretch `root` (or the whole viewport) to fill the viewport.
///
/// A zero-extent axis falls back to the viewport domain for that axis. When
/// the resulting mapping equals `previous`, `previous` is handed back
/// unchanged.
pub fn compute_scales(
    viewport: Viewport,
    root: Option<&Bounds>,
    previous: Option<&ScalePair>,
) -> ScalePair {
    let x_range = [0.0, viewport.width];
    let y_range = [0.0, viewport.height];
    let axis = |domain: Option<[f64; 2]>, range: [f64; 2]| match domain {
        Some(d) => LinearScale::new(d, range).unwrap_or_else(|err| {
            tracing::debug!(%err, "falling back to viewport domain");
            LinearScale::identity(range)
        }),
        None => LinearScale::identity(range),
    };
    let next = ScalePair {
        x: axis(root.map(|b| [b.x0, b.x1]), x_range),
        y: axis(root.map(|b| [b.y0, b.y1]), y_range),
    };

    match previous {
        Some(prev) if *prev == next => *prev,
        _ => {
            tracing::debug!(
                x_domain = ?next.x.domain,
                y_domain = ?next.y.domain,
                "scales recomputed"
            );
            next
        }
    }
}
