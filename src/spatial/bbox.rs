//! Axis-aligned bounding boxes

use super::projection::{Projection, Transformer};
use crate::errors::{Result, RuNeGridError};

/// Bounding box `(xmin, ymin, xmax, ymax)` in world coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BBox {
    #[must_use]
    pub const fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }

    #[must_use]
    pub fn intersects(&self, other: &BBox) -> bool {
        self.xmin <= other.xmax
            && other.xmin <= self.xmax
            && self.ymin <= other.ymax
            && other.ymin <= self.ymax
    }

    /// Points along the outline, `edge_points` per edge (corners included)
    #[must_use]
    pub fn outline(&self, edge_points: usize) -> Vec<(f64, f64)> {
        let n = edge_points.max(2);
        let step = |i: usize| i as f64 / (n - 1) as f64;
        let mut points = Vec::with_capacity(4 * n);
        for i in 0..n {
            let t = step(i);
            let x = self.xmin + t * self.width();
            let y = self.ymin + t * self.height();
            points.push((x, self.ymin));
            points.push((x, self.ymax));
            points.push((self.xmin, y));
            points.push((self.xmax, y));
        }
        points
    }

    /// Bounding box of this box's outline reprojected from `from` to `to`.
    ///
    /// Edges are densified with `edge_points` points each so that curved
    /// edges in the target projection are covered. Points without a valid
    /// image are skipped; if none survive the projection fails.
    pub fn project(&self, from: &Projection, to: &Projection, edge_points: usize) -> Result<BBox> {
        let transformer = Transformer::new(from, to)?;
        let projected: Vec<(f64, f64)> = self
            .outline(edge_points)
            .into_iter()
            .filter_map(|(x, y)| transformer.transform(x, y).ok())
            .collect();
        if projected.is_empty() {
            return Err(RuNeGridError::ReprojectionFailed(format!(
                "no point of {self:?} could be projected from {from} to {to}"
            )));
        }
        Ok(projected.iter().fold(
            BBox::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |acc, &(x, y)| BBox::new(acc.xmin.min(x), acc.ymin.min(y), acc.xmax.max(x), acc.ymax.max(y)),
        ))
    }
}
