//! Affine pixel to world transforms

/// Affine transform mapping `(col, row)` pixel coordinates to world coordinates:
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
///
/// Pixel `(0, 0)` is the outer corner of the first cell; cell centers sit at
/// half-integer pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    #[must_use]
    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// Axis-aligned transform from an origin corner and signed cell sizes
    #[must_use]
    pub const fn from_origin(x0: f64, y0: f64, cell_width: f64, cell_height: f64) -> Self {
        Self::new(cell_width, 0.0, x0, 0.0, cell_height, y0)
    }

    #[must_use]
    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        let det = self.determinant();
        det == 0.0 || !det.is_finite()
    }

    /// World coordinates of pixel position `(col, row)`
    #[must_use]
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// World coordinates of the center of cell `(col, row)`
    #[must_use]
    pub fn cell_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// World to pixel transform, `None` when not invertible
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        if self.is_degenerate() {
            return None;
        }
        let det = self.determinant();
        let a = self.e / det;
        let b = -self.b / det;
        let d = -self.d / det;
        let e = self.a / det;
        Some(Self {
            a,
            b,
            c: -(a * self.c + b * self.f),
            d,
            e,
            f: -(d * self.c + e * self.f),
        })
    }

    /// Cell width and height (absolute) for axis-aligned transforms
    #[must_use]
    pub fn resolution(&self) -> (f64, f64) {
        (self.a.hypot(self.d), self.b.hypot(self.e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_round_trip() {
        let affine = Affine::from_origin(-180.0, 90.0, 0.5, -0.25);
        let inverse = affine.inverse().unwrap();
        let (x, y) = affine.apply(10.0, 20.0);
        assert_eq!((x, y), (-175.0, 85.0));
        let (col, row) = inverse.apply(x, y);
        assert!((col - 10.0).abs() < 1e-9);
        assert!((row - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_has_no_inverse() {
        assert!(Affine::from_origin(0.0, 0.0, 0.0, -1.0).inverse().is_none());
        assert!(Affine::new(1.0, 2.0, 0.0, 2.0, 4.0, 0.0).inverse().is_none());
    }

    #[test]
    fn test_cell_center() {
        let affine = Affine::from_origin(0.0, 10.0, 1.0, -1.0);
        assert_eq!(affine.cell_center(0, 0), (0.5, 9.5));
        assert_eq!(affine.resolution(), (1.0, 1.0));
    }
}
