//! Coordinate helpers for content-stream interpretation

/// Represents a PDF transformation matrix [a b c d e f]
/// where: x' = a*x + c*y + e, y' = b*x + d*y + f
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    /// Identity matrix (no transformation)
    pub fn identity() -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 }
    }

    /// Pure translation
    pub fn translate(tx: f32, ty: f32) -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: tx, f: ty }
    }

    /// Build from a 6-number operand list (`cm`, `Tm`, form `/Matrix`)
    pub fn from_values(values: &[f32]) -> Option<Self> {
        if values.len() != 6 {
            return None;
        }
        Some(Self {
            a: values[0],
            b: values[1],
            c: values[2],
            d: values[3],
            e: values[4],
            f: values[5],
        })
    }

    /// Concatenate: apply `self` first, then `other`
    ///
    /// This is the order PDF uses for `cm` (new CTM = M x CTM) and for the
    /// text rendering matrix (Tm x CTM).
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    /// Map a point through the matrix
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Length of a unit vertical vector after transformation
    ///
    /// Used to turn a font size in text space into a size on the page.
    pub fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

/// Axis-aligned rectangle in PDF user space (origin bottom-left)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    /// Create a rectangle, normalising the corner order
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Grow the rectangle by `amount` on every side
    pub fn pad(&self, amount: f32) -> Rect {
        Rect {
            x0: self.x0 - amount,
            y0: self.y0 - amount,
            x1: self.x1 + amount,
            y1: self.y1 + amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.001
    }

    #[test]
    fn test_identity_apply() {
        let m = Matrix::identity();
        assert_eq!(m.apply(3.0, 4.0), (3.0, 4.0));
    }

    #[test]
    fn test_then_applies_left_first() {
        // Scale by 2, then translate by (10, 20)
        let scale = Matrix { a: 2.0, b: 0.0, c: 0.0, d: 2.0, e: 0.0, f: 0.0 };
        let combined = scale.then(&Matrix::translate(10.0, 20.0));
        let (x, y) = combined.apply(1.0, 1.0);
        assert!(approx(x, 12.0));
        assert!(approx(y, 22.0));

        // Reverse order: translate first, then scale
        let combined = Matrix::translate(10.0, 20.0).then(&scale);
        let (x, y) = combined.apply(1.0, 1.0);
        assert!(approx(x, 22.0));
        assert!(approx(y, 42.0));
    }

    #[test]
    fn test_vertical_scale_of_rotation() {
        // 90 degree rotation keeps lengths
        let rot = Matrix { a: 0.0, b: 1.0, c: -1.0, d: 0.0, e: 0.0, f: 0.0 };
        assert!(approx(rot.vertical_scale(), 1.0));
        let flipped = Matrix { a: 0.75, b: 0.0, c: 0.0, d: -0.75, e: 0.0, f: 792.0 };
        assert!(approx(flipped.vertical_scale(), 0.75));
    }

    #[test]
    fn test_from_values_requires_six() {
        assert!(Matrix::from_values(&[1.0, 0.0, 0.0, 1.0, 0.0]).is_none());
        assert_eq!(
            Matrix::from_values(&[1.0, 0.0, 0.0, 1.0, 5.0, 6.0]),
            Some(Matrix::translate(5.0, 6.0))
        );
    }

    #[test]
    fn test_rect_union_and_pad() {
        let a = Rect::new(10.0, 10.0, 20.0, 20.0);
        let b = Rect::new(30.0, 5.0, 15.0, 12.0);
        let u = a.union(&b);
        assert_eq!(u, Rect::new(10.0, 5.0, 30.0, 20.0));
        let p = a.pad(1.0);
        assert_eq!(p, Rect::new(9.0, 9.0, 21.0, 21.0));
    }
}
