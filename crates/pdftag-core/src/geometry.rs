//! Affine matrices and rectangles in PDF user space

use lopdf::Object;

/// PDF transformation matrix `[a b c d e f]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// Build from a six-number operand list or array
    pub fn from_objects(values: &[Object]) -> Option<Self> {
        if values.len() != 6 {
            return None;
        }
        let mut n = [0.0; 6];
        for (slot, value) in n.iter_mut().zip(values) {
            *slot = number(value)?;
        }
        Some(Self::new(n[0], n[1], n[2], n[3], n[4], n[5]))
    }

    /// `self × other`: apply `self` first, then `other`
    ///
    /// This is how `cm` composes: the new CTM is `operand × CTM`.
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

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Bounding box of `rect` after transformation
    pub fn transform_rect(&self, rect: &Rect) -> Rect {
        let corners = [
            self.apply(rect.llx, rect.lly),
            self.apply(rect.urx, rect.lly),
            self.apply(rect.urx, rect.ury),
            self.apply(rect.llx, rect.ury),
        ];
        let mut out = Rect::point(corners[0].0, corners[0].1);
        for (x, y) in &corners[1..] {
            out.include(*x, *y);
        }
        out
    }
}

/// Axis-aligned rectangle `[llx lly urx ury]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl Rect {
    pub const UNIT: Rect = Rect {
        llx: 0.0,
        lly: 0.0,
        urx: 1.0,
        ury: 1.0,
    };

    pub fn new(llx: f64, lly: f64, urx: f64, ury: f64) -> Self {
        Self { llx, lly, urx, ury }
    }

    pub fn point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    /// Parse a PDF rectangle array, normalising the corner order
    pub fn from_object(obj: &Object) -> Option<Self> {
        let Object::Array(items) = obj else {
            return None;
        };
        if items.len() != 4 {
            return None;
        }
        let x0 = number(&items[0])?;
        let y0 = number(&items[1])?;
        let x1 = number(&items[2])?;
        let y1 = number(&items[3])?;
        Some(Self::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)))
    }

    pub fn to_object(&self) -> Object {
        Object::Array(vec![
            Object::Real(self.llx as f32),
            Object::Real(self.lly as f32),
            Object::Real(self.urx as f32),
            Object::Real(self.ury as f32),
        ])
    }

    pub fn include(&mut self, x: f64, y: f64) {
        self.llx = self.llx.min(x);
        self.lly = self.lly.min(y);
        self.urx = self.urx.max(x);
        self.ury = self.ury.max(y);
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.llx.min(other.llx),
            self.lly.min(other.lly),
            self.urx.max(other.urx),
            self.ury.max(other.ury),
        )
    }

    /// Clamp to `bounds`; a rectangle entirely outside collapses onto its edge
    pub fn clamp_to(&self, bounds: &Rect) -> Rect {
        let llx = self.llx.clamp(bounds.llx, bounds.urx);
        let lly = self.lly.clamp(bounds.lly, bounds.ury);
        let urx = self.urx.clamp(bounds.llx, bounds.urx);
        let ury = self.ury.clamp(bounds.lly, bounds.ury);
        Rect::new(llx, lly, urx.max(llx), ury.max(lly))
    }
}

/// Numeric value of an integer or real object
pub fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cm_concatenation_order() {
        // translate then scale: the scale applies in the translated space
        let ctm = Matrix::new(1.0, 0.0, 0.0, 1.0, 100.0, 200.0);
        let scale = Matrix::new(50.0, 0.0, 0.0, 20.0, 0.0, 0.0);
        let combined = scale.then(&ctm);
        assert_eq!(combined.apply(1.0, 1.0), (150.0, 220.0));
        assert_eq!(combined.apply(0.0, 0.0), (100.0, 200.0));
    }

    #[test]
    fn test_transform_rect_rotated() {
        // 90 degree rotation maps the unit square into negative x
        let rot = Matrix::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0);
        let r = rot.transform_rect(&Rect::new(0.0, 0.0, 10.0, 5.0));
        assert_eq!(r, Rect::new(-5.0, 0.0, 0.0, 10.0));
    }

    #[test]
    fn test_from_object_normalises_corners() {
        let obj = Object::Array(vec![
            Object::Integer(612),
            Object::Integer(792),
            Object::Real(0.0),
            Object::Integer(0),
        ]);
        assert_eq!(
            Rect::from_object(&obj),
            Some(Rect::new(0.0, 0.0, 612.0, 792.0))
        );
    }

    #[test]
    fn test_from_object_rejects_short_arrays() {
        let obj = Object::Array(vec![Object::Integer(0), Object::Integer(0)]);
        assert_eq!(Rect::from_object(&obj), None);
        assert_eq!(Rect::from_object(&Object::Null), None);
    }

    #[test]
    fn test_clamp_to_page() {
        let page = Rect::new(0.0, 0.0, 612.0, 792.0);
        let r = Rect::new(-10.0, 700.0, 300.0, 900.0).clamp_to(&page);
        assert_eq!(r, Rect::new(0.0, 700.0, 300.0, 792.0));
    }

    #[test]
    fn test_clamp_outside_collapses() {
        let page = Rect::new(0.0, 0.0, 100.0, 100.0);
        let r = Rect::new(200.0, 200.0, 300.0, 300.0).clamp_to(&page);
        assert_eq!(r, Rect::new(100.0, 100.0, 100.0, 100.0));
    }
}
