//! Closed polygon loops as produced by contour tracing.

use super::rect::{Point, Rect};
use serde::{Deserialize, Serialize};

/// A closed loop of pixel coordinates; the last vertex connects back to the first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Tight bounding rect of the vertices.
    pub fn bounding_rect(&self) -> Rect {
        Rect::from_points(&self.points)
    }

    /// Enclosed area via the shoelace formula (always non-negative).
    pub fn area(&self) -> f64 {
        if self.points.len() < 3 {
            return 0.0;
        }
        let n = self.points.len();
        let twice: i64 = (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y)
            })
            .sum();
        twice.abs() as f64 / 2.0
    }
}

impl From<Vec<Point>> for Polygon {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

/// Bounding rect of a whole contour set.
pub fn contours_bounding_rect(contours: &[Polygon]) -> Rect {
    contours
        .iter()
        .map(Polygon::bounding_rect)
        .fold(Rect::EMPTY, |acc, r| acc.union(&r))
}

/// Area of a contour set where the first loop is the outer boundary and any
/// further loops are holes inside it.
pub fn contours_area(contours: &[Polygon]) -> f64 {
    let mut iter = contours.iter();
    let Some(outer) = iter.next() else {
        return 0.0;
    };
    let holes: f64 = iter.map(Polygon::area).sum();
    (outer.area() - holes).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: i32, y: i32, side: i32) -> Polygon {
        Polygon::new(vec![
            Point::new(x, y),
            Point::new(x + side, y),
            Point::new(x + side, y + side),
            Point::new(x, y + side),
        ])
    }

    #[test]
    fn shoelace_area_of_square() {
        assert_eq!(square(0, 0, 10).area(), 100.0);
    }

    #[test]
    fn contour_set_area_subtracts_holes() {
        let set = vec![square(0, 0, 10), square(2, 2, 4)];
        assert_eq!(contours_area(&set), 84.0);
        assert_eq!(contours_bounding_rect(&set), Rect::new(0, 0, 11, 11));
    }
}
