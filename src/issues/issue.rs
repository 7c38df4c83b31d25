//! Per-layer defect instances.

use crate::geometry::{Point, Polygon, Rect, contours_area, contours_bounding_rect};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a logical defect.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueKind {
    Island,
    Overhang,
    ResinTrap,
    SuctionCup,
    TouchingBound,
    PrintHeight,
    EmptyLayer,
    Debug,
}

impl IssueKind {
    pub const ALL: [IssueKind; 8] = [
        IssueKind::Island,
        IssueKind::Overhang,
        IssueKind::ResinTrap,
        IssueKind::SuctionCup,
        IssueKind::TouchingBound,
        IssueKind::PrintHeight,
        IssueKind::EmptyLayer,
        IssueKind::Debug,
    ];

    #[inline]
    pub fn is_island(self) -> bool {
        self == IssueKind::Island
    }

    #[inline]
    pub fn is_overhang(self) -> bool {
        self == IssueKind::Overhang
    }

    #[inline]
    pub fn is_resin_trap(self) -> bool {
        self == IssueKind::ResinTrap
    }

    #[inline]
    pub fn is_suction_cup(self) -> bool {
        self == IssueKind::SuctionCup
    }

    #[inline]
    pub fn is_touching_bound(self) -> bool {
        self == IssueKind::TouchingBound
    }

    #[inline]
    pub fn is_print_height(self) -> bool {
        self == IssueKind::PrintHeight
    }

    #[inline]
    pub fn is_empty_layer(self) -> bool {
        self == IssueKind::EmptyLayer
    }

    #[inline]
    pub fn is_debug(self) -> bool {
        self == IssueKind::Debug
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueKind::Island => "Island",
            IssueKind::Overhang => "Overhang",
            IssueKind::ResinTrap => "Resin trap",
            IssueKind::SuctionCup => "Suction cup",
            IssueKind::TouchingBound => "Touching bounds",
            IssueKind::PrintHeight => "Print height",
            IssueKind::EmptyLayer => "Empty layer",
            IssueKind::Debug => "Debug",
        };
        f.write_str(name)
    }
}

/// Region representation of an issue.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum IssueShape {
    /// Only the bounding rect is known.
    #[default]
    Region,
    /// Discrete pixel coordinates (islands, out-of-bound pixels).
    Points(Vec<Point>),
    /// Closed polygon loops; the first is the outline, the rest are holes.
    Contours(Vec<Polygon>),
}

/// One defect on one layer, as reported by a detector.
///
/// An `Issue` has no kind of its own: [`kind`](Self::kind) is `None` until
/// the issue is attached to a [`MainIssue`](super::MainIssue).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Issue {
    kind: Option<IssueKind>,
    layer_index: u32,
    /// Height of the owning layer, used to normalize multi-layer area.
    layer_height: f32,
    bounding_rect: Rect,
    pixel_count: u32,
    area: f64,
    first_point: Point,
    shape: IssueShape,
}

impl Issue {
    /// An issue known only by its region and area.
    pub fn new(layer_index: u32, layer_height: f32, bounding_rect: Rect, area: f64) -> Self {
        Self {
            kind: None,
            layer_index,
            layer_height,
            bounding_rect,
            pixel_count: 0,
            area,
            first_point: Point::UNSET,
            shape: IssueShape::Region,
        }
    }

    /// An issue covering exactly `rect`.
    pub fn from_rect(layer_index: u32, layer_height: f32, rect: Rect) -> Self {
        Self::new(layer_index, layer_height, rect, rect.area() as f64)
    }

    /// A point-set issue; area and pixel count are the number of points.
    pub fn from_points(layer_index: u32, layer_height: f32, points: Vec<Point>) -> Self {
        let count = points.len() as u32;
        Self {
            kind: None,
            layer_index,
            layer_height,
            bounding_rect: Rect::from_points(&points),
            pixel_count: count,
            area: f64::from(count),
            first_point: points.first().copied().unwrap_or(Point::UNSET),
            shape: IssueShape::Points(points),
        }
    }

    /// A contour-set issue; area is the outline minus its holes.
    pub fn from_contours(layer_index: u32, layer_height: f32, contours: Vec<Polygon>) -> Self {
        let area = contours_area(&contours);
        Self {
            kind: None,
            layer_index,
            layer_height,
            bounding_rect: contours_bounding_rect(&contours),
            pixel_count: area.round() as u32,
            area,
            first_point: contours
                .first()
                .and_then(|c| c.points().first().copied())
                .unwrap_or(Point::UNSET),
            shape: IssueShape::Contours(contours),
        }
    }

    /// Overrides the pixel count derived at construction.
    pub fn with_pixel_count(mut self, pixel_count: u32) -> Self {
        self.pixel_count = pixel_count;
        self
    }

    #[inline]
    pub fn kind(&self) -> Option<IssueKind> {
        self.kind
    }

    #[inline]
    pub(crate) fn attach(&mut self, kind: IssueKind) {
        self.kind = Some(kind);
    }

    #[inline]
    pub fn layer_index(&self) -> u32 {
        self.layer_index
    }

    #[inline]
    pub fn layer_height(&self) -> f32 {
        self.layer_height
    }

    #[inline]
    pub fn bounding_rect(&self) -> Rect {
        self.bounding_rect
    }

    #[inline]
    pub fn pixel_count(&self) -> u32 {
        self.pixel_count
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.area
    }

    /// First pixel of the shape, [`Point::UNSET`] when unknown.
    #[inline]
    pub fn first_point(&self) -> Point {
        self.first_point
    }

    #[inline]
    pub fn has_valid_point(&self) -> bool {
        self.first_point != Point::UNSET
    }

    #[inline]
    pub fn shape(&self) -> &IssueShape {
        &self.shape
    }
}

/// Structural equality on the reported measures; the shape payload is not compared.
impl PartialEq for Issue {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.layer_index == other.layer_index
            && self.bounding_rect == other.bounding_rect
            && self.pixel_count == other.pixel_count
            && self.area == other.area
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "layer {}: {} ({} px, area {:.2})",
            self.layer_index, self.bounding_rect, self.pixel_count, self.area
        )
    }
}
