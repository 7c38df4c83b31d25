//! Pixel-space geometry shared by layers and issues.

pub mod polygon;
pub mod rect;

pub use polygon::{Polygon, contours_area, contours_bounding_rect};
pub use rect::{Point, Rect, Size};
