//! Logical defects spanning a run of layers.

use super::issue::{Issue, IssueKind};
use crate::document::round_height;
use crate::geometry::Rect;
use crate::layer_error::LayerError;
use crate::layers::LayerStack;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One physical defect, made of the per-layer [`Issue`]s it shows up as.
///
/// # Aggregates
/// - `bounding_rect` is the **intersection** of the non-empty child rects:
///   the region common to the defect on every layer. Disjoint children give
///   an empty rect, which is kept as-is.
/// - `pixel_count` is the sum over children.
/// - `area` is `Σ child.area / child.layer_height` for multi-layer issues, a
///   height-normalized volume rather than a plain area sum. A single-layer
///   issue keeps its child's area.
///
/// Children are sorted by layer index; there is always at least one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MainIssue {
    kind: IssueKind,
    bounding_rect: Rect,
    pixel_count: u32,
    area: f64,
    children: Vec<Issue>,
}

impl MainIssue {
    /// Aggregates `issues` under `kind`.
    ///
    /// # Errors
    /// `EmptyMainIssue` when `issues` is empty.
    pub fn new(kind: IssueKind, mut issues: Vec<Issue>) -> Result<Self, LayerError> {
        if issues.is_empty() {
            return Err(LayerError::EmptyMainIssue);
        }

        let mut bounding_rect = Rect::EMPTY;
        let mut seeded = false;
        let mut pixel_count = 0u32;
        let mut area = 0.0f64;

        for issue in &mut issues {
            issue.attach(kind);
            pixel_count = pixel_count.saturating_add(issue.pixel_count());
            let height = issue.layer_height();
            area += if height > 0.0 {
                issue.area() / f64::from(height)
            } else {
                issue.area()
            };

            let rect = issue.bounding_rect();
            if rect.is_empty() {
                continue;
            }
            if seeded {
                bounding_rect = bounding_rect.intersect(&rect);
            } else {
                bounding_rect = rect;
                seeded = true;
            }
        }

        if issues.len() == 1 {
            area = issues[0].area();
        }
        issues.sort_by_key(Issue::layer_index);

        Ok(Self {
            kind,
            bounding_rect,
            pixel_count,
            area,
            children: issues,
        })
    }

    /// A single-layer issue.
    pub fn single(kind: IssueKind, issue: Issue) -> Self {
        let mut issue = issue;
        issue.attach(kind);
        Self {
            kind,
            bounding_rect: issue.bounding_rect(),
            pixel_count: issue.pixel_count(),
            area: issue.area(),
            children: vec![issue],
        }
    }

    #[inline]
    pub fn kind(&self) -> IssueKind {
        self.kind
    }

    #[inline]
    pub fn is_kind(&self, kind: IssueKind) -> bool {
        self.kind == kind
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

    #[inline]
    pub fn children(&self) -> &[Issue] {
        &self.children
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Always `false`: a main issue holds at least one child.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Issue> {
        self.children.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Issue> {
        self.children.get(index)
    }

    pub fn start_layer_index(&self) -> u32 {
        self.children.first().map_or(0, Issue::layer_index)
    }

    pub fn end_layer_index(&self) -> u32 {
        self.children.last().map_or(0, Issue::layer_index)
    }

    /// Number of layers the issue spans, gaps included.
    pub fn layer_range_count(&self) -> u32 {
        1 + self.end_layer_index() - self.start_layer_index()
    }

    /// Inclusive membership test against the spanned layer range.
    pub fn is_in_range(&self, layer_index: u32) -> bool {
        (self.start_layer_index()..=self.end_layer_index()).contains(&layer_index)
    }

    /// `"5"` for a single layer, `"5-9 (5)"` for a run.
    pub fn layer_info(&self) -> String {
        let (start, end) = (self.start_layer_index(), self.end_layer_index());
        if start == end {
            format!("{start}")
        } else {
            format!("{start}-{end} ({})", self.layer_range_count())
        }
    }

    /// Physical height covered in `stack`: the first layer's own height plus
    /// the Z distance to the last layer.
    pub fn total_height(&self, stack: &LayerStack) -> Option<f32> {
        let start = stack.get(self.start_layer_index())?;
        let end = stack.get(self.end_layer_index())?;
        Some(round_height(
            stack.layer_height(start.index()) + end.position_z() - start.position_z(),
        ))
    }
}

impl<'a> IntoIterator for &'a MainIssue {
    type Item = &'a Issue;
    type IntoIter = std::slice::Iter<'a, Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.children.iter()
    }
}

impl fmt::Display for MainIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ layers {}: {}", self.kind, self.layer_info(), self.bounding_rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_issue_list_is_rejected() {
        assert_eq!(
            MainIssue::new(IssueKind::Island, Vec::new()),
            Err(LayerError::EmptyMainIssue)
        );
    }

    #[test]
    fn area_is_height_normalized() {
        let issues = vec![
            Issue::new(1, 0.05, Rect::new(0, 0, 4, 4), 10.0),
            Issue::new(2, 0.1, Rect::new(0, 0, 4, 4), 20.0),
        ];
        let main = MainIssue::new(IssueKind::ResinTrap, issues).unwrap();
        assert!((main.area() - 400.0).abs() < 1e-3);
    }

    #[test]
    fn bounding_rect_is_intersection_skipping_empty_children() {
        let issues = vec![
            Issue::from_rect(4, 0.05, Rect::new(0, 0, 10, 10)),
            Issue::from_rect(2, 0.05, Rect::EMPTY),
            Issue::from_rect(3, 0.05, Rect::new(5, 5, 10, 10)),
        ];
        let main = MainIssue::new(IssueKind::Overhang, issues).unwrap();
        assert_eq!(main.bounding_rect(), Rect::new(5, 5, 5, 5));
        assert_eq!(main.start_layer_index(), 2);
        assert_eq!(main.end_layer_index(), 4);
        assert_eq!(main.layer_info(), "2-4 (3)");
        assert!(main.is_in_range(3));
        assert!(!main.is_in_range(5));
        assert!(main.iter().all(|i| i.kind() == Some(IssueKind::Overhang)));
    }

    #[test]
    fn disjoint_children_collapse_to_empty() {
        let issues = vec![
            Issue::from_rect(0, 0.05, Rect::new(0, 0, 2, 2)),
            Issue::from_rect(1, 0.05, Rect::new(10, 10, 2, 2)),
            Issue::from_rect(2, 0.05, Rect::new(0, 0, 2, 2)),
        ];
        let main = MainIssue::new(IssueKind::Island, issues).unwrap();
        assert!(main.bounding_rect().is_empty());
    }

    #[test]
    fn single_layer_keeps_raw_area() {
        let main = MainIssue::single(IssueKind::Island, Issue::from_rect(7, 0.05, Rect::new(0, 0, 3, 3)));
        assert_eq!(main.area(), 9.0);
        assert_eq!(main.layer_info(), "7");
        assert_eq!(main.layer_range_count(), 1);
        assert_eq!(main, MainIssue::new(IssueKind::Island, vec![Issue::from_rect(7, 0.05, Rect::new(0, 0, 3, 3))]).unwrap());
    }
}
