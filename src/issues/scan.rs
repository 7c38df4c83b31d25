//! Stack-wide issue detection driver.
//!
//! The pixel work is delegated to a [`LayerDetector`]; this module only
//! schedules it across layers and aggregates what it reports:
//!
//! 1. Every layer is decoded and handed to the detector, in parallel.
//! 2. Plain issues become single-layer [`MainIssue`]s.
//! 3. Hollow areas are grouped from the top layer down with a
//!    [`TrapConnectivityTree`]; groups still trapping resin become
//!    `ResinTrap` issues, drained groups are dropped.

use super::hollow::{HollowArea, HollowAreaId, HollowAreaKind, TrapConnectivityTree};
use super::issue::{Issue, IssueKind};
use super::main_issue::MainIssue;
use crate::document::PrintSettings;
use crate::layer_error::LayerError;
use crate::layers::{Layer, LayerStack};
use crate::progress::OperationProgress;
use crate::raster::Raster;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// What a detector sees for one layer.
#[derive(Debug)]
pub struct DetectionInput<'a> {
    pub layer: &'a Layer,
    /// Height of this layer (Z delta to the layer below).
    pub layer_height: f32,
    pub raster: &'a Raster,
    pub previous: Option<&'a Raster>,
    pub next: Option<&'a Raster>,
    pub settings: &'a PrintSettings,
}

/// What a detector reports for one layer.
#[derive(Clone, Debug, Default)]
pub struct LayerDetection {
    pub issues: Vec<(IssueKind, Issue)>,
    pub hollow_areas: Vec<HollowArea>,
}

/// Finds defects on a single decoded layer.
pub trait LayerDetector: Sync {
    fn detect(&self, input: &DetectionInput<'_>) -> Result<LayerDetection, LayerError>;
}

/// Decides whether two hollow areas on consecutive layers are the same cavity.
pub trait HollowOverlap: Sync {
    fn overlaps(&self, upper: &HollowArea, lower: &HollowArea) -> bool;
}

/// Overlap by bounding rect intersection.
#[derive(Copy, Clone, Debug, Default)]
pub struct BoundingRectOverlap;

impl HollowOverlap for BoundingRectOverlap {
    fn overlaps(&self, upper: &HollowArea, lower: &HollowArea) -> bool {
        upper.bounding_rect().intersects_with(&lower.bounding_rect())
    }
}

/// Detection knobs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionOptions {
    /// Issue kinds to report; anything else the detector yields is dropped.
    pub enabled_kinds: Vec<IssueKind>,
    /// Hollow areas on layers up to this index are treated as drains.
    pub trap_start_layer: u32,
    /// Treat hollows on the first layers (up to `trap_start_layer`) and on the
    /// last layer as drains.
    pub boundary_layers_drain: bool,
}

impl DetectionOptions {
    /// Every kind enabled.
    pub fn all() -> Self {
        Self {
            enabled_kinds: IssueKind::ALL.to_vec(),
            trap_start_layer: 0,
            boundary_layers_drain: true,
        }
    }

    #[inline]
    pub fn is_enabled(&self, kind: IssueKind) -> bool {
        self.enabled_kinds.contains(&kind)
    }
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self::all()
    }
}

fn decode_optional(stack: &LayerStack, index: u32) -> Result<Option<Raster>, LayerError> {
    match stack.get(index) {
        Some(layer) if layer.has_image() => layer.raster(stack.codec()).map(Some),
        _ => Ok(None),
    }
}

/// Runs `detector` over every layer of `stack` and aggregates the result,
/// sorted by kind then start layer.
///
/// Layers without an image are skipped.
///
/// # Errors
/// `Cancelled` when `progress` is cancelled; `EmptySlot` on a hole in the
/// stack; detector and codec errors.
pub fn detect_issues(
    stack: &LayerStack,
    detector: &dyn LayerDetector,
    overlap: &dyn HollowOverlap,
    options: &DetectionOptions,
    progress: Option<&OperationProgress>,
) -> Result<Vec<MainIssue>, LayerError> {
    let local = OperationProgress::default();
    let progress = progress.unwrap_or(&local);
    let len = stack.len() as u32;
    progress.reset(u64::from(len));

    let detections = (0..len)
        .into_par_iter()
        .map(|index| {
            if progress.is_cancelled() {
                return Err(LayerError::Cancelled);
            }
            let layer = stack.get(index).ok_or(LayerError::EmptySlot { index })?;
            if !layer.has_image() {
                progress.increment();
                return Ok(LayerDetection::default());
            }
            let raster = layer.raster(stack.codec())?;
            let previous = match index.checked_sub(1) {
                Some(i) => decode_optional(stack, i)?,
                None => None,
            };
            let next = decode_optional(stack, index + 1)?;
            let detection = detector.detect(&DetectionInput {
                layer,
                layer_height: stack.layer_height(index),
                raster: &raster,
                previous: previous.as_ref(),
                next: next.as_ref(),
                settings: stack.settings(),
            })?;
            log::trace!(
                "layer {index}: {} issues, {} hollow areas",
                detection.issues.len(),
                detection.hollow_areas.len()
            );
            progress.increment();
            Ok(detection)
        })
        .collect::<Result<Vec<_>, _>>();

    let detections = match detections {
        Err(LayerError::Cancelled) => {
            log::warn!("issue detection cancelled at {}/{} layers", progress.processed(), len);
            return Err(LayerError::Cancelled);
        }
        other => other?,
    };

    let mut issues = Vec::new();
    let mut hollows = Vec::with_capacity(detections.len());
    for detection in detections {
        issues.extend(
            detection
                .issues
                .into_iter()
                .filter(|(kind, _)| options.is_enabled(*kind))
                .map(|(kind, issue)| MainIssue::single(kind, issue)),
        );
        hollows.push(detection.hollow_areas);
    }

    if options.is_enabled(IssueKind::ResinTrap) {
        issues.extend(group_resin_traps(stack, hollows, overlap, options, Some(progress))?);
    }

    issues.sort_by_key(|issue| (issue.kind(), issue.start_layer_index()));
    log::debug!("detected {} issues over {len} layers", issues.len());
    Ok(issues)
}

/// Groups per-layer hollow areas (`hollows[i]` belongs to layer `i`) into
/// connected cavities, scanning from the top layer down, and returns one
/// `ResinTrap` issue per group that does not drain.
pub fn group_resin_traps(
    stack: &LayerStack,
    hollows: Vec<Vec<HollowArea>>,
    overlap: &dyn HollowOverlap,
    options: &DetectionOptions,
    progress: Option<&OperationProgress>,
) -> Result<Vec<MainIssue>, LayerError> {
    let local = OperationProgress::default();
    let progress = progress.unwrap_or(&local);
    progress.reset(hollows.len() as u64);

    let last = hollows.len().saturating_sub(1);
    let mut tree = TrapConnectivityTree::new();
    let mut ids: Vec<Vec<HollowAreaId>> = Vec::with_capacity(hollows.len());
    for (layer_index, areas) in hollows.into_iter().enumerate() {
        let boundary = options.boundary_layers_drain
            && (layer_index as u32 <= options.trap_start_layer || layer_index == last);
        let mut layer_ids = Vec::with_capacity(areas.len());
        for area in areas {
            let id = tree.insert_area(area);
            if boundary {
                tree.set_area_kind(id, HollowAreaKind::Drain)?;
            }
            layer_ids.push(id);
        }
        ids.push(layer_ids);
    }

    for layer_index in (0..ids.len()).rev() {
        if progress.is_cancelled() {
            log::warn!("resin trap grouping cancelled at layer {layer_index}");
            return Err(LayerError::Cancelled);
        }
        let below: &[HollowAreaId] = match layer_index.checked_sub(1) {
            Some(i) => &ids[i],
            None => &[],
        };
        for &upper in &ids[layer_index] {
            let (mut group, _) = tree.add_root(upper)?;
            for &lower in below {
                let connected = match (tree.area(upper), tree.area(lower)) {
                    (Some(a), Some(b)) => overlap.overlaps(a, b),
                    _ => false,
                };
                if connected {
                    group = tree.add_child(group, lower)?;
                }
            }
            tree.mark_processed(upper)?;
        }
        progress.increment();
    }

    let mut traps = Vec::new();
    for group in tree.groups().iter().filter(|g| g.is_trap()) {
        let children = group
            .members()
            .iter()
            .filter_map(|&id| tree.area(id))
            .map(|area| {
                Issue::from_contours(
                    area.layer_index(),
                    stack.layer_height(area.layer_index()),
                    area.contours().to_vec(),
                )
            })
            .collect();
        traps.push(MainIssue::new(IssueKind::ResinTrap, children)?);
    }
    log::debug!(
        "{} trap groups, {} still trapping resin",
        tree.groups().len(),
        traps.len()
    );
    Ok(traps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SliceContext;
    use crate::geometry::{Point, Polygon, Rect, Size};
    use crate::raster::DeflateCodec;
    use std::sync::Arc;

    fn square(layer: u32, x: i32, size: i32) -> HollowArea {
        HollowArea::new(
            layer,
            vec![Polygon::new(vec![
                Point::new(x, x),
                Point::new(x + size, x),
                Point::new(x + size, x + size),
                Point::new(x, x + size),
            ])],
            HollowAreaKind::Unknown,
        )
    }

    struct Scripted(Vec<LayerDetection>);

    impl LayerDetector for Scripted {
        fn detect(&self, input: &DetectionInput<'_>) -> Result<LayerDetection, LayerError> {
            Ok(self.0[input.layer.index() as usize].clone())
        }
    }

    fn stack(len: usize) -> LayerStack {
        let mut stack = LayerStack::new(SliceContext::default(), Arc::new(DeflateCodec::default()));
        stack
            .allocate_from_rasters(&vec![Raster::blank(Size::new(16, 16)); len])
            .unwrap();
        stack
    }

    #[test]
    fn chained_hollows_form_one_trap() {
        let stack = stack(5);
        let hollows = vec![
            vec![],
            vec![square(1, 2, 4)],
            vec![square(2, 3, 4)],
            vec![square(3, 4, 4)],
            vec![],
        ];
        let traps =
            group_resin_traps(&stack, hollows, &BoundingRectOverlap, &DetectionOptions::all(), None)
                .unwrap();
        assert_eq!(traps.len(), 1);
        assert_eq!(traps[0].start_layer_index(), 1);
        assert_eq!(traps[0].end_layer_index(), 3);
        assert_eq!(traps[0].len(), 3);
    }

    #[test]
    fn hollow_touching_last_layer_drains_its_chain() {
        let stack = stack(3);
        let hollows = vec![vec![], vec![square(1, 2, 4)], vec![square(2, 3, 4)]];
        let traps =
            group_resin_traps(&stack, hollows, &BoundingRectOverlap, &DetectionOptions::all(), None)
                .unwrap();
        assert!(traps.is_empty());
    }

    #[test]
    fn driver_filters_kinds_and_sorts() {
        let stack = stack(3);
        let island = |layer| Issue::from_rect(layer, 0.05, Rect::new(1, 1, 2, 2));
        let detector = Scripted(vec![
            LayerDetection::default(),
            LayerDetection {
                issues: vec![
                    (IssueKind::Overhang, island(1)),
                    (IssueKind::Island, island(1)),
                    (IssueKind::Debug, island(1)),
                ],
                hollow_areas: vec![],
            },
            LayerDetection {
                issues: vec![(IssueKind::Island, island(2))],
                hollow_areas: vec![],
            },
        ]);
        let mut options = DetectionOptions::all();
        options.enabled_kinds.retain(|k| *k != IssueKind::Debug);
        let issues = detect_issues(&stack, &detector, &BoundingRectOverlap, &options, None).unwrap();
        let summary: Vec<_> = issues.iter().map(|i| (i.kind(), i.start_layer_index())).collect();
        assert_eq!(
            summary,
            vec![(IssueKind::Island, 1), (IssueKind::Island, 2), (IssueKind::Overhang, 1)]
        );
    }

    #[test]
    fn cancelled_detection_reports_cancellation() {
        let stack = stack(4);
        let detector = Scripted(vec![LayerDetection::default(); 4]);
        let progress = OperationProgress::new(0);
        progress.cancel();
        assert_eq!(
            detect_issues(&stack, &detector, &BoundingRectOverlap, &DetectionOptions::all(), Some(&progress)),
            Err(LayerError::Cancelled)
        );
    }
}
