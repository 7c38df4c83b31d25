mod util;

use resin_layers::LayerError;
use resin_layers::debug_invariants::DebugInvariants;
use resin_layers::geometry::{Point, Polygon, Rect};
use resin_layers::issues::{
    BoundingRectOverlap, DetectionInput, DetectionOptions, HollowArea, HollowAreaKind, Issue,
    IssueKind, LayerDetection, LayerDetector, MainIssue, TrapConnectivityTree, detect_issues,
};
use resin_layers::raster::Raster;
use util::{RESOLUTION, stack_from_rects};

fn outline(rect: Rect) -> Polygon {
    Polygon::new(vec![
        Point::new(rect.left(), rect.top()),
        Point::new(rect.right() - 1, rect.top()),
        Point::new(rect.right() - 1, rect.bottom() - 1),
        Point::new(rect.left(), rect.bottom() - 1),
    ])
}

fn hollow(layer: u32, rect: Rect) -> HollowArea {
    HollowArea::new(layer, vec![outline(rect)], HollowAreaKind::Unknown)
}

#[test]
fn main_issue_area_is_normalized_by_layer_height() -> Result<(), LayerError> {
    let main = MainIssue::new(
        IssueKind::SuctionCup,
        vec![
            Issue::new(3, 0.05, Rect::new(0, 0, 5, 5), 10.0),
            Issue::new(4, 0.1, Rect::new(0, 0, 5, 5), 20.0),
        ],
    )?;
    assert!((main.area() - 400.0).abs() < 1e-3);
    assert_ne!(main.area(), 30.0);
    Ok(())
}

#[test]
fn chained_children_share_one_group() -> Result<(), LayerError> {
    let mut tree = TrapConnectivityTree::new();
    let a = tree.insert_area(hollow(2, Rect::new(0, 0, 4, 4)));
    let b = tree.insert_area(hollow(1, Rect::new(1, 1, 4, 4)));
    let c = tree.insert_area(hollow(0, Rect::new(2, 2, 4, 4)));

    let (group, _) = tree.add_root(a)?;
    let group = tree.add_child(group, b)?;
    let (group_b, _) = tree.add_root(b)?;
    assert_eq!(group_b, group);
    let group = tree.add_child(group_b, c)?;

    assert_eq!(tree.groups().len(), 1);
    for area in [a, b, c] {
        assert_eq!(tree.find_group(area), Some(group));
    }
    tree.validate_invariants()
}

#[test]
fn chains_found_separately_merge_into_one_group() -> Result<(), LayerError> {
    let mut tree = TrapConnectivityTree::new();
    let a = tree.insert_area(hollow(2, Rect::new(0, 0, 4, 4)));
    let b = tree.insert_area(hollow(1, Rect::new(1, 1, 4, 4)));
    let c = tree.insert_area(hollow(0, Rect::new(2, 2, 4, 4)));

    let (ab, _) = tree.add_root(a)?;
    tree.add_child(ab, b)?;
    let (cc, _) = tree.add_root(c)?;
    assert_ne!(ab, cc);

    let merged = tree.add_child(cc, b)?;
    assert_eq!(tree.groups().len(), 1);
    assert!(tree.group(ab).is_none());
    assert!(tree.group(cc).is_none());
    let group = tree.group(merged).expect("merged group is live");
    assert_eq!(group.len(), 3);
    assert!([a, b, c].iter().all(|&id| group.contains(id)));
    tree.validate_invariants()
}

#[test]
fn drain_sticks_to_existing_and_later_members() -> Result<(), LayerError> {
    let mut tree = TrapConnectivityTree::new();
    let ids: Vec<_> = (0..4)
        .map(|layer| tree.insert_area(hollow(layer, Rect::new(0, 0, 3, 3))))
        .collect();

    let (group, _) = tree.add_root(ids[0])?;
    let group = tree.add_child(group, ids[1])?;
    let group = tree.add_child(group, ids[2])?;
    tree.set_area_kind(ids[1], HollowAreaKind::Drain)?;
    for &id in &ids[..3] {
        assert_eq!(tree.area_kind(id), Some(HollowAreaKind::Drain));
    }

    tree.set_area_kind(ids[0], HollowAreaKind::Trap)?;
    assert_eq!(tree.area_kind(ids[0]), Some(HollowAreaKind::Drain));

    tree.add_child(group, ids[3])?;
    assert_eq!(tree.area_kind(ids[3]), Some(HollowAreaKind::Drain));
    assert_eq!(tree.area(ids[3]).map(HollowArea::kind), Some(HollowAreaKind::Drain));
    tree.debug_assert_invariants();
    tree.validate_invariants()
}

#[test]
fn stale_handles_are_rejected() {
    let mut tree = TrapConnectivityTree::new();
    let area = tree.insert_area(hollow(0, Rect::new(0, 0, 2, 2)));
    let (group, _) = tree.add_root(area).unwrap();
    let other = tree.insert_area(hollow(1, Rect::new(0, 0, 2, 2)));
    let (second, _) = tree.add_root(other).unwrap();
    let merged = tree.merge_groups(group, second, true).unwrap();

    assert_eq!(tree.add_child(group, other), Err(LayerError::UnknownTrapGroup(group.get())));
    assert!(tree.group(merged.id()).is_some());
}

/// Each gray shade marks one cavity; white pixels over a black pixel of the
/// previous layer are reported as islands.
struct GrayCavityDetector;

const CAVITY_SHADES: [u8; 2] = [100, 128];

impl GrayCavityDetector {
    fn shade_bounds(raster: &Raster, shade: u8) -> Rect {
        let mut points = Vec::new();
        for y in 0..raster.height() {
            for x in 0..raster.width() {
                if raster.get(x, y) == Some(shade) {
                    points.push(Point::new(x as i32, y as i32));
                }
            }
        }
        Rect::from_points(&points)
    }
}

impl LayerDetector for GrayCavityDetector {
    fn detect(&self, input: &DetectionInput<'_>) -> Result<LayerDetection, LayerError> {
        let mut detection = LayerDetection::default();
        let index = input.layer.index();

        for shade in CAVITY_SHADES {
            let cavity = Self::shade_bounds(input.raster, shade);
            if !cavity.is_empty() {
                detection.hollow_areas.push(hollow(index, cavity));
            }
        }

        if let Some(previous) = input.previous {
            let mut island = Vec::new();
            for y in 0..input.raster.height() {
                for x in 0..input.raster.width() {
                    if input.raster.get(x, y) == Some(255) && previous.get(x, y) == Some(0) {
                        island.push(Point::new(x as i32, y as i32));
                    }
                }
            }
            if !island.is_empty() {
                detection
                    .issues
                    .push((IssueKind::Island, Issue::from_points(index, input.layer_height, island)));
            }
        }
        Ok(detection)
    }
}

#[test]
fn detection_reports_islands_and_closed_cavities() -> Result<(), Box<dyn std::error::Error>> {
    let mut stack = stack_from_rects(&[None; 6]);
    let closed = Rect::new(10, 10, 8, 8);
    let open = Rect::new(40, 10, 5, 5);
    for layer in 0..6u32 {
        let mut raster = Raster::blank(RESOLUTION);
        if (1..=4).contains(&layer) {
            raster.fill_rect(closed, 128);
        }
        if layer >= 3 {
            raster.fill_rect(open, 100);
        }
        if layer == 2 {
            raster.fill_rect(Rect::new(30, 30, 3, 3), 255);
        }
        stack.set_layer_image(layer, &raster)?;
    }

    let issues = detect_issues(
        &stack,
        &GrayCavityDetector,
        &BoundingRectOverlap,
        &DetectionOptions::default(),
        None,
    )?;
    let summary: Vec<_> = issues
        .iter()
        .map(|i| (i.kind(), i.layer_info()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (IssueKind::Island, "2".to_string()),
            (IssueKind::ResinTrap, "1-4 (4)".to_string()),
        ]
    );

    let island = &issues[0];
    assert_eq!(island.pixel_count(), 9);
    assert_eq!(island.bounding_rect(), Rect::new(30, 30, 3, 3));

    let trap = &issues[1];
    assert_eq!(trap.bounding_rect(), closed);
    assert!(trap.iter().all(|child| child.kind() == Some(IssueKind::ResinTrap)));
    let height = trap.total_height(&stack).expect("trap layers exist");
    assert!((height - 0.2).abs() < 1e-4);

    let mut only_islands = DetectionOptions::default();
    only_islands.enabled_kinds = vec![IssueKind::Island];
    let issues = detect_issues(&stack, &GrayCavityDetector, &BoundingRectOverlap, &only_islands, None)?;
    assert_eq!(issues.len(), 1);
    Ok(())
}

#[test]
fn main_issues_serialize_to_json() -> Result<(), Box<dyn std::error::Error>> {
    let main = MainIssue::new(
        IssueKind::Overhang,
        vec![
            Issue::from_rect(8, 0.05, Rect::new(1, 1, 6, 6)),
            Issue::from_points(7, 0.05, vec![Point::new(2, 2), Point::new(3, 3)]),
        ],
    )?;
    let json = serde_json::to_string(&main)?;
    assert!(json.contains("\"Overhang\""));
    let back: MainIssue = serde_json::from_str(&json)?;
    assert_eq!(back, main);
    assert_eq!(back.start_layer_index(), 7);

    let options: DetectionOptions = serde_json::from_str(
        r#"{"enabled_kinds":["ResinTrap"],"trap_start_layer":2,"boundary_layers_drain":false}"#,
    )?;
    assert!(options.is_enabled(IssueKind::ResinTrap));
    assert!(!options.is_enabled(IssueKind::Island));
    Ok(())
}
