//! Defect model: per-layer [`Issue`]s, multi-layer [`MainIssue`]s, the
//! resin-trap connectivity tree and the detection driver that ties them to a
//! [`LayerStack`](crate::layers::LayerStack).

pub mod hollow;
pub mod issue;
pub mod main_issue;
pub mod scan;

pub use hollow::{
    GroupId, HollowArea, HollowAreaId, HollowAreaKind, TrapConnectivityTree, TrapGroup,
};
pub use issue::{Issue, IssueKind, IssueShape};
pub use main_issue::MainIssue;
pub use scan::{
    BoundingRectOverlap, DetectionInput, DetectionOptions, HollowOverlap, LayerDetection,
    LayerDetector, detect_issues, group_resin_traps,
};
