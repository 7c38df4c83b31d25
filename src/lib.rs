#![cfg_attr(docsrs, feature(doc_cfg))]
//! # resin-layers
//!
//! resin-layers is the in-memory data model behind a resin (MSLA/DLP) slice
//! file: an ordered stack of layers, each holding a compressed monochrome
//! raster plus per-layer exposure and motion parameters, and the engine that
//! aggregates per-layer printability defects into logical multi-layer issues.
//!
//! ## Features
//! - [`LayerStack`](layers::LayerStack): an arena owning every layer, with
//!   index/owner stamping, structural edits (insert, remove, reallocate,
//!   keep-range) and modified-layer tracking
//! - Per-layer parameters that fall back to the document's bottom or normal
//!   defaults, driven by [`PrintParameterModifier`](document::PrintParameterModifier)s
//! - Lazily computed, cancellable bounding rects in parallel with Rayon
//! - Data sanitization (Z monotonicity, resolution inference, PWM repair)
//! - [`MainIssue`](issues::MainIssue) aggregation and the resin-trap
//!   connectivity tree with sticky drain semantics
//!
//! ## Determinism
//!
//! Parallel passes only compute per-layer results; every fold over those
//! results runs in layer order, so outputs do not depend on scheduling.
//! Randomized tests use fixed `SmallRng` seeds.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! resin-layers = "0.1"
//! # Optional features:
//! # features = ["check-invariants"]
//! ```
//!
//! With `check-invariants` enabled, stack and trap-tree invariants are
//! verified after every mutation in release builds as well.

pub mod debug_invariants;
pub mod document;
pub mod geometry;
pub mod issues;
pub mod layer_error;
pub mod layers;
pub mod progress;
pub mod raster;

pub use debug_invariants::DebugInvariants;
pub use layer_error::LayerError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::document::{
        DocumentHooks, LayerParameter, NoHooks, ParameterSet, PrintParameterModifier,
        PrintSettings, SliceContext, StaleFlags,
    };
    pub use crate::geometry::{Point, Polygon, Rect, Size};
    pub use crate::issues::{
        BoundingRectOverlap, DetectionOptions, HollowArea, HollowAreaKind, HollowOverlap, Issue,
        IssueKind, LayerDetector, MainIssue, TrapConnectivityTree, detect_issues,
    };
    pub use crate::layer_error::LayerError;
    pub use crate::layers::{
        InvalidateCache, Layer, LayerEditBatch, LayerFilter, LayerStack, StackId,
    };
    pub use crate::progress::OperationProgress;
    pub use crate::raster::{DeflateCodec, Raster, RasterCodec};
}
