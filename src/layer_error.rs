//! LayerError: Unified error type for resin-layers public APIs
//!
//! Data-integrity problems (empty slots, non-monotonic Z, unrecoverable
//! resolution) and collaborator failures (codec, cancellation) are reported
//! through this enum. Tolerant editing operations (out-of-range inserts and
//! removals, unknown modifiers) are *not* errors and return `bool`/`Option`.

use thiserror::Error;

/// Unified error type for layer stack and issue aggregation operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayerError {
    /// A stack slot that must hold a layer is empty.
    #[error("Layer {index} was defined but doesn't contain a valid image")]
    EmptySlot { index: u32 },
    /// A layer sits lower on Z than its predecessor.
    #[error(
        "Layer {previous} ({previous_z}mm) has a higher Z position than the successor layer {index} ({z}mm)"
    )]
    NonMonotonicZ {
        previous: u32,
        previous_z: f32,
        index: u32,
        z: f32,
    },
    /// Resolution is unset and could not be inferred from any raster.
    #[error("Resolution {width}x{height} is invalid and can't be inferred from the layers")]
    InvalidResolution { width: u32, height: u32 },
    /// An operation needed a decoded raster but the layer has no image.
    #[error("Layer {0} has no image")]
    MissingRaster(u32),
    /// The caller cancelled a long-running scan.
    #[error("Operation was cancelled")]
    Cancelled,
    /// The raster codec failed to encode or decode a buffer.
    #[error("Codec error: {0}")]
    Codec(String),
    /// A raster did not have the expected dimensions.
    #[error("Raster size mismatch: expected {expected_width}x{expected_height}, found {found_width}x{found_height}")]
    RasterSizeMismatch {
        expected_width: u32,
        expected_height: u32,
        found_width: u32,
        found_height: u32,
    },
    /// A `MainIssue` needs at least one child issue.
    #[error("A main issue requires at least one child issue")]
    EmptyMainIssue,
    /// A hollow area handle does not belong to this tree.
    #[error("Unknown hollow area handle {0}")]
    UnknownHollowArea(usize),
    /// A trap group handle is stale or never existed.
    #[error("Unknown trap group handle {0}")]
    UnknownTrapGroup(u64),
    /// Generic invariant violation reported by `validate_invariants`.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}
