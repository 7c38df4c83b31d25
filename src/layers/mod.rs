//! Layer data model: single slices, the owning stack arena and batched edits.

pub mod batch;
pub mod cache;
pub mod layer;
pub mod stack;

pub use batch::LayerEditBatch;
pub use cache::InvalidateCache;
pub use layer::Layer;
pub use stack::{LayerFilter, LayerStack, StackId};
