//! Invalidation of derived per-layer and per-stack geometry.

/// Implemented by anything that caches values derived from layer images:
/// a layer's bounding rect and pixel count, the stack-wide union.
pub trait InvalidateCache {
    /// Forget cached values; the next query recomputes them from the images.
    fn invalidate_cache(&mut self);
}
