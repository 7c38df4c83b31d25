//! Batched pixel edits over many layers.
//!
//! Edits targeting the same layer share one decoded raster: the first edit
//! decodes it into a concurrent per-index cache, later edits mutate it in
//! place. [`LayerEditBatch::flush`] re-encodes every touched raster in
//! parallel and writes it back into the stack.

use super::stack::LayerStack;
use crate::layer_error::LayerError;
use crate::progress::OperationProgress;
use crate::raster::Raster;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Per-layer raster cache keyed by layer index.
#[derive(Debug, Default)]
pub struct LayerEditBatch {
    rasters: DashMap<u32, Raster>,
}

impl LayerEditBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of layers with pending edits.
    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }

    pub fn contains(&self, index: u32) -> bool {
        self.rasters.contains_key(&index)
    }

    /// Runs `f` on the cached raster of layer `index`, decoding it from
    /// `stack` on first touch. Safe to call from several threads at once.
    ///
    /// # Errors
    /// `EmptySlot` if the stack has no layer at `index`; decode errors.
    pub fn edit<R>(
        &self,
        stack: &LayerStack,
        index: u32,
        f: impl FnOnce(&mut Raster) -> R,
    ) -> Result<R, LayerError> {
        let mut raster = match self.rasters.entry(index) {
            Entry::Occupied(entry) => entry.into_ref(),
            Entry::Vacant(entry) => {
                let layer = stack.get(index).ok_or(LayerError::EmptySlot { index })?;
                entry.insert(layer.raster(stack.codec())?)
            }
        };
        Ok(f(raster.value_mut()))
    }

    /// Drops every pending edit.
    pub fn discard(&self) {
        self.rasters.clear();
    }

    /// Encodes every edited raster back into its layer, in parallel.
    ///
    /// Flushed layers are marked modified and the stack bounding rect is
    /// invalidated. Returns how many layers were written.
    ///
    /// # Errors
    /// `Cancelled` if `progress` is cancelled mid-flush (layers already
    /// written stay written, the rest keep their old image); codec errors.
    pub fn flush(
        self,
        stack: &mut LayerStack,
        progress: Option<&OperationProgress>,
    ) -> Result<usize, LayerError> {
        let count = self.rasters.len();
        if count == 0 {
            return Ok(0);
        }
        let local = OperationProgress::default();
        let progress = progress.unwrap_or(&local);
        progress.reset(count as u64);

        let rasters = self.rasters;
        stack.par_update(|layer, codec| {
            if !rasters.contains_key(&layer.index()) {
                return Ok(());
            }
            if progress.is_cancelled() {
                return Err(LayerError::Cancelled);
            }
            if let Some((_, raster)) = rasters.remove(&layer.index()) {
                layer.set_image(&raster, codec)?;
                progress.increment();
            }
            Ok(())
        })?;
        log::debug!("flushed {count} edited layers");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SliceContext;
    use crate::geometry::{Rect, Size};
    use crate::raster::DeflateCodec;
    use rayon::prelude::*;
    use std::sync::Arc;

    fn stack() -> LayerStack {
        let mut stack = LayerStack::new(SliceContext::default(), Arc::new(DeflateCodec::default()));
        let blank = Raster::blank(Size::new(32, 32));
        stack
            .allocate_from_rasters(&vec![blank; 4])
            .unwrap();
        stack.set_all_modified(false);
        stack
    }

    #[test]
    fn edits_share_one_decode_and_flush_in_parallel() {
        let mut stack = stack();
        let batch = LayerEditBatch::new();
        (0..8u32).into_par_iter().for_each(|k| {
            let index = k % 2;
            batch
                .edit(&stack, index, |r| r.set(k, k, 255))
                .unwrap();
        });
        assert_eq!(batch.len(), 2);

        assert_eq!(batch.flush(&mut stack, None).unwrap(), 2);
        assert!(stack.get(0).unwrap().is_modified());
        assert!(!stack.get(3).unwrap().is_modified());
        assert_eq!(stack.get(0).unwrap().non_zero_pixel_count(), 4);
        assert_eq!(
            stack.get_bounding_rect(None).unwrap(),
            Rect::from_ltrb(0, 0, 8, 8)
        );
    }

    #[test]
    fn editing_missing_layer_fails() {
        let stack = stack();
        let batch = LayerEditBatch::new();
        assert!(matches!(
            batch.edit(&stack, 9, |_| ()),
            Err(LayerError::EmptySlot { index: 9 })
        ));
        assert!(batch.is_empty());
    }
}
