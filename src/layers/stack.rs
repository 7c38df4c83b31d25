//! The layer arena: an ordered, index-stamped collection of [`Layer`]s.
//!
//! `LayerStack` is the only owner of its layers. Every structural mutation
//! goes through [`LayerStack::replace_all`], which re-stamps `index` and owner
//! on each layer, marks changed slots as modified, invalidates the cached
//! bounding rect and (when the length changed) rebuilds per-layer properties.
//!
//! Slots are `Option<Layer>`: holes are allowed transiently during bulk
//! allocation and rejected by [`LayerStack::sanitize`].

use super::cache::InvalidateCache;
use super::layer::Layer;
use crate::debug_invariants::DebugInvariants;
use crate::document::settings::{DEFAULT_BOTTOM_LIGHT_PWM, DEFAULT_LIGHT_PWM};
use crate::document::{
    DocumentHooks, LayerParameter, PrintParameterModifier, SliceContext, round_height,
};
use crate::geometry::Rect;
use crate::layer_error::LayerError;
use crate::progress::OperationProgress;
use crate::raster::{Raster, RasterCodec};
use bytes::Bytes;
use itertools::Itertools;
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque handle identifying one stack instance. Layers remember the handle
/// of the stack that stamped them instead of holding a pointer to it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackId(u64);

impl StackId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        StackId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Which layers a size query considers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LayerFilter {
    #[default]
    All,
    Bottom,
    Normal,
}

/// Ordered stack of layers plus the document context they fall back to.
pub struct LayerStack {
    id: StackId,
    layers: Vec<Option<Layer>>,
    /// Union of every layer's bounding rect; `EMPTY` means "not computed".
    bounding_rect: Rect,
    context: SliceContext,
    codec: Arc<dyn RasterCodec>,
    suppress_rebuild_properties: bool,
}

static_assertions::assert_impl_all!(LayerStack: Send, Sync);

impl LayerStack {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// An empty stack.
    pub fn new(context: SliceContext, codec: Arc<dyn RasterCodec>) -> Self {
        Self {
            id: StackId::next(),
            layers: Vec::new(),
            bounding_rect: Rect::EMPTY,
            context,
            codec,
            suppress_rebuild_properties: false,
        }
    }

    /// Replaces the document hooks that receive staleness notifications.
    pub fn with_hooks(mut self, hooks: Arc<dyn DocumentHooks>) -> Self {
        self.context = self.context.with_hooks(hooks);
        self
    }

    /// A stack holding `layers` in order.
    pub fn from_layers(
        context: SliceContext,
        codec: Arc<dyn RasterCodec>,
        layers: Vec<Layer>,
    ) -> Self {
        let mut stack = Self::new(context, codec);
        stack.replace_all(layers.into_iter().map(Some).collect());
        stack
    }

    /// Resets the stack to `len` slots, either empty layers or holes.
    pub fn init(&mut self, len: u32, initialize: bool) {
        let settings = self.context.settings();
        let layers = (0..len)
            .map(|i| initialize.then(|| Layer::new(i, settings)))
            .collect();
        self.replace_all(layers);
    }

    // -----------------------------------------------------------------------
    // Access
    // -----------------------------------------------------------------------

    #[inline]
    pub fn id(&self) -> StackId {
        self.id
    }

    #[inline]
    pub fn context(&self) -> &SliceContext {
        &self.context
    }

    #[inline]
    pub fn settings(&self) -> &crate::document::PrintSettings {
        self.context.settings()
    }

    #[inline]
    pub fn codec(&self) -> &dyn RasterCodec {
        self.codec.as_ref()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layer at `index`, `None` if out of range or a hole.
    #[inline]
    pub fn get(&self, index: u32) -> Option<&Layer> {
        self.layers.get(index as usize).and_then(Option::as_ref)
    }

    pub fn first(&self) -> Option<&Layer> {
        self.layers.first().and_then(Option::as_ref)
    }

    pub fn last(&self) -> Option<&Layer> {
        self.layers.last().and_then(Option::as_ref)
    }

    /// Raw slots, holes included.
    #[inline]
    pub fn slots(&self) -> &[Option<Layer>] {
        &self.layers
    }

    /// Present layers in order; holes are skipped.
    pub fn iter(&self) -> impl Iterator<Item = &Layer> + '_ {
        self.layers.iter().flatten()
    }

    pub fn previous(&self, index: u32) -> Option<&Layer> {
        self.get(index.checked_sub(1)?)
    }

    pub fn next(&self, index: u32) -> Option<&Layer> {
        self.get(index.checked_add(1)?)
    }

    /// Height of the layer at `index`: the Z delta to the nearest lower layer
    /// sitting at a different Z. The first layer's height is its own Z.
    /// Falls back to the document layer height when no such layer exists or
    /// Z decreases.
    pub fn layer_height(&self, index: u32) -> f32 {
        let fallback = self.settings().layer_height;
        let Some(layer) = self.get(index) else {
            return fallback;
        };
        if index == 0 {
            return layer.position_z();
        }
        for previous in (0..index).rev().filter_map(|i| self.get(i)) {
            let height = round_height(layer.position_z() - previous.position_z());
            if height == 0.0 {
                continue;
            }
            if height < 0.0 {
                break;
            }
            return height;
        }
        fallback
    }

    /// Runs `f` on one layer. The cached stack bounding rect is invalidated
    /// if the layer's image or geometry changed.
    pub fn with_layer_mut<R>(
        &mut self,
        index: u32,
        f: impl FnOnce(&mut Layer, &SliceContext) -> R,
    ) -> Option<R> {
        let layer = self.layers.get_mut(index as usize)?.as_mut()?;
        let image_before = layer.compressed_bytes().map(|b| (b.as_ptr(), b.len()));
        let rect_before = layer.bounding_rect();
        let result = f(layer, &self.context);
        let image_after = layer.compressed_bytes().map(|b| (b.as_ptr(), b.len()));
        if image_before != image_after || rect_before != layer.bounding_rect() {
            self.invalidate_cache();
            self.context.hooks().material_volume_stale();
        }
        Some(result)
    }

    /// Writes one parameter on one layer; `false` if there is no such layer.
    pub fn set_layer_parameter(&mut self, index: u32, param: LayerParameter, value: f32) -> bool {
        self.with_layer_mut(index, |layer, ctx| layer.set_parameter(param, value, ctx))
            .is_some()
    }

    /// Encodes `raster` into the layer at `index`.
    ///
    /// Returns `Ok(false)` if there is no such layer.
    pub fn set_layer_image(&mut self, index: u32, raster: &Raster) -> Result<bool, LayerError> {
        let codec = Arc::clone(&self.codec);
        match self.with_layer_mut(index, |layer, _| layer.set_image(raster, codec.as_ref())) {
            Some(result) => result.map(|()| true),
            None => Ok(false),
        }
    }

    // -----------------------------------------------------------------------
    // Structural mutation
    // -----------------------------------------------------------------------

    /// Wholesale replacement of every slot.
    ///
    /// Layers whose image differs from the old slot at the same index (or that
    /// land past the old end) are marked modified; unchanged slots keep their
    /// flag. A length change rebuilds Z and parameters from the document
    /// defaults unless rebuilding is suppressed.
    pub fn replace_all(&mut self, new_layers: Vec<Option<Layer>>) {
        let previous = self.image_snapshot();
        self.commit(new_layers, &previous);
    }

    fn image_snapshot(&self) -> Vec<Option<Bytes>> {
        self.layers
            .iter()
            .map(|slot| slot.as_ref().and_then(|l| l.compressed_bytes().cloned()))
            .collect()
    }

    /// Takes the current slots, lets `f` build the new sequence from them and
    /// commits it.
    fn restructure(&mut self, f: impl FnOnce(Vec<Option<Layer>>) -> Vec<Option<Layer>>) {
        let previous = self.image_snapshot();
        let old = std::mem::take(&mut self.layers);
        let new_layers = f(old);
        self.commit(new_layers, &previous);
    }

    /// Same as [`restructure`](Self::restructure) without rebuilding properties.
    fn restructure_suppressed(
        &mut self,
        f: impl FnOnce(Vec<Option<Layer>>) -> Vec<Option<Layer>>,
    ) {
        self.suppress_rebuild_properties = true;
        self.restructure(f);
        self.suppress_rebuild_properties = false;
    }

    fn commit(&mut self, mut new_layers: Vec<Option<Layer>>, previous: &[Option<Bytes>]) {
        let old_len = previous.len();
        let new_len = new_layers.len();
        self.invalidate_cache();

        for (i, slot) in new_layers.iter_mut().enumerate() {
            let Some(layer) = slot else { continue };
            layer.stamp(i as u32, self.id);
            let changed = match previous.get(i) {
                None => true,
                Some(old) => old.as_ref() != layer.compressed_bytes(),
            };
            if changed {
                layer.set_modified(true);
            }
        }
        self.layers = new_layers;
        log::debug!("stack {}: {} -> {} layers", self.id.0, old_len, new_len);

        if new_len != old_len && !self.suppress_rebuild_properties && self.last().is_some() {
            self.rebuild_layer_properties(true, None);
        } else {
            self.context.structure_changed();
        }

        crate::debug_invariants!(self.validate_invariants(), "LayerStack::commit");
    }

    pub fn push(&mut self, layer: Layer) {
        self.restructure(|mut layers| {
            layers.push(Some(layer));
            layers
        });
    }

    pub fn append_range(&mut self, new_layers: impl IntoIterator<Item = Layer>) {
        self.restructure(|mut layers| {
            layers.extend(new_layers.into_iter().map(Some));
            layers
        });
    }

    pub fn prepend(&mut self, layer: Layer) {
        self.insert(0, layer);
    }

    pub fn prepend_range(&mut self, new_layers: impl IntoIterator<Item = Layer>) {
        self.insert_range(0, new_layers);
    }

    /// Inserts before `index`; an index past the end appends.
    pub fn insert(&mut self, index: u32, layer: Layer) {
        self.restructure(|mut layers| {
            let at = (index as usize).min(layers.len());
            layers.insert(at, Some(layer));
            layers
        });
    }

    /// Inserts a run before `index`; an index past the end appends.
    pub fn insert_range(&mut self, index: u32, new_layers: impl IntoIterator<Item = Layer>) {
        self.restructure(|mut layers| {
            let at = (index as usize).min(layers.len());
            layers.splice(at..at, new_layers.into_iter().map(Some));
            layers
        });
    }

    /// Removes the slot at `index`. Returns `false` (and does nothing) when
    /// out of range.
    pub fn remove(&mut self, index: u32) -> bool {
        if index as usize >= self.layers.len() {
            return false;
        }
        self.restructure(|mut layers| {
            layers.remove(index as usize);
            layers
        });
        true
    }

    /// Removes up to `count` slots starting at `index`.
    pub fn remove_range(&mut self, index: u32, count: u32) -> bool {
        let start = index as usize;
        if count == 0 || start >= self.layers.len() {
            return false;
        }
        let end = (start + count as usize).min(self.layers.len());
        self.restructure(|mut layers| {
            layers.drain(start..end);
            layers
        });
        true
    }

    /// Drops every hole, compacting the stack.
    pub fn remove_nulls(&mut self) {
        if self.layers.iter().all(Option::is_some) {
            return;
        }
        self.restructure(|layers| layers.into_iter().filter(Option::is_some).collect());
    }

    /// Puts a deep copy of `layer` into slot `index`.
    pub fn set_layer_copy(&mut self, index: u32, layer: &Layer) -> bool {
        self.set_layer(index, layer.clone())
    }

    /// Moves `layer` into slot `index`.
    ///
    /// A layer replacing an existing one is marked modified. Returns `false`
    /// when `index` is out of range.
    pub fn set_layer(&mut self, index: u32, mut layer: Layer) -> bool {
        let Some(slot) = self.layers.get_mut(index as usize) else {
            return false;
        };
        if slot.is_some() {
            layer.set_modified(true);
        }
        layer.stamp(index, self.id);
        *slot = Some(layer);
        self.invalidate_cache();
        self.context.structure_changed();
        true
    }

    /// Resizes to `new_len`, keeping the leading layers. New slots are filled
    /// with blank layers when `init_blank`, else left as holes.
    pub fn reallocate(&mut self, new_len: u32, init_blank: bool) -> Result<(), LayerError> {
        let old_len = self.layers.len() as u32;
        if new_len == old_len {
            return Ok(());
        }
        let fill = if new_len > old_len && init_blank {
            self.blank_layers(old_len, new_len - old_len)?
        } else {
            Vec::new()
        };
        self.restructure_suppressed(|mut layers| {
            layers.truncate(new_len as usize);
            if fill.is_empty() {
                layers.resize_with(new_len as usize, || None);
            } else {
                layers.extend(fill.into_iter().map(Some));
            }
            layers
        });
        Ok(())
    }

    /// Opens `count` new slots before `at`, shifting the tail up.
    pub fn reallocate_insert(&mut self, at: u32, count: u32, init_blank: bool) -> Result<(), LayerError> {
        if count == 0 {
            return Ok(());
        }
        let at = at.min(self.layers.len() as u32);
        let fill: Vec<Option<Layer>> = if init_blank {
            self.blank_layers(at, count)?.into_iter().map(Some).collect()
        } else {
            (0..count).map(|_| None).collect()
        };
        self.restructure_suppressed(|layers| {
            let mut dense = Vec::with_capacity(layers.len() + fill.len());
            let mut old = layers.into_iter();
            dense.extend(old.by_ref().take(at as usize));
            dense.extend(fill);
            dense.extend(old);
            dense
        });
        Ok(())
    }

    pub fn reallocate_start(&mut self, count: u32, init_blank: bool) -> Result<(), LayerError> {
        self.reallocate_insert(0, count, init_blank)
    }

    pub fn reallocate_end(&mut self, count: u32, init_blank: bool) -> Result<(), LayerError> {
        self.reallocate_insert(self.layers.len() as u32, count, init_blank)
    }

    /// Keeps only `start..=end`. Returns `false` for an empty or out-of-range span.
    pub fn reallocate_keep_range(&mut self, start: u32, end: u32) -> bool {
        if end < start || end as usize >= self.layers.len() {
            return false;
        }
        self.restructure_suppressed(|layers| {
            layers
                .into_iter()
                .skip(start as usize)
                .take((end - start + 1) as usize)
                .collect()
        });
        true
    }

    /// Builds `count` blank layers starting at `first_index`, in parallel.
    /// They all share one encoded black image.
    fn blank_layers(&self, first_index: u32, count: u32) -> Result<Vec<Layer>, LayerError> {
        let settings = self.context.settings();
        let resolution = settings.resolution;
        if resolution.has_zero() {
            return Err(LayerError::InvalidResolution {
                width: resolution.width,
                height: resolution.height,
            });
        }
        let encoded = self.codec.encode(&Raster::blank(resolution))?;
        Ok((first_index..first_index + count)
            .into_par_iter()
            .map(|i| Layer::blank(i, encoded.clone(), settings))
            .collect())
    }

    /// Replaces the stack with one layer per raster, encoding in parallel.
    pub fn allocate_from_rasters(&mut self, rasters: &[Raster]) -> Result<(), LayerError> {
        let settings = self.context.settings();
        let codec = self.codec.as_ref();
        let layers = rasters
            .par_iter()
            .enumerate()
            .map(|(i, raster)| Layer::from_raster(i as u32, raster, codec, settings).map(Some))
            .collect::<Result<Vec<_>, _>>()?;
        self.replace_all(layers);
        Ok(())
    }

    /// Applies `f` to every present layer in parallel, then invalidates the
    /// cached bounding rect. Layer count and order are untouched.
    pub(crate) fn par_update<F>(&mut self, f: F) -> Result<(), LayerError>
    where
        F: Fn(&mut Layer, &dyn RasterCodec) -> Result<(), LayerError> + Sync + Send,
    {
        let codec = self.codec.as_ref();
        let result = self
            .layers
            .par_iter_mut()
            .filter_map(Option::as_mut)
            .try_for_each(|layer| f(layer, codec));
        self.invalidate_cache();
        self.context.structure_changed();
        result
    }

    /// Removes every layer.
    pub fn clear(&mut self) {
        self.replace_all(Vec::new());
    }

    // -----------------------------------------------------------------------
    // Bounding rect
    // -----------------------------------------------------------------------

    /// Cached union of all layer bounding rects, `EMPTY` until computed.
    #[inline]
    pub fn bounding_rect(&self) -> Rect {
        self.bounding_rect
    }

    /// Returns the cached union or recomputes it.
    ///
    /// Per-layer geometry is computed in parallel; the union is then folded
    /// sequentially from layer 0 upward.
    ///
    /// # Errors
    /// `Cancelled` if `progress` is cancelled before the per-layer pass
    /// completes; the cached rect is then left `EMPTY`. Codec errors propagate
    /// the same way.
    pub fn get_bounding_rect(
        &mut self,
        progress: Option<&OperationProgress>,
    ) -> Result<Rect, LayerError> {
        if !self.bounding_rect.is_empty() || self.layers.is_empty() {
            return Ok(self.bounding_rect);
        }
        let local = OperationProgress::default();
        let progress = progress.unwrap_or(&local);
        progress.reset(self.layers.len() as u64);
        self.bounding_rect = Rect::EMPTY;

        let codec = self.codec.as_ref();
        let pass = self.layers.par_iter().try_for_each(|slot| {
            if progress.is_cancelled() {
                return Err(LayerError::Cancelled);
            }
            if let Some(layer) = slot {
                layer.get_or_compute_bounding_rect(codec, false)?;
            }
            progress.increment();
            Ok(())
        });
        if let Err(e) = pass {
            if e == LayerError::Cancelled {
                log::warn!(
                    "bounding rect scan cancelled after {}/{} layers",
                    progress.processed(),
                    progress.total()
                );
            }
            return Err(e);
        }
        if progress.is_cancelled() {
            log::warn!("bounding rect scan cancelled");
            return Err(LayerError::Cancelled);
        }

        self.bounding_rect = self
            .iter()
            .map(Layer::bounding_rect)
            .fold(Rect::EMPTY, |acc, rect| acc.union(&rect));
        log::debug!("stack {}: bounding rect {}", self.id.0, self.bounding_rect);
        Ok(self.bounding_rect)
    }

    // -----------------------------------------------------------------------
    // Validation and property rebuild
    // -----------------------------------------------------------------------

    /// Checks stack integrity and applies the documented corrections.
    ///
    /// Returns whether any correction was applied.
    ///
    /// # Errors
    /// - `EmptySlot` if any slot is a hole.
    /// - `NonMonotonicZ` if a layer sits lower than its predecessor.
    /// - `InvalidResolution` if the resolution is unset and no layer image
    ///   yields a usable one.
    pub fn sanitize(&mut self) -> Result<bool, LayerError> {
        if self.layers.is_empty() {
            return Ok(false);
        }
        if let Some(index) = self.layers.iter().position(Option::is_none) {
            return Err(LayerError::EmptySlot { index: index as u32 });
        }
        if let Some((a, b)) = self
            .iter()
            .tuple_windows()
            .find(|(a, b)| b.position_z() < a.position_z())
        {
            return Err(LayerError::NonMonotonicZ {
                previous: a.index(),
                previous_z: a.position_z(),
                index: b.index(),
                z: b.position_z(),
            });
        }

        let mut corrected = false;

        let resolution = self.settings().resolution;
        if resolution.has_zero() {
            let invalid = LayerError::InvalidResolution {
                width: resolution.width,
                height: resolution.height,
            };
            let layer = self.iter().find(|l| l.has_image()).ok_or(invalid.clone())?;
            let size = layer.raster(self.codec.as_ref())?.size();
            if size.has_zero() {
                return Err(invalid);
            }
            log::warn!("resolution was {resolution}, inferred {size} from layer {}", layer.index());
            self.context.settings_mut().resolution = size;
            corrected = true;
        }

        if self.first().is_some_and(|l| l.position_z() == 0.0) {
            let layer_height = self.settings().layer_height;
            log::warn!("first layer sits at Z=0, shifting all layers up by {layer_height}mm");
            for layer in self.layers.iter_mut().flatten() {
                layer.set_position_z(layer.position_z() + layer_height);
            }
            corrected = true;
        }

        if self.settings().normal.light_pwm == 0 {
            log::warn!("light PWM was 0, reset to {DEFAULT_LIGHT_PWM}");
            self.context.settings_mut().normal.light_pwm = DEFAULT_LIGHT_PWM;
            self.rebuild_layer_properties(false, Some(PrintParameterModifier::Normal(LayerParameter::LightPwm)));
            corrected = true;
        }
        if self.settings().bottom.light_pwm == 0 {
            log::warn!("bottom light PWM was 0, reset to {DEFAULT_BOTTOM_LIGHT_PWM}");
            self.context.settings_mut().bottom.light_pwm = DEFAULT_BOTTOM_LIGHT_PWM;
            self.rebuild_layer_properties(false, Some(PrintParameterModifier::Bottom(LayerParameter::LightPwm)));
            corrected = true;
        }

        Ok(corrected)
    }

    /// Re-derives Z (when `recalc_z`) and parameters from the document defaults.
    ///
    /// With `changed` naming one parameter only that parameter is rewritten:
    /// a `Bottom*` edit touches bottom layers, a normal edit touches normal
    /// layers and also bottom layers when the printer has no bottom variant
    /// for it. `None` or `BottomLayerCount` rewrites every parameter.
    pub fn rebuild_layer_properties(&mut self, recalc_z: bool, changed: Option<PrintParameterModifier>) {
        let id = self.id;
        let settings = self.context.settings();
        for (i, slot) in self.layers.iter_mut().enumerate() {
            let Some(layer) = slot else { continue };
            let index = i as u32;
            layer.stamp(index, id);
            if recalc_z {
                layer.set_position_z(settings.height_from_layer(index));
            }
            let is_bottom = settings.is_bottom_layer(index);
            match changed {
                None | Some(PrintParameterModifier::BottomLayerCount) => {
                    layer.apply_defaults(settings.bottom_or_normal(index));
                }
                Some(PrintParameterModifier::PositionZ) => {}
                Some(PrintParameterModifier::Bottom(param)) => {
                    if is_bottom {
                        layer.apply_default(param, settings.bottom.get(param));
                    }
                }
                Some(PrintParameterModifier::Normal(param)) => {
                    if !is_bottom || !settings.supports_bottom(param) {
                        layer.apply_default(param, settings.normal.get(param));
                    }
                }
            }
        }
        log::debug!(
            "stack {}: rebuilt layer properties (z: {recalc_z}, changed: {})",
            self.id.0,
            changed.map_or_else(|| "all".to_string(), |m| m.to_string())
        );
        self.context.structure_changed();
    }

    /// Applies a document-level edit and rebuilds the affected layer values.
    /// Returns `false` for modifiers that only exist per layer.
    pub fn set_document_value(&mut self, modifier: PrintParameterModifier, value: f32) -> bool {
        if !self.context.settings_mut().set_value_from_modifier(modifier, value) {
            return false;
        }
        self.rebuild_layer_properties(false, Some(modifier));
        true
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn is_modified(&self) -> bool {
        self.iter().any(Layer::is_modified)
    }

    pub fn set_all_modified(&mut self, modified: bool) {
        for layer in self.layers.iter_mut().flatten() {
            layer.set_modified(modified);
        }
    }

    /// Layers that share Z with their predecessor.
    pub fn same_positioned_layers(&self) -> impl Iterator<Item = &Layer> + '_ {
        self.iter()
            .tuple_windows()
            .filter(|(a, b)| a.position_z() == b.position_z())
            .map(|(_, b)| b)
    }

    /// First layer of each distinct Z within `start..=end`.
    pub fn distinct_by_position_z(&self, start: u32, end: u32) -> Vec<&Layer> {
        self.iter()
            .filter(|l| (start..=end).contains(&l.index()))
            .unique_by(|l| l.position_z().to_bits())
            .collect()
    }

    /// Layers with `start <= z <= end`.
    pub fn layers_in_height_range(&self, start: f32, end: f32) -> impl Iterator<Item = &Layer> + '_ {
        self.iter()
            .filter(move |l| l.position_z() >= start && l.position_z() <= end)
    }

    fn sized_layers(&self, filter: LayerFilter) -> impl Iterator<Item = &Layer> + '_ {
        let settings = self.settings();
        self.iter().filter(move |l| {
            !l.is_empty()
                && match filter {
                    LayerFilter::All => true,
                    LayerFilter::Bottom => l.is_bottom_layer(settings),
                    LayerFilter::Normal => !l.is_bottom_layer(settings),
                }
        })
    }

    /// Non-empty layer with the fewest lit pixels. Geometry must be computed.
    pub fn smallest_layer(&self, filter: LayerFilter) -> Option<&Layer> {
        self.sized_layers(filter).min_by_key(|l| l.non_zero_pixel_count())
    }

    /// Non-empty layer with the most lit pixels. Geometry must be computed.
    pub fn largest_layer(&self, filter: LayerFilter) -> Option<&Layer> {
        self.sized_layers(filter).max_by_key(|l| l.non_zero_pixel_count())
    }

    /// Pixel-wise maximum of the layer at `index` and every following layer
    /// at the same Z. Also returns the index of the last merged layer.
    pub fn merged_raster_for_same_z(&self, index: u32) -> Result<(Raster, u32), LayerError> {
        let start = self.get(index).ok_or(LayerError::EmptySlot { index })?;
        let mut merged = start.raster(self.codec.as_ref())?;
        let mut last = index;
        for next in self
            .iter()
            .skip(index as usize + 1)
            .take_while(|l| l.position_z() == start.position_z())
        {
            merged.max_in_place(&next.raster(self.codec.as_ref())?)?;
            last = next.index();
        }
        Ok((merged, last))
    }

    /// Sets the lift of every layer sharing Z with its predecessor and clears
    /// its wait after lift; with `zero_delays` the other waits are cleared too.
    pub fn set_lift_for_same_positioned_layers(&mut self, lift_height: f32, zero_delays: bool) {
        let same: Vec<u32> = self.same_positioned_layers().map(Layer::index).collect();
        for index in same {
            if let Some(layer) = self.layers[index as usize].as_mut() {
                layer.set_lift_height_total(lift_height, &self.context);
                layer.set_parameter(LayerParameter::WaitTimeAfterLift, 0.0, &self.context);
                if zero_delays {
                    for param in [
                        LayerParameter::LightOffDelay,
                        LayerParameter::WaitTimeBeforeCure,
                        LayerParameter::WaitTimeAfterCure,
                    ] {
                        layer.set_parameter(param, 0.0, &self.context);
                    }
                }
            }
        }
        self.context.hooks().gcode_stale();
    }

    pub fn all_layers_use_global_parameters(&self) -> bool {
        let settings = self.settings();
        self.iter().all(|l| l.is_using_global_parameters(settings))
    }

    pub fn any_layer_uses_tsmc(&self) -> bool {
        self.iter().any(Layer::is_using_tsmc)
    }
}

impl InvalidateCache for LayerStack {
    fn invalidate_cache(&mut self) {
        self.bounding_rect = Rect::EMPTY;
    }
}

impl DebugInvariants for LayerStack {
    fn validate_invariants(&self) -> Result<(), LayerError> {
        for (i, layer) in self.layers.iter().enumerate() {
            let Some(layer) = layer else { continue };
            if layer.index() as usize != i {
                return Err(LayerError::InvariantViolation(format!(
                    "slot {i} holds layer stamped {}",
                    layer.index()
                )));
            }
            if layer.owner() != Some(self.id) {
                return Err(LayerError::InvariantViolation(format!(
                    "layer {i} is not owned by stack {}",
                    self.id.0
                )));
            }
        }
        Ok(())
    }
}

/// Deep copy with a fresh stack id; the cached bounding rect is kept.
impl Clone for LayerStack {
    fn clone(&self) -> Self {
        let id = StackId::next();
        let layers = self
            .layers
            .iter()
            .map(|slot| {
                slot.as_ref().map(|layer| {
                    let mut copy = layer.clone();
                    copy.stamp(layer.index(), id);
                    copy
                })
            })
            .collect();
        Self {
            id,
            layers,
            bounding_rect: self.bounding_rect,
            context: self.context.clone(),
            codec: Arc::clone(&self.codec),
            suppress_rebuild_properties: false,
        }
    }
}

impl fmt::Debug for LayerStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerStack")
            .field("id", &self.id.0)
            .field("len", &self.layers.len())
            .field("bounding_rect", &self.bounding_rect)
            .field("settings", self.context.settings())
            .finish_non_exhaustive()
    }
}
