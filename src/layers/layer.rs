//! A single slice: compressed raster, cached geometry and print parameters.
//!
//! A `Layer` is owned by exactly one [`LayerStack`] at a time. It knows its
//! position (`index`) and the handle of its owning stack, but never holds a
//! pointer to it: navigation to neighbours goes through the stack arena.
//!
//! # Parameter fallback
//! Every parameter write funnels through [`Layer::set_parameter`]. A value
//! outside the parameter's valid range (`<= 0` for speeds and exposure, `< 0`
//! for delays and heights) is replaced by the document's bottom default when
//! the layer is a bottom layer, else by the normal default.

use super::cache::InvalidateCache;
use super::stack::{LayerStack, StackId};
use crate::document::{
    LayerParameter, ParameterSet, PrintParameterModifier, PrintSettings, SliceContext,
    round_height, round_parameter, round_to,
};
use crate::document::settings::PARAMETER_PRECISION;
use crate::geometry::Rect;
use crate::layer_error::LayerError;
use crate::raster::{Raster, RasterCodec};
use bytes::Bytes;
use parking_lot::Mutex;
use std::fmt;

/// Cached geometry of the decoded raster.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct LayerGeometry {
    bounding_rect: Rect,
    non_zero_pixel_count: u32,
    computed: bool,
}

impl LayerGeometry {
    fn from_raster(raster: &Raster) -> Self {
        let bounding_rect = raster.bounding_rect();
        let non_zero_pixel_count = if bounding_rect.is_empty() {
            0
        } else {
            raster.count_non_zero()
        };
        Self {
            bounding_rect,
            non_zero_pixel_count,
            computed: true,
        }
    }
}

/// One slice of the model.
pub struct Layer {
    index: u32,
    owner: Option<StackId>,
    compressed_image: Option<Bytes>,
    /// Guards the cached geometry so it can be recomputed through `&self`
    /// from parallel scans.
    geometry: Mutex<LayerGeometry>,
    position_z: f32,
    parameters: ParameterSet,
    is_modified: bool,
}

static_assertions::assert_impl_all!(Layer: Send, Sync);

impl Layer {
    /// An empty layer at `index` with Z and parameters taken from the defaults.
    pub fn new(index: u32, settings: &PrintSettings) -> Self {
        Self {
            index,
            owner: None,
            compressed_image: None,
            geometry: Mutex::new(LayerGeometry::default()),
            position_z: settings.height_from_layer(index),
            parameters: settings.bottom_or_normal(index).rounded(),
            is_modified: false,
        }
    }

    /// A layer holding an already-compressed buffer. Geometry is computed lazily.
    pub fn from_compressed(index: u32, bytes: Bytes, settings: &PrintSettings) -> Self {
        let mut layer = Self::new(index, settings);
        layer.compressed_image = Some(bytes);
        layer
    }

    /// A layer encoded from a decoded raster; geometry is taken from the raster
    /// directly so no decode is needed later.
    pub fn from_raster(
        index: u32,
        raster: &Raster,
        codec: &dyn RasterCodec,
        settings: &PrintSettings,
    ) -> Result<Self, LayerError> {
        let mut layer = Self::new(index, settings);
        layer.compressed_image = Some(codec.encode(raster)?);
        *layer.geometry.get_mut() = LayerGeometry::from_raster(raster);
        Ok(layer)
    }

    /// A layer sharing an already-encoded all-black image. Its geometry is
    /// known to be empty, so it is never decoded.
    pub(crate) fn blank(index: u32, encoded_blank: Bytes, settings: &PrintSettings) -> Self {
        let mut layer = Self::new(index, settings);
        layer.compressed_image = Some(encoded_blank);
        *layer.geometry.get_mut() = LayerGeometry {
            computed: true,
            ..LayerGeometry::default()
        };
        layer
    }

    // -----------------------------------------------------------------------
    // Position in the stack
    // -----------------------------------------------------------------------

    /// Position in the owning stack.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// 1-based layer number.
    #[inline]
    pub fn number(&self) -> u32 {
        self.index + 1
    }

    #[inline]
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    /// Handle of the stack this layer is attached to.
    #[inline]
    pub fn owner(&self) -> Option<StackId> {
        self.owner
    }

    /// Only the stack re-stamps a layer.
    #[inline]
    pub(crate) fn stamp(&mut self, index: u32, owner: StackId) {
        self.index = index;
        self.owner = Some(owner);
    }

    /// The layer below this one, if attached to `stack`.
    pub fn previous<'a>(&self, stack: &'a LayerStack) -> Option<&'a Layer> {
        if self.owner != Some(stack.id()) || self.index == 0 {
            return None;
        }
        stack.get(self.index - 1)
    }

    /// The layer above this one, if attached to `stack`.
    pub fn next<'a>(&self, stack: &'a LayerStack) -> Option<&'a Layer> {
        if self.owner != Some(stack.id()) {
            return None;
        }
        stack.get(self.index.checked_add(1)?)
    }

    #[inline]
    pub fn is_bottom_layer(&self, settings: &PrintSettings) -> bool {
        settings.is_bottom_layer(self.index)
    }

    // -----------------------------------------------------------------------
    // Image
    // -----------------------------------------------------------------------

    #[inline]
    pub fn has_image(&self) -> bool {
        self.compressed_image.as_ref().is_some_and(|b| !b.is_empty())
    }

    #[inline]
    pub fn compressed_bytes(&self) -> Option<&Bytes> {
        self.compressed_image.as_ref()
    }

    /// True if both layers hold byte-identical compressed images.
    pub fn same_image(&self, other: &Layer) -> bool {
        self.compressed_image == other.compressed_image
    }

    /// Replaces the compressed buffer; cached geometry is discarded.
    pub fn set_compressed(&mut self, bytes: Option<Bytes>) {
        self.compressed_image = bytes;
        self.invalidate_cache();
        self.is_modified = true;
    }

    /// Encodes `raster` into this layer and refreshes geometry from it.
    pub fn set_image(&mut self, raster: &Raster, codec: &dyn RasterCodec) -> Result<(), LayerError> {
        self.compressed_image = Some(codec.encode(raster)?);
        *self.geometry.get_mut() = LayerGeometry::from_raster(raster);
        self.is_modified = true;
        Ok(())
    }

    /// Decodes the layer image.
    ///
    /// # Errors
    /// `MissingRaster` if the layer has no image, or any codec error.
    pub fn raster(&self, codec: &dyn RasterCodec) -> Result<Raster, LayerError> {
        match &self.compressed_image {
            Some(bytes) if !bytes.is_empty() => codec.decode(bytes),
            _ => Err(LayerError::MissingRaster(self.index)),
        }
    }

    /// Cached bounding rect; `EMPTY` until computed.
    #[inline]
    pub fn bounding_rect(&self) -> Rect {
        self.geometry.lock().bounding_rect
    }

    #[inline]
    pub fn non_zero_pixel_count(&self) -> u32 {
        self.geometry.lock().non_zero_pixel_count
    }

    /// True when no pixel is lit (or geometry has not been computed yet).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.non_zero_pixel_count() == 0
    }

    /// Returns the cached bounding rect, or decodes the raster to compute it
    /// (and the non-zero pixel count) when not yet computed or `force` is set.
    ///
    /// A layer without an image yields `EMPTY` without decoding.
    pub fn get_or_compute_bounding_rect(
        &self,
        codec: &dyn RasterCodec,
        force: bool,
    ) -> Result<Rect, LayerError> {
        let mut geometry = self.geometry.lock();
        if geometry.computed && !force {
            return Ok(geometry.bounding_rect);
        }
        *geometry = match &self.compressed_image {
            Some(bytes) if !bytes.is_empty() => LayerGeometry::from_raster(&codec.decode(bytes)?),
            _ => LayerGeometry {
                computed: true,
                ..LayerGeometry::default()
            },
        };
        log::trace!(
            "layer {}: bounding rect {} ({} px)",
            self.index,
            geometry.bounding_rect,
            geometry.non_zero_pixel_count
        );
        Ok(geometry.bounding_rect)
    }

    /// Printed area in mm².
    pub fn area_mm2(&self, settings: &PrintSettings) -> f32 {
        settings.pixel_area_mm2() * self.non_zero_pixel_count() as f32
    }

    /// Cured volume in mm³ given this layer's height.
    pub fn volume_mm3(&self, settings: &PrintSettings, layer_height: f32) -> f32 {
        self.area_mm2(settings) * layer_height
    }

    // -----------------------------------------------------------------------
    // Parameters
    // -----------------------------------------------------------------------

    #[inline]
    pub fn position_z(&self) -> f32 {
        self.position_z
    }

    /// Sets the absolute Z, rounded to the height precision.
    pub fn set_position_z(&mut self, value: f32) {
        self.position_z = round_height(value);
    }

    #[inline]
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    #[inline]
    pub fn parameter(&self, param: LayerParameter) -> f32 {
        self.parameters.get(param)
    }

    #[inline]
    pub fn light_off_delay(&self) -> f32 {
        self.parameters.light_off_delay
    }

    #[inline]
    pub fn wait_time_before_cure(&self) -> f32 {
        self.parameters.wait_time_before_cure
    }

    #[inline]
    pub fn exposure_time(&self) -> f32 {
        self.parameters.exposure_time
    }

    #[inline]
    pub fn wait_time_after_cure(&self) -> f32 {
        self.parameters.wait_time_after_cure
    }

    #[inline]
    pub fn lift_height(&self) -> f32 {
        self.parameters.lift_height
    }

    #[inline]
    pub fn lift_speed(&self) -> f32 {
        self.parameters.lift_speed
    }

    #[inline]
    pub fn lift_height2(&self) -> f32 {
        self.parameters.lift_height2
    }

    #[inline]
    pub fn lift_speed2(&self) -> f32 {
        self.parameters.lift_speed2
    }

    #[inline]
    pub fn wait_time_after_lift(&self) -> f32 {
        self.parameters.wait_time_after_lift
    }

    #[inline]
    pub fn retract_speed(&self) -> f32 {
        self.parameters.retract_speed
    }

    #[inline]
    pub fn retract_height2(&self) -> f32 {
        self.parameters.retract_height2
    }

    #[inline]
    pub fn retract_speed2(&self) -> f32 {
        self.parameters.retract_speed2
    }

    #[inline]
    pub fn light_pwm(&self) -> u8 {
        self.parameters.light_pwm
    }

    /// Lift 1 + lift 2.
    pub fn lift_height_total(&self) -> f32 {
        round_to(
            self.parameters.lift_height + self.parameters.lift_height2,
            PARAMETER_PRECISION,
        )
    }

    /// Retract travel equals lift travel.
    #[inline]
    pub fn retract_height_total(&self) -> f32 {
        self.lift_height_total()
    }

    /// First retract stage: total minus the second stage.
    pub fn retract_height(&self) -> f32 {
        round_to(
            self.lift_height_total() - self.parameters.retract_height2,
            PARAMETER_PRECISION,
        )
    }

    /// Slowest positive motor speed, or 0 if none is set.
    pub fn minimum_speed(&self) -> f32 {
        self.speeds()
            .into_iter()
            .filter(|&s| s > 0.0)
            .fold(None, |acc: Option<f32>, s| Some(acc.map_or(s, |a| a.min(s))))
            .unwrap_or(0.0)
    }

    /// Fastest motor speed.
    pub fn maximum_speed(&self) -> f32 {
        self.speeds().into_iter().fold(0.0, f32::max)
    }

    fn speeds(&self) -> [f32; 4] {
        [
            self.parameters.lift_speed,
            self.parameters.lift_speed2,
            self.parameters.retract_speed,
            self.parameters.retract_speed2,
        ]
    }

    /// True if the layer cures at all.
    #[inline]
    pub fn can_expose(&self) -> bool {
        self.parameters.exposure_time > 0.0 && self.parameters.light_pwm > 0
    }

    /// Two-stage motion control is in use.
    #[inline]
    pub fn is_using_tsmc(&self) -> bool {
        self.parameters.lift_height2 > 0.0 || self.parameters.retract_height2 > 0.0
    }

    /// True if Z and every parameter match the document defaults for this index.
    pub fn is_using_global_parameters(&self, settings: &PrintSettings) -> bool {
        self.position_z == settings.height_from_layer(self.index)
            && self.parameters == settings.bottom_or_normal(self.index).rounded()
    }

    /// Writes one parameter, applying the fallback rule and the retract clamp.
    pub fn set_parameter(&mut self, param: LayerParameter, value: f32, ctx: &SliceContext) {
        let mut value = round_parameter(param, value);
        if param.is_out_of_range(value) {
            value = ctx.settings().bottom_or_normal_value(self.index, param);
        }
        if param == LayerParameter::RetractHeight2 {
            value = value.max(0.0).min(self.lift_height_total().max(0.0));
        }
        self.parameters.set_raw(param, value);
        if matches!(param, LayerParameter::LiftHeight | LayerParameter::LiftHeight2) {
            let total = self.lift_height_total().max(0.0);
            self.parameters.retract_height2 = self.parameters.retract_height2.clamp(0.0, total);
        }
        ctx.parameters_changed();
    }

    /// Writes a document default without notifying hooks; the stack notifies
    /// once after a whole rebuild pass.
    pub(crate) fn apply_default(&mut self, param: LayerParameter, value: f32) {
        self.parameters.set(param, value);
        let total = self.lift_height_total().max(0.0);
        self.parameters.retract_height2 = self.parameters.retract_height2.clamp(0.0, total);
    }

    pub(crate) fn apply_defaults(&mut self, defaults: &ParameterSet) {
        self.parameters = defaults.rounded();
        let total = self.lift_height_total().max(0.0);
        self.parameters.retract_height2 = self.parameters.retract_height2.clamp(0.0, total);
    }

    /// Sets lift 1 to `value` and lift 2 to zero.
    pub fn set_lift_height_total(&mut self, value: f32, ctx: &SliceContext) {
        self.set_parameter(LayerParameter::LiftHeight, value, ctx);
        self.set_parameter(LayerParameter::LiftHeight2, 0.0, ctx);
    }

    /// Restores every parameter to the document default for this index.
    pub fn reset_parameters(&mut self, ctx: &SliceContext) {
        self.parameters = ctx.settings().bottom_or_normal(self.index).rounded();
        ctx.parameters_changed();
    }

    /// Applies one modifier. Returns whether a layer accepts it; document-level
    /// modifiers (`BottomLayerCount`, `Bottom*`) return `false`.
    pub fn set_value_from_modifier(
        &mut self,
        modifier: PrintParameterModifier,
        value: f32,
        ctx: &SliceContext,
    ) -> bool {
        match modifier {
            PrintParameterModifier::PositionZ => {
                self.set_position_z(value);
                true
            }
            PrintParameterModifier::Normal(param) => {
                self.set_parameter(param, value, ctx);
                true
            }
            PrintParameterModifier::Bottom(_) | PrintParameterModifier::BottomLayerCount => false,
        }
    }

    /// Same as [`set_value_from_modifier`](Self::set_value_from_modifier) but
    /// keyed by name; unknown names are a no-op returning `false`.
    pub fn set_value_from_modifier_name(&mut self, name: &str, value: f32, ctx: &SliceContext) -> bool {
        match PrintParameterModifier::from_name(name) {
            Some(modifier) => self.set_value_from_modifier(modifier, value, ctx),
            None => false,
        }
    }

    /// Applies a batch of edits and returns how many were accepted.
    pub fn set_values_from_modifiers(
        &mut self,
        edits: &[(PrintParameterModifier, f32)],
        ctx: &SliceContext,
    ) -> u8 {
        edits
            .iter()
            .filter(|(m, v)| self.set_value_from_modifier(*m, *v, ctx))
            .count()
            .min(u8::MAX as usize) as u8
    }

    pub fn copy_exposure_to(&self, target: &mut Layer, ctx: &SliceContext) {
        target.set_parameter(LayerParameter::ExposureTime, self.parameters.exposure_time, ctx);
        target.set_parameter(LayerParameter::LightPwm, f32::from(self.parameters.light_pwm), ctx);
    }

    pub fn copy_wait_times_to(&self, target: &mut Layer, ctx: &SliceContext) {
        use LayerParameter::*;
        for param in [LightOffDelay, WaitTimeBeforeCure, WaitTimeAfterCure, WaitTimeAfterLift] {
            target.set_parameter(param, self.parameter(param), ctx);
        }
    }

    pub fn copy_lift_to(&self, target: &mut Layer, ctx: &SliceContext) {
        use LayerParameter::*;
        for param in [
            LiftHeight,
            LiftHeight2,
            LiftSpeed,
            LiftSpeed2,
            RetractHeight2,
            RetractSpeed,
            RetractSpeed2,
        ] {
            target.set_parameter(param, self.parameter(param), ctx);
        }
    }

    /// Copies every kinematic parameter.
    pub fn copy_parameters_to(&self, target: &mut Layer, ctx: &SliceContext) {
        self.copy_wait_times_to(target, ctx);
        self.copy_exposure_to(target, ctx);
        self.copy_lift_to(target, ctx);
    }

    /// Copies the image (deep) and its cached geometry.
    pub fn copy_image_to(&self, target: &mut Layer) {
        if !self.has_image() {
            return;
        }
        target.compressed_image = self.compressed_image.as_deref().map(Bytes::copy_from_slice);
        *target.geometry.get_mut() = *self.geometry.lock();
        target.is_modified = true;
    }

    // -----------------------------------------------------------------------
    // Modification tracking
    // -----------------------------------------------------------------------

    #[inline]
    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    #[inline]
    pub fn set_modified(&mut self, modified: bool) {
        self.is_modified = modified;
    }
}

impl InvalidateCache for Layer {
    fn invalidate_cache(&mut self) {
        *self.geometry.get_mut() = LayerGeometry::default();
    }
}

/// Deep copy: the compressed buffer is duplicated, never shared. The copy is
/// detached from any stack.
impl Clone for Layer {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            owner: None,
            compressed_image: self.compressed_image.as_deref().map(Bytes::copy_from_slice),
            geometry: Mutex::new(*self.geometry.lock()),
            position_z: self.position_z,
            parameters: self.parameters,
            is_modified: self.is_modified,
        }
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let geometry = *self.geometry.lock();
        f.debug_struct("Layer")
            .field("index", &self.index)
            .field("position_z", &self.position_z)
            .field("bytes", &self.compressed_image.as_ref().map_or(0, Bytes::len))
            .field("bounding_rect", &geometry.bounding_rect)
            .field("non_zero_pixel_count", &geometry.non_zero_pixel_count)
            .field("exposure_time", &self.parameters.exposure_time)
            .field("is_modified", &self.is_modified)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;
    use crate::raster::DeflateCodec;

    fn ctx() -> SliceContext {
        SliceContext::default()
    }

    #[test]
    fn new_layer_takes_bottom_or_normal_defaults() {
        let ctx = ctx();
        let bottom = Layer::new(0, ctx.settings());
        let normal = Layer::new(10, ctx.settings());
        assert_eq!(bottom.exposure_time(), 30.0);
        assert_eq!(normal.exposure_time(), 3.0);
        assert_eq!(normal.position_z(), 0.55);
        assert!(normal.is_using_global_parameters(ctx.settings()));
    }

    #[test]
    fn negative_exposure_falls_back_to_bottom_default_on_bottom_layer() {
        let ctx = ctx();
        let mut layer = Layer::new(1, ctx.settings());
        layer.set_parameter(LayerParameter::ExposureTime, 12.0, &ctx);
        assert_eq!(layer.exposure_time(), 12.0);
        layer.set_parameter(LayerParameter::ExposureTime, -1.0, &ctx);
        assert_eq!(layer.exposure_time(), 30.0);
    }

    #[test]
    fn zero_is_valid_for_heights_but_not_speeds() {
        let ctx = ctx();
        let mut layer = Layer::new(8, ctx.settings());
        layer.set_parameter(LayerParameter::LiftHeight, 0.0, &ctx);
        assert_eq!(layer.lift_height(), 0.0);
        layer.set_parameter(LayerParameter::LiftSpeed, 0.0, &ctx);
        assert_eq!(layer.lift_speed(), 100.0);
    }

    #[test]
    fn retract_height2_is_clamped_to_lift_total() {
        let ctx = ctx();
        let mut layer = Layer::new(8, ctx.settings());
        layer.set_parameter(LayerParameter::LiftHeight, 3.0, &ctx);
        layer.set_parameter(LayerParameter::LiftHeight2, 2.0, &ctx);
        layer.set_parameter(LayerParameter::RetractHeight2, 9.0, &ctx);
        assert_eq!(layer.retract_height2(), 5.0);
        assert_eq!(layer.retract_height(), 0.0);
        layer.set_parameter(LayerParameter::LiftHeight2, 0.0, &ctx);
        assert_eq!(layer.retract_height2(), 3.0);
        assert!(layer.is_using_tsmc());
    }

    #[test]
    fn modifiers_dispatch_and_reject_document_level_keys() {
        let ctx = ctx();
        let mut layer = Layer::new(8, ctx.settings());
        assert!(layer.set_value_from_modifier_name("LiftSpeed", 60.0, &ctx));
        assert_eq!(layer.lift_speed(), 60.0);
        assert!(!layer.set_value_from_modifier_name("BottomLiftSpeed", 10.0, &ctx));
        assert!(!layer.set_value_from_modifier_name("NoSuchThing", 10.0, &ctx));
        assert!(layer.set_value_from_modifier(PrintParameterModifier::PositionZ, 1.23456, &ctx));
        assert_eq!(layer.position_z(), 1.235);
        let applied = layer.set_values_from_modifiers(
            &[
                (PrintParameterModifier::Normal(LayerParameter::LightPwm), 128.0),
                (PrintParameterModifier::BottomLayerCount, 2.0),
            ],
            &ctx,
        );
        assert_eq!(applied, 1);
        assert_eq!(layer.light_pwm(), 128);
    }

    #[test]
    fn speeds_summary() {
        let ctx = ctx();
        let layer = Layer::new(8, ctx.settings());
        assert_eq!(layer.minimum_speed(), 80.0);
        assert_eq!(layer.maximum_speed(), 300.0);
        assert!(layer.can_expose());
    }

    #[test]
    fn bounding_rect_is_lazy_and_cached() {
        let ctx = ctx();
        let codec = DeflateCodec::default();
        let mut raster = Raster::blank(Size::new(40, 40));
        raster.fill_rect(Rect::new(5, 6, 7, 8), 255);
        let bytes = codec.encode(&raster).unwrap();
        let layer = Layer::from_compressed(0, bytes, ctx.settings());
        assert_eq!(layer.bounding_rect(), Rect::EMPTY);
        assert!(layer.is_empty());
        let rect = layer.get_or_compute_bounding_rect(&codec, false).unwrap();
        assert_eq!(rect, Rect::new(5, 6, 7, 8));
        assert_eq!(layer.non_zero_pixel_count(), 56);
        assert!(!layer.is_empty());
    }

    #[test]
    fn imageless_layer_is_empty_without_decoding() {
        let ctx = ctx();
        let layer = Layer::new(0, ctx.settings());
        let rect = layer
            .get_or_compute_bounding_rect(&DeflateCodec::default(), true)
            .unwrap();
        assert_eq!(rect, Rect::EMPTY);
        assert_eq!(layer.non_zero_pixel_count(), 0);
        assert!(matches!(
            layer.raster(&DeflateCodec::default()),
            Err(LayerError::MissingRaster(0))
        ));
    }

    #[test]
    fn clone_deep_copies_the_buffer() {
        let ctx = ctx();
        let codec = DeflateCodec::default();
        let raster = Raster::blank(Size::new(8, 8));
        let mut original = Layer::from_raster(2, &raster, &codec, ctx.settings()).unwrap();
        original.set_modified(true);
        let original_bytes = original.compressed_bytes().cloned().unwrap();

        let mut copy = original.clone();
        assert!(copy.is_modified());
        assert_ne!(
            copy.compressed_bytes().unwrap().as_ptr(),
            original.compressed_bytes().unwrap().as_ptr()
        );
        let mut lit = raster.clone();
        lit.set(1, 1, 255);
        copy.set_image(&lit, &codec).unwrap();
        assert_eq!(original.compressed_bytes().unwrap(), &original_bytes);
        assert!(!original.same_image(&copy));
    }

    #[test]
    fn print_time_marked_stale_on_parameter_write() {
        use crate::document::StaleFlags;
        use std::sync::Arc;

        let flags = Arc::new(StaleFlags::new());
        let ctx = SliceContext::default().with_hooks(flags.clone());
        let mut layer = Layer::new(5, ctx.settings());
        assert!(!flags.is_print_time_stale());
        layer.set_parameter(LayerParameter::WaitTimeAfterLift, 2.0, &ctx);
        assert!(flags.take_print_time());
        assert!(!flags.is_print_time_stale());
    }
}
