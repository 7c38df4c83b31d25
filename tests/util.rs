#![allow(dead_code)]
use std::sync::Arc;

use resin_layers::{
    document::{PrintSettings, SliceContext, StaleFlags},
    geometry::{Rect, Size},
    layers::LayerStack,
    raster::{DeflateCodec, Raster, RasterCodec},
};

pub const RESOLUTION: Size = Size::new(64, 48);

pub fn codec() -> Arc<dyn RasterCodec> {
    Arc::new(DeflateCodec::default())
}

/// Default settings with a known resolution.
pub fn settings() -> PrintSettings {
    PrintSettings {
        resolution: RESOLUTION,
        ..PrintSettings::default()
    }
}

pub fn empty_stack() -> LayerStack {
    LayerStack::new(SliceContext::new(settings()), codec())
}

/// Empty stack whose hooks latch into the returned flags.
pub fn stack_with_flags() -> (LayerStack, Arc<StaleFlags>) {
    let flags = Arc::new(StaleFlags::new());
    let stack = empty_stack().with_hooks(flags.clone());
    (stack, flags)
}

/// Black raster with `rect` painted white.
pub fn raster_with(rect: Rect) -> Raster {
    let mut raster = Raster::blank(RESOLUTION);
    raster.fill_rect(rect, 255);
    raster
}

/// A stack with one layer per entry; `None` is an all-black layer.
pub fn stack_from_rects(rects: &[Option<Rect>]) -> LayerStack {
    let rasters: Vec<Raster> = rects
        .iter()
        .map(|r| r.map_or_else(|| Raster::blank(RESOLUTION), raster_with))
        .collect();
    let mut stack = empty_stack();
    stack.allocate_from_rasters(&rasters).unwrap();
    stack
}

/// Panics unless every slot is stamped with its own index and owned by `stack`.
pub fn assert_stamped(stack: &LayerStack) {
    for (i, slot) in stack.slots().iter().enumerate() {
        if let Some(layer) = slot {
            assert_eq!(layer.index() as usize, i, "slot {i} carries a stale index");
            assert_eq!(layer.owner(), Some(stack.id()), "slot {i} has a foreign owner");
        }
    }
}
