//! Decoded monochrome rasters and the codec seam that turns them into
//! compressed buffers.
//!
//! The layer model never inspects pixels except through [`Raster`] after a
//! decode; how those pixels are packed into bytes is the business of a
//! [`RasterCodec`] implementation.

pub mod codec;

pub use codec::{DeflateCodec, RasterCodec};

/// Re-exported so callers can hand layer masks to other `image` tooling.
pub use image::GrayImage;

use crate::geometry::{Rect, Size};
use crate::layer_error::LayerError;
use image::Luma;

/// An 8-bit single-channel layer mask backed by a [`GrayImage`].
#[derive(Clone, Debug)]
pub struct Raster {
    image: GrayImage,
}

impl Raster {
    /// A raster of the given size with every pixel black.
    pub fn blank(size: Size) -> Self {
        Self {
            image: GrayImage::new(size.width, size.height),
        }
    }

    /// Wraps an existing row-major pixel buffer.
    ///
    /// # Errors
    /// Returns `Err(Codec)` if `data.len()` does not match `size`.
    pub fn from_vec(size: Size, data: Vec<u8>) -> Result<Self, LayerError> {
        let len = data.len();
        GrayImage::from_raw(size.width, size.height, data)
            .filter(|_| len as u64 == size.area())
            .map(Self::from)
            .ok_or_else(|| {
                LayerError::Codec(format!(
                    "raster of {size} needs {} bytes, got {len}",
                    size.area()
                ))
            })
    }

    #[inline]
    pub fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Row-major pixel bytes.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }

    #[inline]
    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    #[inline]
    pub fn into_image(self) -> GrayImage {
        self.image
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        self.image.get_pixel_checked(x, y).map(|p| p.0[0])
    }

    /// Writes one pixel; out-of-range coordinates are ignored.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        if let Some(pixel) = self.image.get_pixel_mut_checked(x, y) {
            *pixel = Luma([value]);
        }
    }

    /// Paints `rect` (clipped to the raster) with `value`.
    pub fn fill_rect(&mut self, rect: Rect, value: u8) {
        let clip = rect.intersect(&Rect::new(
            0,
            0,
            self.width() as i32,
            self.height() as i32,
        ));
        if clip.is_empty() {
            return;
        }
        let (left, right) = (clip.left() as u32, clip.right() as u32);
        let (top, bottom) = (clip.top() as u32, clip.bottom() as u32);
        for (y, row) in self.image.enumerate_rows_mut() {
            if y < top || y >= bottom {
                continue;
            }
            for (x, _, pixel) in row {
                if x >= left && x < right {
                    *pixel = Luma([value]);
                }
            }
        }
    }

    /// Number of pixels with a value above zero.
    pub fn count_non_zero(&self) -> u32 {
        self.image.as_raw().iter().filter(|&&v| v != 0).count() as u32
    }

    /// Tight bounding rect of all non-zero pixels, `EMPTY` for an all-black raster.
    pub fn bounding_rect(&self) -> Rect {
        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);
        for (y, row) in self.image.enumerate_rows() {
            let mut lit = row.filter(|(_, _, p)| p.0[0] != 0).map(|(x, _, _)| x);
            let Some(first) = lit.next() else {
                continue;
            };
            let last = lit.last().unwrap_or(first);
            min_x = min_x.min(first);
            max_x = max_x.max(last);
            min_y = min_y.min(y);
            max_y = y;
        }
        if min_y == u32::MAX {
            return Rect::EMPTY;
        }
        Rect::from_ltrb(
            min_x as i32,
            min_y as i32,
            max_x as i32 + 1,
            max_y as i32 + 1,
        )
    }

    /// Pixel-wise maximum with `other`, written into `self`.
    ///
    /// # Errors
    /// Returns `Err(RasterSizeMismatch)` if the sizes differ.
    pub fn max_in_place(&mut self, other: &Raster) -> Result<(), LayerError> {
        if self.image.dimensions() != other.image.dimensions() {
            return Err(LayerError::RasterSizeMismatch {
                expected_width: self.width(),
                expected_height: self.height(),
                found_width: other.width(),
                found_height: other.height(),
            });
        }
        for (a, b) in self.image.pixels_mut().zip(other.image.pixels()) {
            a.0[0] = a.0[0].max(b.0[0]);
        }
        Ok(())
    }
}

impl From<GrayImage> for Raster {
    fn from(image: GrayImage) -> Self {
        Self { image }
    }
}

impl PartialEq for Raster {
    fn eq(&self, other: &Self) -> bool {
        self.image.dimensions() == other.image.dimensions()
            && self.image.as_raw() == other.image.as_raw()
    }
}

impl Eq for Raster {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_raster_has_no_bounds() {
        let r = Raster::blank(Size::new(16, 8));
        assert_eq!(r.count_non_zero(), 0);
        assert_eq!(r.bounding_rect(), Rect::EMPTY);
    }

    #[test]
    fn fill_rect_sets_tight_bounds() {
        let mut r = Raster::blank(Size::new(64, 64));
        r.fill_rect(Rect::new(10, 20, 10, 10), 255);
        assert_eq!(r.count_non_zero(), 100);
        assert_eq!(r.bounding_rect(), Rect::new(10, 20, 10, 10));
    }

    #[test]
    fn fill_rect_is_clipped() {
        let mut r = Raster::blank(Size::new(8, 8));
        r.fill_rect(Rect::new(6, 6, 10, 10), 1);
        assert_eq!(r.count_non_zero(), 4);
        assert_eq!(r.bounding_rect(), Rect::new(6, 6, 2, 2));
    }

    #[test]
    fn max_in_place_merges_masks() {
        let mut a = Raster::blank(Size::new(8, 8));
        let mut b = Raster::blank(Size::new(8, 8));
        a.set(1, 1, 200);
        b.set(6, 6, 100);
        a.max_in_place(&b).unwrap();
        assert_eq!(a.bounding_rect(), Rect::new(1, 1, 6, 6));
        assert!(a.max_in_place(&Raster::blank(Size::new(4, 4))).is_err());
    }

    #[test]
    fn wraps_gray_images_without_copying_layout() {
        let image = GrayImage::from_fn(4, 3, |x, y| Luma([if x == 2 && y == 1 { 9 } else { 0 }]));
        let raster = Raster::from(image.clone());
        assert_eq!(raster.size(), Size::new(4, 3));
        assert_eq!(raster.get(2, 1), Some(9));
        assert_eq!(raster.get(4, 0), None);
        assert_eq!(raster.bounding_rect(), Rect::new(2, 1, 1, 1));
        assert_eq!(raster.pixels()[4 + 2], 9);
        assert_eq!(raster.into_image(), image);
    }

    #[test]
    fn from_vec_rejects_wrong_length() {
        assert!(matches!(
            Raster::from_vec(Size::new(4, 4), vec![0; 15]),
            Err(LayerError::Codec(_))
        ));
        assert!(Raster::from_vec(Size::new(4, 4), vec![0; 16]).is_ok());
    }
}
