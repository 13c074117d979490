//! Off-screen mount and supersampled rasterization of laid-out content

mod paint;

use crate::fonts::FontBook;
use crate::images::ImageSet;
use crate::layout::{LayoutTree, Viewport, layout_document};
use crate::prepare::PreparedDocument;
use crate::types::{ExportError, Result};
use async_trait::async_trait;
use image::RgbImage;

/// Turns prepared content into a single full-height bitmap
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Lay the content out in the off-screen mount and measure it
    fn mount(
        &self,
        doc: &PreparedDocument,
        images: &ImageSet,
        viewport: &Viewport,
    ) -> Result<LayoutTree>;

    /// Paint the laid-out content at `supersample` raster pixels per CSS pixel
    async fn rasterize(
        &self,
        layout: &LayoutTree,
        images: &ImageSet,
        supersample: u32,
    ) -> Result<RasterSurface>;
}

/// Full-height RGB raster of the content
#[derive(Debug, Clone)]
pub struct RasterSurface {
    pub image: RgbImage,
}

impl RasterSurface {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Copy rows `[y_start, y_start + height)` into their own buffer.
    ///
    /// The window is clipped to the surface; `None` if nothing is left.
    pub fn slice(&self, y_start: u32, height: u32) -> Option<RgbImage> {
        let end = y_start.saturating_add(height).min(self.height());
        if y_start >= end || self.width() == 0 {
            return None;
        }
        let rows = end - y_start;
        Some(image::imageops::crop_imm(&self.image, 0, y_start, self.width(), rows).to_image())
    }
}

/// Built-in rasterizer: block layout with system fonts, painted with tiny-skia
#[derive(Debug, Clone, Default)]
pub struct HtmlRasterizer {
    fonts: FontBook,
}

impl HtmlRasterizer {
    pub fn new(fonts: FontBook) -> Self {
        Self { fonts }
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }
}

#[async_trait]
impl Rasterizer for HtmlRasterizer {
    fn mount(
        &self,
        doc: &PreparedDocument,
        images: &ImageSet,
        viewport: &Viewport,
    ) -> Result<LayoutTree> {
        if !(viewport.width_px.is_finite() && viewport.width_px > 0.0) {
            return Err(ExportError::Raster(format!(
                "invalid mount width {}",
                viewport.width_px
            )));
        }
        Ok(layout_document(doc, images, &self.fonts, viewport))
    }

    async fn rasterize(
        &self,
        layout: &LayoutTree,
        images: &ImageSet,
        supersample: u32,
    ) -> Result<RasterSurface> {
        let layout = layout.clone();
        let images = images.clone();
        let fonts = self.fonts.clone();
        let image = tokio::task::spawn_blocking(move || {
            paint::paint(&layout, &images, &fonts, supersample.max(1))
        })
        .await??;
        Ok(RasterSurface::new(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_is_clipped_to_surface() {
        let surface = RasterSurface::new(RgbImage::new(4, 10));
        assert_eq!(surface.slice(0, 4).map(|s| s.height()), Some(4));
        assert_eq!(surface.slice(8, 4).map(|s| s.height()), Some(2));
        assert!(surface.slice(10, 4).is_none());
        assert!(surface.slice(3, 0).is_none());
    }
}
