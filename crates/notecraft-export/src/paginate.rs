//! Page geometry: how a measured content box maps onto fixed-size pages

use crate::types::{ExportError, PageFormat, PageSettings, Result};

/// Vertical window of one page in raster pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceWindow {
    pub page_index: usize,
    pub y_start: u32,
    pub height: u32,
}

impl SliceWindow {
    pub fn y_end(&self) -> u32 {
        self.y_start + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0
    }
}

/// Scale and page count for one measured document
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub format: PageFormat,
    pub margins_mm: f32,
    /// Millimeters per CSS pixel
    pub scale: f32,
    pub usable_width_mm: f32,
    pub usable_height_mm: f32,
    pub content_height_px: f32,
    pub total_pages: usize,
    /// Raster pixels per CSS pixel
    pub supersample: u32,
}

impl PageGeometry {
    pub fn new(
        format: PageFormat,
        settings: &PageSettings,
        content_width_px: f32,
        content_height_px: f32,
        supersample: u32,
    ) -> Result<Self> {
        if !(content_width_px.is_finite() && content_width_px > 0.0) {
            return Err(ExportError::Raster(format!(
                "content has no measurable width ({content_width_px})"
            )));
        }
        if !(content_height_px.is_finite() && content_height_px >= 0.0) {
            return Err(ExportError::Raster(format!(
                "content has no measurable height ({content_height_px})"
            )));
        }

        let usable_width_mm = format.width_mm - 2.0 * settings.margins;
        let usable_height_mm = format.height_mm - 2.0 * settings.margins;
        if usable_width_mm <= 0.0 || usable_height_mm <= 0.0 {
            return Err(ExportError::Config(format!(
                "Margins of {}mm leave no printable area",
                settings.margins
            )));
        }

        let scale = usable_width_mm / content_width_px;
        let total_pages = page_count(content_height_px * scale, usable_height_mm);

        Ok(Self {
            format,
            margins_mm: settings.margins,
            scale,
            usable_width_mm,
            usable_height_mm,
            content_height_px,
            total_pages,
            supersample: supersample.max(1),
        })
    }

    /// Content height once scaled onto the page, in millimeters
    pub fn scaled_content_height_mm(&self) -> f32 {
        self.content_height_px * self.scale
    }

    /// Height of one page band in CSS pixels
    pub fn band_css_px(&self) -> f32 {
        self.usable_height_mm / self.scale
    }

    /// Height of one page band in raster pixels
    pub fn band_raster_px(&self) -> f64 {
        self.usable_height_mm as f64 / self.scale as f64 * self.supersample as f64
    }

    /// Height on the page of `rows` raster rows, in millimeters
    pub fn slice_height_mm(&self, rows: u32) -> f32 {
        rows as f32 / self.supersample as f32 * self.scale
    }

    /// Page windows over a raster of `raster_height` rows.
    ///
    /// Windows are contiguous and cover `[0, raster_height)`; the last one
    /// ends at the raster height. A window starting past the raster is empty.
    pub fn slice_windows(&self, raster_height: u32) -> Vec<SliceWindow> {
        let band = self.band_raster_px();
        let boundary = |p: usize| ((p as f64 * band).floor() as u32).min(raster_height);

        (0..self.total_pages)
            .map(|page_index| {
                let y_start = boundary(page_index);
                let y_end = if page_index + 1 == self.total_pages {
                    raster_height
                } else {
                    boundary(page_index + 1)
                };
                SliceWindow {
                    page_index,
                    y_start,
                    height: y_end.saturating_sub(y_start),
                }
            })
            .collect()
    }
}

/// `ceil(scaled / usable)`, never less than one page
pub fn page_count(scaled_height_mm: f32, usable_height_mm: f32) -> usize {
    if usable_height_mm <= 0.0 || !scaled_height_mm.is_finite() {
        return 1;
    }
    ((scaled_height_mm / usable_height_mm).ceil() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a4(margins: f32) -> PageSettings {
        PageSettings {
            margins,
            ..Default::default()
        }
    }

    #[test]
    fn scale_maps_content_width_to_usable_width() {
        let geometry = PageGeometry::new(PageFormat::A4, &a4(15.0), 900.0, 100.0, 2).unwrap();
        assert_eq!(geometry.usable_width_mm, 180.0);
        assert_eq!(geometry.usable_height_mm, 267.0);
        assert_eq!(geometry.scale, 0.2);
        assert_eq!(geometry.total_pages, 1);
    }

    #[test]
    fn short_content_still_gets_one_page() {
        assert_eq!(page_count(0.0, 267.0), 1);
        assert_eq!(page_count(1.0, 267.0), 1);
        assert_eq!(page_count(267.0, 267.0), 1);
        assert_eq!(page_count(267.5, 267.0), 2);
    }

    #[test]
    fn zero_width_content_is_rejected() {
        assert!(PageGeometry::new(PageFormat::A4, &a4(15.0), 0.0, 100.0, 2).is_err());
    }

    #[test]
    fn windows_past_the_raster_are_empty() {
        let geometry = PageGeometry::new(PageFormat::A4, &a4(0.0), 210.0, 600.0, 1).unwrap();
        assert_eq!(geometry.total_pages, 3);
        let windows = geometry.slice_windows(300);
        assert_eq!(windows[0].height, 297);
        assert_eq!(windows[1].height, 3);
        assert!(windows[2].is_empty());
    }
}
