//! Off-screen block layout of prepared content
//!
//! Positions are CSS pixels with the origin at the top-left of the content
//! box and y growing downwards.

mod flow;
mod style;

pub use flow::layout_document;
pub use style::TextStyle;

/// Off-screen mount the content is laid out in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width_px: f32,
    /// Height of one page band in CSS pixels; page-break markers advance
    /// to the next multiple of it
    pub page_band_px: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutItem {
    Text {
        x: f32,
        baseline: f32,
        size: f32,
        bold: bool,
        color: [u8; 3],
        text: String,
    },
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        src: String,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: [u8; 3],
    },
}

/// Laid-out content and its measured box
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutTree {
    pub width: f32,
    pub height: f32,
    pub items: Vec<LayoutItem>,
}

impl LayoutTree {
    /// A tree with a measured box but nothing to paint
    pub fn blank(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            items: Vec::new(),
        }
    }

    pub fn images(&self) -> impl Iterator<Item = &LayoutItem> {
        self.items
            .iter()
            .filter(|item| matches!(item, LayoutItem::Image { .. }))
    }
}
