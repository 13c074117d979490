use crate::constants::HELVETICA_CHAR_WIDTH_RATIO;
use crate::fonts::FontBook;
use crate::images::ImageSet;
use crate::layout::{LayoutItem, LayoutTree};
use crate::types::{ExportError, Result};
use image::imageops::FilterType;
use image::{RgbImage, RgbaImage};
use tiny_skia::{
    Color, FillRule, IntSize, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Rect, Transform,
};
use ttf_parser::{Face, OutlineBuilder};

/// Paint `layout` on a white background at `scale` raster pixels per CSS pixel
pub(super) fn paint(
    layout: &LayoutTree,
    images: &ImageSet,
    fonts: &FontBook,
    scale: u32,
) -> Result<RgbImage> {
    let factor = scale as f32;
    let width = ((layout.width * factor).ceil() as u32).max(1);
    let height = ((layout.height * factor).ceil() as u32).max(1);
    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
        ExportError::Raster(format!("cannot allocate a {width}x{height} raster"))
    })?;
    pixmap.fill(Color::WHITE);

    let transform = Transform::from_scale(factor, factor);
    let regular = fonts
        .face_data(false)
        .and_then(|data| Face::parse(data, 0).ok());
    let bold = fonts
        .face_data(true)
        .and_then(|data| Face::parse(data, 0).ok());

    let mut skipped_images = 0usize;
    for item in &layout.items {
        match item {
            LayoutItem::Rect {
                x,
                y,
                width,
                height,
                color,
            } => {
                if let Some(rect) = Rect::from_xywh(*x, *y, *width, *height) {
                    pixmap.fill_rect(rect, &solid(*color), transform, None);
                }
            }
            LayoutItem::Image {
                x,
                y,
                width,
                height,
                src,
            } => match images.get(src) {
                Some(img) => draw_image(&mut pixmap, img, *x, *y, *width, *height, factor),
                None => skipped_images += 1,
            },
            LayoutItem::Text {
                x,
                baseline,
                size,
                bold: is_bold,
                color,
                text,
            } => {
                let face = if *is_bold { bold.as_ref() } else { regular.as_ref() };
                if let Some(face) = face {
                    draw_text(&mut pixmap, face, *x, *baseline, *size, *color, text, transform);
                }
            }
        }
    }

    if skipped_images > 0 {
        log::debug!("{skipped_images} image boxes left blank");
    }

    to_rgb(&pixmap)
}

fn solid(color: [u8; 3]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], 255);
    paint.anti_alias = true;
    paint
}

#[allow(clippy::too_many_arguments)]
fn draw_text(
    pixmap: &mut Pixmap,
    face: &Face<'_>,
    x: f32,
    baseline: f32,
    size: f32,
    color: [u8; 3],
    text: &str,
    transform: Transform,
) {
    let units = face.units_per_em() as f32;
    if units <= 0.0 || size <= 0.0 {
        return;
    }
    let font_scale = size / units;
    let paint = solid(color);

    let mut pen = x;
    for ch in text.chars() {
        let Some(glyph) = face.glyph_index(ch) else {
            pen += size * HELVETICA_CHAR_WIDTH_RATIO;
            continue;
        };

        let mut builder = GlyphPathBuilder::new(pen, baseline, font_scale);
        if face.outline_glyph(glyph, &mut builder).is_some() {
            if let Some(path) = builder.finish() {
                pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
            }
        }

        pen += face
            .glyph_hor_advance(glyph)
            .map(|adv| adv as f32 * font_scale)
            .unwrap_or(size * HELVETICA_CHAR_WIDTH_RATIO);
    }
}

fn draw_image(
    pixmap: &mut Pixmap,
    img: &RgbaImage,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    factor: f32,
) {
    let target_w = (width * factor).round() as u32;
    let target_h = (height * factor).round() as u32;
    if target_w == 0 || target_h == 0 || img.width() == 0 || img.height() == 0 {
        return;
    }

    let resized = image::imageops::resize(img, target_w, target_h, FilterType::Triangle);
    let Some(source) = premultiplied_pixmap(&resized) else {
        return;
    };
    pixmap.draw_pixmap(
        (x * factor).round() as i32,
        (y * factor).round() as i32,
        source.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
}

fn premultiplied_pixmap(img: &RgbaImage) -> Option<Pixmap> {
    let size = IntSize::from_wh(img.width(), img.height())?;
    let mut data = img.as_raw().clone();
    for px in data.chunks_exact_mut(4) {
        let alpha = px[3] as u16;
        for channel in &mut px[..3] {
            *channel = ((*channel as u16 * alpha + 127) / 255) as u8;
        }
    }
    Pixmap::from_vec(data, size)
}

/// The background is opaque, so premultiplied channels are the final color
fn to_rgb(pixmap: &Pixmap) -> Result<RgbImage> {
    let rgb: Vec<u8> = pixmap
        .data()
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();
    RgbImage::from_raw(pixmap.width(), pixmap.height(), rgb)
        .ok_or_else(|| ExportError::Raster("raster buffer size mismatch".to_string()))
}

/// Glyph outline sink; font units are y-up, the raster is y-down
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    baseline: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, baseline: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            baseline,
            scale,
        }
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }

    fn point(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.baseline - y * self.scale)
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.point(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.point(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.point(x1, y1);
        let (x, y) = self.point(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.point(x1, y1);
        let (x2, y2) = self.point(x2, y2);
        let (x, y) = self.point(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn rects_are_painted_at_supersampled_coordinates() {
        let layout = LayoutTree {
            width: 4.0,
            height: 4.0,
            items: vec![LayoutItem::Rect {
                x: 1.0,
                y: 1.0,
                width: 2.0,
                height: 2.0,
                color: [255, 0, 0],
            }],
        };
        let img = paint(&layout, &ImageSet::default(), &FontBook::empty(), 2).unwrap();
        assert_eq!((img.width(), img.height()), (8, 8));
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(img.get_pixel(3, 3).0, [255, 0, 0]);
        assert_eq!(img.get_pixel(6, 6).0, [255, 255, 255]);
    }

    #[test]
    fn loaded_images_are_composited_and_failed_ones_left_blank() {
        let mut images = ImageSet::default();
        images.insert_loaded("ok.png", RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255])));
        images.insert_failed("bad.png");
        let layout = LayoutTree {
            width: 4.0,
            height: 2.0,
            items: vec![
                LayoutItem::Image {
                    x: 0.0,
                    y: 0.0,
                    width: 2.0,
                    height: 2.0,
                    src: "ok.png".to_string(),
                },
                LayoutItem::Image {
                    x: 2.0,
                    y: 0.0,
                    width: 2.0,
                    height: 2.0,
                    src: "bad.png".to_string(),
                },
            ],
        };
        let img = paint(&layout, &images, &FontBook::empty(), 1).unwrap();
        assert_eq!(img.get_pixel(1, 1).0, [0, 0, 255]);
        assert_eq!(img.get_pixel(3, 1).0, [255, 255, 255]);
    }
}
