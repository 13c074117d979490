use image::{Rgb, RgbImage};
use lopdf::Document;
use notecraft_export::constants::{REFERENCE_WIDTH_PX, SUPERSAMPLE};
use notecraft_export::paginate::page_count;
use notecraft_export::render::render_pages;
use notecraft_export::*;

fn settings() -> PageSettings {
    PageSettings::default()
}

/// Geometry for content `pages` usable pages tall at the reference width
fn geometry_for(pages: f32) -> PageGeometry {
    let width = REFERENCE_WIDTH_PX as f32;
    let probe = PageGeometry::new(PageFormat::A4, &settings(), width, 0.0, SUPERSAMPLE).unwrap();
    let height = pages * probe.band_css_px();
    PageGeometry::new(PageFormat::A4, &settings(), width, height, SUPERSAMPLE).unwrap()
}

fn patterned_surface(height: u32) -> RasterSurface {
    RasterSurface::new(RgbImage::from_fn(8, height, |x, y| {
        Rgb([(y % 251) as u8, (x * 17) as u8, (y / 251 % 256) as u8])
    }))
}

fn pixel_sum(img: &RgbImage) -> u64 {
    img.as_raw().iter().map(|&b| b as u64).sum()
}

#[test]
fn test_page_count_formula() {
    assert_eq!(page_count(0.0, 267.0), 1);
    assert_eq!(page_count(100.0, 267.0), 1);
    assert_eq!(page_count(267.0, 267.0), 1);
    assert_eq!(page_count(300.0, 267.0), 2);
    assert_eq!(page_count(801.0, 267.0), 3);
    assert_eq!(page_count(801.5, 267.0), 4);
}

#[test]
fn test_scale_uses_printable_width() {
    let geometry = geometry_for(1.0);
    assert_eq!(geometry.usable_width_mm, 180.0);
    assert_eq!(geometry.usable_height_mm, 267.0);
    assert!((geometry.scale - 180.0 / 794.0).abs() < 1e-6);
}

#[test]
fn test_two_point_three_pages_produce_three_slices() {
    let geometry = geometry_for(2.3);
    assert_eq!(geometry.total_pages, 3);

    let raster_height = (geometry.content_height_px * SUPERSAMPLE as f32).ceil() as u32;
    let surface = patterned_surface(raster_height);
    let windows = geometry.slice_windows(surface.height());
    assert_eq!(windows.len(), 3);

    // Contiguous, no overlap, full coverage
    assert_eq!(windows[0].y_start, 0);
    for pair in windows.windows(2) {
        assert_eq!(pair[0].y_end(), pair[1].y_start);
    }
    assert_eq!(windows[2].y_end(), raster_height);

    // Last slice is the fractional remainder
    let band = geometry.band_raster_px();
    assert!((windows[2].height as f64) < band);
    assert!(windows[2].height > 0);
    assert!((windows[0].height as f64 - band).abs() <= 1.0);

    // No content lost across slice boundaries
    let slices: Vec<RgbImage> = windows
        .iter()
        .map(|w| surface.slice(w.y_start, w.height).unwrap())
        .collect();
    let total: u64 = slices.iter().map(pixel_sum).sum();
    assert_eq!(total, pixel_sum(&surface.image));

    let mut rows = Vec::new();
    for slice in &slices {
        rows.extend_from_slice(slice.as_raw());
    }
    assert_eq!(&rows, surface.image.as_raw());
}

#[test]
fn test_short_content_produces_one_page() {
    let geometry = geometry_for(0.1);
    assert_eq!(geometry.total_pages, 1);
    let raster_height = (geometry.content_height_px * SUPERSAMPLE as f32).ceil() as u32;
    let windows = geometry.slice_windows(raster_height);
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].height, raster_height);
}

#[test]
fn test_rendered_document_has_one_page_per_slice() {
    let geometry = geometry_for(2.3);
    let raster_height = (geometry.content_height_px * SUPERSAMPLE as f32).ceil() as u32;
    let surface = patterned_surface(raster_height);

    let pdf = render_pages(&surface, &geometry, true, |_, _| {}).unwrap();
    assert_eq!(pdf.page_count, 3);
    assert!(pdf.bytes.starts_with(b"%PDF-1.7"));

    let doc = Document::load_mem(&pdf.bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 3);
}
