//! PDF output: one image slice per A4 page plus an optional caption

use crate::constants::{
    HELVETICA_CHAR_WIDTH_RATIO, PAGE_NUMBER_FONT_SIZE, PAGE_NUMBER_GRAY, PAGE_NUMBER_OFFSET_MM,
    mm_to_pt,
};
use crate::paginate::{PageGeometry, SliceWindow};
use crate::raster::RasterSurface;
use crate::types::Result;
use image::RgbImage;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Finalized PDF bytes
#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

/// Slice `surface` into pages and write them out.
///
/// `on_page` is called with `(page_number, total_pages)` after each page.
pub fn render_pages(
    surface: &RasterSurface,
    geometry: &PageGeometry,
    show_page_numbers: bool,
    mut on_page: impl FnMut(usize, usize),
) -> Result<RenderedPdf> {
    let mut writer = PdfPageWriter::new(*geometry, show_page_numbers);
    let windows = geometry.slice_windows(surface.height());

    for window in &windows {
        let slice = surface.slice(window.y_start, window.height);
        if slice.is_none() {
            log::error!(
                "Page {}: empty slice window at row {} of {}; emitting page without content",
                window.page_index + 1,
                window.y_start,
                surface.height()
            );
        }
        // The slice buffer is consumed by the page and never reused
        writer.add_page(window, slice);
        on_page(window.page_index + 1, geometry.total_pages);
    }

    writer.finish()
}

/// Incrementally builds the output document, one page at a time
pub struct PdfPageWriter {
    doc: Document,
    pages_id: ObjectId,
    font_id: Option<ObjectId>,
    page_refs: Vec<Object>,
    geometry: PageGeometry,
    show_page_numbers: bool,
}

impl PdfPageWriter {
    pub fn new(geometry: PageGeometry, show_page_numbers: bool) -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let font_id = show_page_numbers.then(|| {
            let mut font_dict = Dictionary::new();
            font_dict.set("Type", Object::Name(b"Font".to_vec()));
            font_dict.set("Subtype", Object::Name(b"Type1".to_vec()));
            font_dict.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
            doc.add_object(font_dict)
        });

        Self {
            doc,
            pages_id,
            font_id,
            page_refs: Vec::new(),
            geometry,
            show_page_numbers,
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_refs.len()
    }

    /// Append the page for `window`; `slice` is `None` for an empty window
    pub fn add_page(&mut self, window: &SliceWindow, slice: Option<RgbImage>) {
        let page_width_pt = mm_to_pt(self.geometry.format.width_mm);
        let page_height_pt = mm_to_pt(self.geometry.format.height_mm);

        let mut page_dict = Dictionary::new();
        page_dict.set("Type", Object::Name(b"Page".to_vec()));
        page_dict.set("Parent", Object::Reference(self.pages_id));
        page_dict.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(page_width_pt),
                Object::Real(page_height_pt),
            ]),
        );

        let mut content_ops = Vec::new();
        let mut resources = Dictionary::new();

        if let Some(slice) = slice {
            let rows = slice.height();
            let image_id = self.doc.add_object(image_xobject(slice));

            let margin_pt = mm_to_pt(self.geometry.margins_mm);
            let width_pt = mm_to_pt(self.geometry.usable_width_mm);
            let height_pt = mm_to_pt(self.geometry.slice_height_mm(rows));
            // Top edge at the margin, measured from the top of the page
            let y = page_height_pt - margin_pt - height_pt;
            content_ops.push(format!(
                "q {} 0 0 {} {} {} cm /Im1 Do Q\n",
                width_pt, height_pt, margin_pt, y
            ));

            let mut xobjects = Dictionary::new();
            xobjects.set("Im1", Object::Reference(image_id));
            resources.set("XObject", Object::Dictionary(xobjects));
        }

        if let (true, Some(font_id)) = (self.show_page_numbers, self.font_id) {
            content_ops.push(page_number_ops(
                window.page_index + 1,
                self.geometry.total_pages,
                page_width_pt,
            ));
            let mut fonts = Dictionary::new();
            fonts.set("F1", Object::Reference(font_id));
            resources.set("Font", Object::Dictionary(fonts));
        }

        let content = content_ops.join("");
        let content_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        page_dict.set("Contents", Object::Reference(content_id));
        page_dict.set("Resources", Object::Dictionary(resources));

        let page_id = self.doc.add_object(page_dict);
        self.page_refs.push(Object::Reference(page_id));
    }

    /// Close the page tree and serialize
    pub fn finish(mut self) -> Result<RenderedPdf> {
        let page_count = self.page_refs.len();
        let pages_dict = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(self.page_refs)),
            ("Count", Object::Integer(page_count as i64)),
        ]);
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages_dict));

        let catalog_id = self.doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]));
        self.doc.trailer.set("Root", catalog_id);

        self.doc.compress();
        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes)?;

        log::debug!("Wrote {page_count} pages ({} bytes)", bytes.len());
        Ok(RenderedPdf { bytes, page_count })
    }
}

fn image_xobject(slice: RgbImage) -> Stream {
    let dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"XObject".to_vec())),
        ("Subtype", Object::Name(b"Image".to_vec())),
        ("Width", Object::Integer(slice.width() as i64)),
        ("Height", Object::Integer(slice.height() as i64)),
        ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
        ("BitsPerComponent", Object::Integer(8)),
    ]);
    Stream::new(dict, slice.into_raw())
}

/// Centered "Page X of N" caption near the bottom edge
fn page_number_ops(page: usize, total: usize, page_width_pt: f32) -> String {
    let text = format!("Page {page} of {total}");
    let text_width = helvetica_width(&text, PAGE_NUMBER_FONT_SIZE);
    let x = page_width_pt / 2.0 - text_width / 2.0;
    let y = mm_to_pt(PAGE_NUMBER_OFFSET_MM);
    let gray = PAGE_NUMBER_GRAY as f32 / 255.0;
    format!(
        "q {:.3} g BT /F1 {} Tf {} {} Td ({}) Tj ET Q\n",
        gray, PAGE_NUMBER_FONT_SIZE, x, y, text
    )
}

/// Advance of `text` in the standard Helvetica face, in points
fn helvetica_width(text: &str, size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| match c {
            ' ' | 'f' | 'i' | 'j' | 'l' | 't' | 'I' => 278,
            'r' => 333,
            'c' | 'k' | 's' | 'v' | 'x' | 'y' | 'z' | 'J' => 500,
            'm' => 833,
            'w' | 'C' | 'D' | 'H' | 'N' | 'R' | 'U' => 722,
            'A' | 'B' | 'E' | 'K' | 'P' | 'S' | 'V' | 'X' | 'Y' => 667,
            'F' | 'T' | 'Z' => 611,
            'G' | 'O' | 'Q' => 778,
            'L' => 556,
            'M' => 833,
            'W' => 944,
            '0'..='9' => 556,
            c if c.is_ascii_lowercase() => 556,
            _ => (HELVETICA_CHAR_WIDTH_RATIO * 1000.0) as u32,
        })
        .sum();
    units as f32 * size / 1000.0
}
