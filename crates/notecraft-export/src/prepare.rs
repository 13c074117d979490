//! Content preparation: a detached, print-styled clone of the source content

use crate::constants::PROXY_IMAGE_PATH;
use crate::dom::{Element, Node};
use crate::session::ImageRewriteCache;
use crate::types::{ExportError, PageSettings, Result};

/// Class of the zero-height marker inserted before major headings
pub const PAGE_BREAK_CLASS: &str = "page-break";

/// Print styles derived from the page settings.
///
/// Sizes are in points, margins in `em` of the element's own font size.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintStylesheet {
    pub body_font_pt: f32,
    pub line_spacing: f32,
    /// Heading sizes for `h1`, `h2`, `h3`
    pub heading_font_pt: [f32; 3],
    /// (top, bottom) margins for `h1`, `h2`, `h3`
    pub heading_margins_em: [(f32, f32); 3],
    /// Top and bottom margin of paragraphs, list items, quotes and cells
    pub block_margin_em: f32,
    /// Vertical margin of lists
    pub list_margin_em: f32,
}

impl PrintStylesheet {
    pub fn from_settings(settings: &PageSettings) -> Self {
        let base = settings.font_size as f32;
        Self {
            body_font_pt: base,
            line_spacing: settings.line_spacing,
            heading_font_pt: [base * 2.0, base * 3.0 / 2.0, base * 6.0 / 5.0],
            heading_margins_em: [(1.0, 0.8), (0.9, 0.7), (0.8, 0.6)],
            block_margin_em: 0.5,
            list_margin_em: 0.7,
        }
    }

    pub fn to_css(&self) -> String {
        let [h1, h2, h3] = self.heading_font_pt;
        let [(h1t, h1b), (h2t, h2b), (h3t, h3b)] = self.heading_margins_em;
        format!(
            r#"
    * {{
      font-family: 'Helvetica', Arial, sans-serif;
      box-sizing: border-box;
    }}
    body, html {{
      margin: 0;
      padding: 0;
    }}
    p, li, blockquote, table td, table th {{
      line-height: {spacing} !important;
      font-size: {base}pt !important;
      margin-bottom: {block}em !important;
      margin-top: {block}em !important;
    }}
    h1 {{ font-size: {h1}pt !important; margin: {h1t}em 0 {h1b}em !important; page-break-after: avoid !important; }}
    h2 {{ font-size: {h2}pt !important; margin: {h2t}em 0 {h2b}em !important; page-break-after: avoid !important; }}
    h3 {{ font-size: {h3}pt !important; margin: {h3t}em 0 {h3b}em !important; page-break-after: avoid !important; }}
    pre, code {{ page-break-inside: avoid; }}
    img {{ page-break-inside: avoid; max-width: 100%; height: auto; }}
    ul, ol {{ padding-left: 20px !important; margin: {list}em 0 !important; }}
    table {{ page-break-inside: avoid; }}
    .{page_break} {{ page-break-after: always; height: 0; }}
  "#,
            spacing = self.line_spacing,
            base = self.body_font_pt,
            block = self.block_margin_em,
            list = self.list_margin_em,
            page_break = PAGE_BREAK_CLASS,
        )
    }
}

/// Detached clone of the source content, ready for layout
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    /// Container holding the content clone followed by the `<style>` element
    pub root: Element,
    pub stylesheet: PrintStylesheet,
}

impl PreparedDocument {
    pub fn images(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        self.root.descendants_by_tag("img", &mut out);
        out
    }
}

/// Build the print-ready clone of `source`.
///
/// The source is never modified. Image sources not seen before by `cache`
/// are redirected through `{proxy_base}/proxy-image/`.
pub fn prepare_for_export(
    source: &Element,
    settings: &PageSettings,
    cache: &ImageRewriteCache,
    proxy_base: &str,
) -> Result<PreparedDocument> {
    if source.is_blank() {
        return Err(ExportError::Preparation(
            "source content is empty".to_string(),
        ));
    }

    let mut content = source.clone();
    strip_interactivity(&mut content);

    let stylesheet = PrintStylesheet::from_settings(settings);

    if settings.page_breaks {
        insert_page_breaks(&mut content);
    }

    let (rewritten, skipped) = rewrite_images(&mut content, cache, proxy_base);
    log::debug!("Processed {rewritten} new images, skipped {skipped} already processed images");

    let mut root = Element::new("div").with_child(content);
    root.children.push(Node::Element(
        Element::new("style").with_text(stylesheet.to_css()),
    ));

    Ok(PreparedDocument { root, stylesheet })
}

/// Build the proxied URL for an image source
pub fn proxy_url(proxy_base: &str, src: &str) -> String {
    format!(
        "{}{}?url={}",
        proxy_base.trim_end_matches('/'),
        PROXY_IMAGE_PATH,
        urlencoding::encode(src)
    )
}

fn strip_interactivity(root: &mut Element) {
    fn strip(el: &mut Element) {
        el.children
            .retain(|child| !matches!(child, Node::Element(e) if e.is("script")));
        el.attrs
            .retain(|(k, _)| k != "contenteditable" && !k.starts_with("on"));
        for child in &mut el.children {
            if let Node::Element(child) = child {
                strip(child);
            }
        }
    }
    strip(root);
}

/// Insert a marker before every `h1`/`h2` except the first in document order
fn insert_page_breaks(root: &mut Element) {
    fn walk(el: &mut Element, seen: &mut usize) {
        let children = std::mem::take(&mut el.children);
        let mut out = Vec::with_capacity(children.len());
        for mut child in children {
            if let Node::Element(child_el) = &mut child {
                if child_el.is("h1") || child_el.is("h2") {
                    if *seen > 0 {
                        out.push(Node::Element(
                            Element::new("div").with_attr("class", PAGE_BREAK_CLASS),
                        ));
                    }
                    *seen += 1;
                }
                walk(child_el, seen);
            }
            out.push(child);
        }
        el.children = out;
    }

    let mut seen = 0;
    walk(root, &mut seen);
}

fn rewrite_images(root: &mut Element, cache: &ImageRewriteCache, proxy_base: &str) -> (usize, usize) {
    let mut rewritten = 0;
    let mut skipped = 0;

    let mut visit = |img: &mut Element| {
        if !img.is("img") {
            return;
        }

        let id = match img.attr("src") {
            Some(src) => src.to_string(),
            None => img.outer_html(),
        };
        if !cache.insert(&id) {
            skipped += 1;
            return;
        }
        rewritten += 1;

        if let Some(src) = img.attr("src") {
            if !src.starts_with("data:") {
                let proxied = proxy_url(proxy_base, src);
                img.set_attr("src", proxied);
            }
        }

        if let Some((width, height)) = img.measured {
            if !img.has_attr("width") && width > 0 {
                img.set_attr("width", width.to_string());
            }
            if !img.has_attr("height") && height > 0 {
                img.set_attr("height", height.to_string());
            }
        }
    };

    if root.is("img") {
        visit(root);
    }
    root.for_each_descendant_mut(&mut visit);

    (rewritten, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> PageSettings {
        PageSettings::default()
    }

    #[test]
    fn stylesheet_scales_headings_from_base_size() {
        let css = PrintStylesheet::from_settings(&PageSettings {
            font_size: 10,
            line_spacing: 2.0,
            ..settings()
        })
        .to_css();
        assert!(css.contains("line-height: 2 !important"));
        assert!(css.contains("font-size: 10pt !important"));
        assert!(css.contains("h1 { font-size: 20pt"));
        assert!(css.contains("h2 { font-size: 15pt"));
        assert!(css.contains("h3 { font-size: 12pt"));
        assert!(css.contains(".page-break { page-break-after: always; height: 0; }"));
    }

    #[test]
    fn proxy_url_percent_encodes_source() {
        assert_eq!(
            proxy_url("http://localhost:8000/", "https://x.io/a b.png?s=1&t=2"),
            "http://localhost:8000/proxy-image/?url=https%3A%2F%2Fx.io%2Fa%20b.png%3Fs%3D1%26t%3D2"
        );
    }

    #[test]
    fn interactivity_is_stripped() {
        let source = Element::new("div")
            .with_attr("contenteditable", "true")
            .with_child(Element::new("script").with_text("alert(1)"))
            .with_child(Element::new("p").with_attr("onclick", "x()").with_text("hi"));
        let prepared =
            prepare_for_export(&source, &settings(), &ImageRewriteCache::new(), "http://h").unwrap();
        let html = prepared.root.outer_html();
        assert!(!html.contains("script"));
        assert!(!html.contains("onclick"));
        assert!(!html.contains("contenteditable"));
        assert!(html.contains("<p>hi</p>"));
    }
}
