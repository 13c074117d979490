//! Block and inline flow

use super::style::{BlockKind, TextStyle, block_style, cell_style, is_block, is_hidden};
use super::{LayoutItem, LayoutTree, Viewport};
use crate::dom::{Element, Node};
use crate::fonts::FontBook;
use crate::images::ImageSet;
use crate::prepare::{PAGE_BREAK_CLASS, PreparedDocument, PrintStylesheet};

const RULE_COLOR: [u8; 3] = [209, 213, 219];
const CODE_BACKGROUND: [u8; 3] = [243, 244, 246];
const QUOTE_BAR_WIDTH: f32 = 3.0;
const PRE_PADDING: f32 = 8.0;
const CELL_PADDING: f32 = 4.0;
const MARKER_GAP: f32 = 6.0;

/// Lay out a prepared document in the viewport
pub fn layout_document(
    doc: &PreparedDocument,
    images: &ImageSet,
    fonts: &FontBook,
    viewport: &Viewport,
) -> LayoutTree {
    let mut flow = Flow {
        fonts,
        images,
        sheet: &doc.stylesheet,
        viewport,
        items: Vec::new(),
        y: 0.0,
        pending_margin: 0.0,
    };

    let root_style = TextStyle::root(&doc.stylesheet);
    flow.block_children(&doc.root, 0.0, viewport.width_px, &root_style);

    LayoutTree {
        width: viewport.width_px,
        height: flow.y.max(0.0),
        items: flow.items,
    }
}

/// One unit of inline content
#[derive(Debug)]
enum Piece<'a> {
    Word {
        text: String,
        style: TextStyle,
        space_before: bool,
    },
    Break,
    Image(&'a Element),
}

struct Flow<'a> {
    fonts: &'a FontBook,
    images: &'a ImageSet,
    sheet: &'a PrintStylesheet,
    viewport: &'a Viewport,
    items: Vec<LayoutItem>,
    /// Bottom edge of the last placed content
    y: f32,
    /// Collapsed vertical margin waiting for the next content
    pending_margin: f32,
}

impl<'a> Flow<'a> {
    fn add_margin(&mut self, margin: f32) {
        self.pending_margin = self.pending_margin.max(margin);
    }

    fn commit_margin(&mut self) {
        self.y += self.pending_margin;
        self.pending_margin = 0.0;
    }

    fn page_break(&mut self) {
        let Some(band) = self.viewport.page_band_px.filter(|b| *b > 0.0) else {
            return;
        };
        let next = (self.y / band).ceil() * band;
        if next > self.y {
            self.y = next;
        }
        self.pending_margin = 0.0;
    }

    /// Lay out the children of a block container, grouping inline runs
    fn block_children(&mut self, el: &'a Element, x: f32, width: f32, style: &TextStyle) {
        let mut run: Vec<&'a Node> = Vec::new();
        for child in &el.children {
            match child {
                Node::Element(child_el) if is_hidden(&child_el.tag) => {}
                Node::Element(child_el) if is_block(&child_el.tag) => {
                    self.inline_run(&run, x, width, style);
                    run.clear();
                    self.block(child_el, x, width, style);
                }
                _ => run.push(child),
            }
        }
        self.inline_run(&run, x, width, style);
    }

    fn block(&mut self, el: &'a Element, x: f32, width: f32, parent: &TextStyle) {
        if el.has_class(PAGE_BREAK_CLASS) {
            self.page_break();
            return;
        }

        let block = block_style(el, parent, self.sheet);
        self.add_margin(block.margin_top);

        match block.kind {
            BlockKind::Rule => {
                self.commit_margin();
                self.items.push(LayoutItem::Rect {
                    x,
                    y: self.y,
                    width,
                    height: 1.0,
                    color: RULE_COLOR,
                });
                self.y += 1.0;
            }
            BlockKind::List { ordered } => {
                let inner_x = x + block.indent;
                let inner_w = (width - block.indent).max(1.0);
                let mut number = el
                    .attr("start")
                    .and_then(|s| s.parse::<i64>().ok())
                    .unwrap_or(1);
                for child in &el.children {
                    match child {
                        Node::Element(li) if li.is("li") => {
                            let marker = if ordered {
                                format!("{number}.")
                            } else {
                                "\u{2022}".to_string()
                            };
                            self.list_item(li, inner_x, inner_w, &block.text, &marker);
                            number += 1;
                        }
                        Node::Element(other) if is_block(&other.tag) => {
                            self.block(other, inner_x, inner_w, &block.text)
                        }
                        Node::Element(other) if !is_hidden(&other.tag) => {
                            self.inline_run(&[child], inner_x, inner_w, &block.text)
                        }
                        _ => {}
                    }
                }
            }
            BlockKind::ListItem => {
                self.list_item(el, x + block.indent, width - block.indent, parent, "\u{2022}");
            }
            BlockKind::Quote => {
                self.commit_margin();
                let top = self.y;
                self.block_children(el, x + block.indent, width - block.indent, &block.text);
                self.items.push(LayoutItem::Rect {
                    x: x + block.indent / 2.0 - QUOTE_BAR_WIDTH / 2.0,
                    y: top,
                    width: QUOTE_BAR_WIDTH,
                    height: (self.y - top).max(0.0),
                    color: RULE_COLOR,
                });
            }
            BlockKind::Preformatted => {
                self.commit_margin();
                let top = self.y;
                let background = self.items.len();
                self.y += PRE_PADDING;
                let text = el.text_content();
                self.preformatted(&text, x + PRE_PADDING, &block.text);
                self.y += PRE_PADDING;
                self.items.insert(
                    background,
                    LayoutItem::Rect {
                        x,
                        y: top,
                        width,
                        height: self.y - top,
                        color: CODE_BACKGROUND,
                    },
                );
            }
            BlockKind::Table => self.table(el, x, width, &block.text),
            BlockKind::Plain => {
                self.block_children(el, x + block.indent, width - block.indent, &block.text)
            }
        }

        self.add_margin(block.margin_bottom);
    }

    fn list_item(&mut self, li: &'a Element, x: f32, width: f32, parent: &TextStyle, marker: &str) {
        let item = block_style(li, parent, self.sheet);
        self.add_margin(item.margin_top);
        let first_item = self.items.len();
        self.block_children(li, x, width, &item.text);

        // Align the marker with the first line of the item
        let first_line = self.items[first_item..].iter().find_map(|it| match it {
            LayoutItem::Text { baseline, size, .. } => Some((*baseline, *size)),
            _ => None,
        });
        if let Some((baseline, size)) = first_line {
            let marker_w = self.fonts.measure(marker, size, false);
            self.items.push(LayoutItem::Text {
                x: x - marker_w - MARKER_GAP,
                baseline,
                size,
                bold: false,
                color: item.text.color,
                text: marker.to_string(),
            });
        }
        self.add_margin(item.margin_bottom);
    }

    fn table(&mut self, table: &'a Element, x: f32, width: f32, style: &TextStyle) {
        let mut rows = Vec::new();
        collect_rows(table, &mut rows);

        for row in rows {
            let cells: Vec<&Element> = row
                .child_elements()
                .filter(|c| c.is("td") || c.is("th"))
                .collect();
            if cells.is_empty() {
                continue;
            }

            self.commit_margin();
            let top = self.y;
            let col_w = width / cells.len() as f32;
            let mut bottom = top;

            for (i, cell) in cells.into_iter().enumerate() {
                let cell_text = cell_style(cell, style, self.sheet);
                self.y = top + CELL_PADDING;
                self.pending_margin = 0.0;
                let cell_x = x + i as f32 * col_w + CELL_PADDING;
                let cell_w = (col_w - 2.0 * CELL_PADDING).max(1.0);
                self.block_children(cell, cell_x, cell_w, &cell_text);
                bottom = bottom.max(self.y + CELL_PADDING);
            }

            self.y = bottom;
            self.pending_margin = 0.0;
            self.items.push(LayoutItem::Rect {
                x,
                y: self.y,
                width,
                height: 1.0,
                color: RULE_COLOR,
            });
            self.y += 1.0;
        }
    }

    fn preformatted(&mut self, text: &str, x: f32, style: &TextStyle) {
        let line_h = style.line_height_px();
        let metrics = self.fonts.line_metrics(style.size, style.bold);
        let leading = (line_h - metrics.ascent - metrics.descent) / 2.0;
        for line in text.trim_end_matches('\n').split('\n') {
            let line = line.replace('\t', "    ");
            if !line.trim().is_empty() {
                self.items.push(LayoutItem::Text {
                    x,
                    baseline: self.y + leading + metrics.ascent,
                    size: style.size,
                    bold: style.bold,
                    color: style.color,
                    text: line,
                });
            }
            self.y += line_h;
        }
    }

    /// Lay out a sequence of inline nodes as wrapped lines
    fn inline_run(&mut self, nodes: &[&'a Node], x: f32, width: f32, style: &TextStyle) {
        let mut pieces = Vec::new();
        let mut pending_space = false;
        for node in nodes {
            collect_pieces(node, style, &mut pieces, &mut pending_space);
        }
        if pieces.is_empty() {
            return;
        }

        self.commit_margin();
        let mut line: Vec<(f32, String, TextStyle)> = Vec::new();
        let mut line_x = 0.0;

        for piece in pieces {
            match piece {
                Piece::Word {
                    text,
                    style: word_style,
                    space_before,
                } => {
                    let word_w = self.fonts.measure(&text, word_style.size, word_style.bold);
                    let space_w = if space_before && !line.is_empty() {
                        self.fonts.measure(" ", word_style.size, word_style.bold)
                    } else {
                        0.0
                    };
                    if !line.is_empty() && line_x + space_w + word_w > width {
                        self.flush_line(&mut line, x, style);
                        line_x = 0.0;
                    } else {
                        line_x += space_w;
                    }
                    line.push((line_x, text, word_style));
                    line_x += word_w;
                }
                Piece::Break => {
                    if line.is_empty() {
                        self.y += style.line_height_px();
                    } else {
                        self.flush_line(&mut line, x, style);
                    }
                    line_x = 0.0;
                }
                Piece::Image(img) => {
                    self.flush_line(&mut line, x, style);
                    line_x = 0.0;
                    self.image(img, x, width);
                }
            }
        }
        self.flush_line(&mut line, x, style);
    }

    fn flush_line(&mut self, line: &mut Vec<(f32, String, TextStyle)>, x: f32, style: &TextStyle) {
        if line.is_empty() {
            return;
        }

        let line_h = line
            .iter()
            .map(|(_, _, s)| s.line_height_px())
            .fold(style.line_height_px(), f32::max);
        let (ascent, descent) = line.iter().fold((0.0_f32, 0.0_f32), |(a, d), (_, _, s)| {
            let m = self.fonts.line_metrics(s.size, s.bold);
            (a.max(m.ascent), d.max(m.descent))
        });
        let baseline = self.y + (line_h - ascent - descent) / 2.0 + ascent;

        for (offset, text, s) in line.drain(..) {
            self.items.push(LayoutItem::Text {
                x: x + offset,
                baseline,
                size: s.size,
                bold: s.bold,
                color: s.color,
                text,
            });
        }
        self.y += line_h;
    }

    fn image(&mut self, img: &'a Element, x: f32, width: f32) {
        let src = img.attr("src").unwrap_or_default();
        let natural = self
            .images
            .get(src)
            .map(|i| (i.width() as f32, i.height() as f32));
        let attr_w = img.attr("width").and_then(parse_px);
        let attr_h = img.attr("height").and_then(parse_px);

        let (mut w, mut h) = match (attr_w, attr_h, natural) {
            (Some(w), Some(h), _) => (w, h),
            (Some(w), None, Some((nw, nh))) if nw > 0.0 => (w, w * nh / nw),
            (None, Some(h), Some((nw, nh))) if nh > 0.0 => (h * nw / nh, h),
            (None, None, Some((nw, nh))) => (nw, nh),
            (w, h, _) => (w.unwrap_or(0.0), h.unwrap_or(0.0)),
        };

        // max-width: 100%; height: auto
        if w > width && w > 0.0 {
            h = h * width / w;
            w = width;
        }
        if w <= 0.0 || h <= 0.0 {
            return;
        }

        self.items.push(LayoutItem::Image {
            x,
            y: self.y,
            width: w,
            height: h,
            src: src.to_string(),
        });
        self.y += h;
    }
}

fn collect_rows<'e>(el: &'e Element, rows: &mut Vec<&'e Element>) {
    for child in el.child_elements() {
        match child.tag.as_str() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => collect_rows(child, rows),
            _ => {}
        }
    }
}

fn collect_pieces<'a>(
    node: &'a Node,
    style: &TextStyle,
    out: &mut Vec<Piece<'a>>,
    pending_space: &mut bool,
) {
    match node {
        Node::Text(text) if style.preformatted => {
            for (i, line) in text.split('\n').enumerate() {
                if i > 0 {
                    out.push(Piece::Break);
                }
                if !line.is_empty() {
                    out.push(Piece::Word {
                        text: line.to_string(),
                        style: *style,
                        space_before: false,
                    });
                }
            }
        }
        Node::Text(text) => {
            if text.trim().is_empty() {
                *pending_space |= !text.is_empty();
                return;
            }
            let mut space_before = *pending_space || text.starts_with(char::is_whitespace);
            for word in text.split_whitespace() {
                out.push(Piece::Word {
                    text: word.to_string(),
                    style: *style,
                    space_before,
                });
                space_before = true;
            }
            *pending_space = text.ends_with(char::is_whitespace);
        }
        Node::Element(el) if is_hidden(&el.tag) => {}
        Node::Element(el) if el.is("br") => {
            out.push(Piece::Break);
            *pending_space = false;
        }
        Node::Element(el) if el.is("img") => {
            out.push(Piece::Image(el));
            *pending_space = false;
        }
        Node::Element(el) => {
            let inner = style.inline(el);
            for child in &el.children {
                collect_pieces(child, &inner, out, pending_space);
            }
        }
    }
}

fn parse_px(value: &str) -> Option<f32> {
    value
        .trim()
        .trim_end_matches("px")
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}
