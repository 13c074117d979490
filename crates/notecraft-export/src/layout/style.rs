use crate::constants::{DEFAULT_LINE_HEIGHT, LIST_INDENT_PX, pt_to_px};
use crate::dom::Element;
use crate::prepare::PrintStylesheet;

const TEXT_COLOR: [u8; 3] = [17, 24, 39];
const LINK_COLOR: [u8; 3] = [37, 99, 235];
const MUTED_COLOR: [u8; 3] = [75, 85, 99];

/// Inherited text properties
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    /// Font size in CSS pixels
    pub size: f32,
    pub bold: bool,
    pub color: [u8; 3],
    /// Line-height multiplier
    pub line_height: f32,
    /// Keep whitespace and newlines (`pre`)
    pub preformatted: bool,
}

impl TextStyle {
    pub fn root(sheet: &PrintStylesheet) -> Self {
        Self {
            size: pt_to_px(sheet.body_font_pt),
            bold: false,
            color: TEXT_COLOR,
            line_height: DEFAULT_LINE_HEIGHT,
            preformatted: false,
        }
    }

    pub fn line_height_px(&self) -> f32 {
        self.size * self.line_height
    }

    /// Style of an inline element's content
    pub fn inline(&self, el: &Element) -> Self {
        let mut style = *self;
        match el.tag.as_str() {
            "b" | "strong" | "th" => style.bold = true,
            "a" => style.color = LINK_COLOR,
            "small" | "sub" | "sup" => style.size *= 0.83,
            _ => {}
        }
        style
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum BlockKind {
    Plain,
    List { ordered: bool },
    ListItem,
    Quote,
    Preformatted,
    Table,
    Rule,
}

/// Resolved box properties of a block element
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BlockStyle {
    pub kind: BlockKind,
    pub text: TextStyle,
    pub margin_top: f32,
    pub margin_bottom: f32,
    /// Left padding in CSS pixels
    pub indent: f32,
}

pub(crate) fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "div"
            | "section"
            | "article"
            | "main"
            | "header"
            | "footer"
            | "nav"
            | "aside"
            | "figure"
            | "figcaption"
            | "p"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "ul"
            | "ol"
            | "li"
            | "blockquote"
            | "pre"
            | "table"
            | "hr"
    )
}

/// Elements that never produce boxes
pub(crate) fn is_hidden(tag: &str) -> bool {
    matches!(tag, "style" | "script" | "head" | "template" | "noscript")
}

pub(crate) fn block_style(el: &Element, parent: &TextStyle, sheet: &PrintStylesheet) -> BlockStyle {
    let base = pt_to_px(sheet.body_font_pt);
    let mut text = *parent;
    let mut kind = BlockKind::Plain;
    let mut margin = (0.0, 0.0);
    let mut indent = 0.0;

    // Body rules shared by p, li, blockquote and table cells
    let body_text = |text: &mut TextStyle| {
        text.size = base;
        text.line_height = sheet.line_spacing;
        (sheet.block_margin_em * base, sheet.block_margin_em * base)
    };

    match el.tag.as_str() {
        "h1" | "h2" | "h3" => {
            let level = (el.tag.as_bytes()[1] - b'1') as usize;
            text.size = pt_to_px(sheet.heading_font_pt[level]);
            text.bold = true;
            text.line_height = DEFAULT_LINE_HEIGHT;
            let (top, bottom) = sheet.heading_margins_em[level];
            margin = (top * text.size, bottom * text.size);
        }
        "h4" | "h5" | "h6" => {
            let factor = match el.tag.as_str() {
                "h4" => 1.0,
                "h5" => 0.83,
                _ => 0.67,
            };
            text.size = base * factor;
            text.bold = true;
            text.line_height = DEFAULT_LINE_HEIGHT;
            margin = (1.33 * text.size, 1.33 * text.size);
        }
        "p" => margin = body_text(&mut text),
        "li" => {
            kind = BlockKind::ListItem;
            margin = body_text(&mut text);
        }
        "blockquote" => {
            kind = BlockKind::Quote;
            margin = body_text(&mut text);
            text.color = MUTED_COLOR;
            indent = LIST_INDENT_PX;
        }
        "ul" | "ol" => {
            kind = BlockKind::List {
                ordered: el.is("ol"),
            };
            let m = sheet.list_margin_em * text.size;
            margin = (m, m);
            indent = LIST_INDENT_PX;
        }
        "pre" => {
            kind = BlockKind::Preformatted;
            text.preformatted = true;
            text.size = text.size.min(base) * 0.9;
            margin = (base, base);
        }
        "table" => {
            kind = BlockKind::Table;
            margin = (base * 0.5, base * 0.5);
        }
        "hr" => {
            kind = BlockKind::Rule;
            margin = (base * 0.5, base * 0.5);
        }
        "figcaption" => {
            text.color = MUTED_COLOR;
            text.size = base * 0.9;
        }
        _ => {}
    }

    BlockStyle {
        kind,
        text,
        margin_top: margin.0,
        margin_bottom: margin.1,
        indent,
    }
}

/// Text style for a table cell
pub(crate) fn cell_style(cell: &Element, parent: &TextStyle, sheet: &PrintStylesheet) -> TextStyle {
    let mut text = *parent;
    text.size = pt_to_px(sheet.body_font_pt);
    text.line_height = sheet.line_spacing;
    text.bold = cell.is("th");
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PageSettings;

    #[test]
    fn headings_scale_from_base() {
        let sheet = PrintStylesheet::from_settings(&PageSettings {
            font_size: 12,
            ..Default::default()
        });
        let root = TextStyle::root(&sheet);
        let h1 = block_style(&Element::new("h1"), &root, &sheet);
        assert_eq!(h1.text.size, 32.0);
        assert!(h1.text.bold);
        let p = block_style(&Element::new("p"), &root, &sheet);
        assert_eq!(p.text.size, 16.0);
        assert_eq!(p.text.line_height, 1.5);
        assert_eq!(p.margin_top, 8.0);
    }
}
