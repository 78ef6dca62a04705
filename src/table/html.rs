//! HTML serialization of the built table.

use super::{Align, HtmlRender};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write;

/// Render tree produced by [`Table`](super::Table) for the HTML target
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltTable {
    pub id: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub columns: Vec<BuiltColumn>,
    pub body: Vec<Vec<String>>,
    pub source_notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltColumn {
    pub label: String,
    /// Resolved alignment, never `Align::Auto`
    pub align: Align,
}

const FONT_STACK: &str = "-apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, 'Helvetica Neue', 'Fira Sans', 'Droid Sans', Arial, sans-serif";

// (selector suffix, declarations); every selector is prefixed with `#<id>`
const STYLE_RULES: &[(&str, &[(&str, &str)])] = &[
    (
        "table",
        &[
            ("font-family", FONT_STACK),
            ("-webkit-font-smoothing", "antialiased"),
            ("-moz-osx-font-smoothing", "grayscale"),
        ],
    ),
    ("thead, tbody, tfoot, tr, td, th", &[("border-style", "none")]),
    ("p", &[("margin", "0"), ("padding", "0")]),
    (
        ".gt_table",
        &[
            ("display", "table"),
            ("border-collapse", "collapse"),
            ("line-height", "normal"),
            ("margin-left", "auto"),
            ("margin-right", "auto"),
            ("color", "#333333"),
            ("font-size", "16px"),
            ("font-weight", "normal"),
            ("font-style", "normal"),
            ("background-color", "#FFFFFF"),
            ("width", "auto"),
            ("border-top-style", "solid"),
            ("border-top-width", "2px"),
            ("border-top-color", "#A8A8A8"),
            ("border-bottom-style", "solid"),
            ("border-bottom-width", "2px"),
            ("border-bottom-color", "#A8A8A8"),
        ],
    ),
    (
        ".gt_heading",
        &[
            ("background-color", "#FFFFFF"),
            ("text-align", "center"),
            ("border-bottom-color", "#FFFFFF"),
        ],
    ),
    (
        ".gt_title",
        &[
            ("color", "#333333"),
            ("font-size", "125%"),
            ("font-weight", "initial"),
            ("padding-top", "4px"),
            ("padding-bottom", "4px"),
            ("padding-left", "5px"),
            ("padding-right", "5px"),
        ],
    ),
    (
        ".gt_subtitle",
        &[
            ("color", "#333333"),
            ("font-size", "85%"),
            ("font-weight", "initial"),
            ("padding-top", "3px"),
            ("padding-bottom", "5px"),
            ("padding-left", "5px"),
            ("padding-right", "5px"),
        ],
    ),
    (
        ".gt_bottom_border",
        &[
            ("border-bottom-style", "solid"),
            ("border-bottom-width", "2px"),
            ("border-bottom-color", "#D3D3D3"),
        ],
    ),
    (
        ".gt_col_headings",
        &[
            ("border-top-style", "solid"),
            ("border-top-width", "2px"),
            ("border-top-color", "#D3D3D3"),
            ("border-bottom-style", "solid"),
            ("border-bottom-width", "2px"),
            ("border-bottom-color", "#D3D3D3"),
        ],
    ),
    (
        ".gt_col_heading",
        &[
            ("color", "#333333"),
            ("background-color", "#FFFFFF"),
            ("font-size", "100%"),
            ("font-weight", "normal"),
            ("text-transform", "inherit"),
            ("vertical-align", "bottom"),
            ("padding-top", "5px"),
            ("padding-bottom", "5px"),
            ("padding-left", "5px"),
            ("padding-right", "5px"),
            ("overflow-x", "hidden"),
        ],
    ),
    (
        ".gt_row",
        &[
            ("padding-top", "8px"),
            ("padding-bottom", "8px"),
            ("padding-left", "5px"),
            ("padding-right", "5px"),
            ("margin", "10px"),
            ("border-top-style", "solid"),
            ("border-top-width", "1px"),
            ("border-top-color", "#D3D3D3"),
            ("vertical-align", "middle"),
            ("overflow-x", "hidden"),
        ],
    ),
    (
        ".gt_sourcenote",
        &[
            ("font-size", "90%"),
            ("padding-top", "4px"),
            ("padding-bottom", "4px"),
            ("padding-left", "5px"),
            ("padding-right", "5px"),
            ("text-align", "left"),
        ],
    ),
    (
        ".gt_sourcenotes",
        &[
            ("color", "#333333"),
            ("background-color", "#FFFFFF"),
            ("border-bottom-style", "none"),
        ],
    ),
    (".gt_left", &[("text-align", "left")]),
    (".gt_center", &[("text-align", "center")]),
    (
        ".gt_right",
        &[
            ("text-align", "right"),
            ("font-variant-numeric", "tabular-nums"),
        ],
    ),
    (".gt_font_normal", &[("font-weight", "normal")]),
];

impl BuiltTable {
    fn style_block(&self, all_important: bool) -> String {
        let suffix = if all_important { " !important" } else { "" };
        let id = css_ident(&self.id);
        let mut css = String::new();
        for (selector, decls) in STYLE_RULES {
            let _ = write!(css, "#{} {} {{", id, selector);
            for (prop, value) in decls.iter() {
                let _ = write!(css, " {}: {}{};", prop, value, suffix);
            }
            css.push_str(" }\n");
        }
        css
    }

    fn write_heading(&self, out: &mut String, span: usize) {
        let Some(title) = &self.title else {
            return;
        };
        // The border sits under whichever heading row comes last
        let title_border = if self.subtitle.is_none() { " gt_bottom_border" } else { "" };
        let _ = writeln!(
            out,
            "  <tr class=\"gt_heading\">\n    <td colspan=\"{}\" class=\"gt_heading gt_title gt_font_normal{}\">{}</td>\n  </tr>",
            span,
            title_border,
            encode_text(title)
        );
        if let Some(subtitle) = &self.subtitle {
            let _ = writeln!(
                out,
                "  <tr class=\"gt_heading\">\n    <td colspan=\"{}\" class=\"gt_heading gt_subtitle gt_font_normal gt_bottom_border\">{}</td>\n  </tr>",
                span,
                encode_text(subtitle)
            );
        }
    }

    fn render_fragment(&self, all_important: bool) -> String {
        let span = self.columns.len().max(1);
        let mut out = String::new();

        let _ = writeln!(
            out,
            "<div id=\"{}\" style=\"padding-left:0px;padding-right:0px;padding-top:10px;padding-bottom:10px;overflow-x:auto;overflow-y:auto;width:auto;height:auto;\">",
            encode_double_quoted_attribute(&self.id)
        );
        out.push_str("<style>\n");
        out.push_str(&self.style_block(all_important));
        out.push_str("</style>\n");
        out.push_str("<table class=\"gt_table\" data-quarto-disable-processing=\"false\" data-quarto-bootstrap=\"false\">\n");

        out.push_str("<thead>\n");
        self.write_heading(&mut out, span);
        out.push_str("<tr class=\"gt_col_headings\">\n");
        for col in &self.columns {
            let _ = writeln!(
                out,
                "  <th class=\"gt_col_heading gt_columns_bottom_border {}\" rowspan=\"1\" colspan=\"1\" scope=\"col\" id=\"{}\">{}</th>",
                col.align.css_class(),
                encode_double_quoted_attribute(&col.label),
                encode_text(&col.label)
            );
        }
        out.push_str("</tr>\n</thead>\n");

        out.push_str("<tbody class=\"gt_table_body\">\n");
        for row in &self.body {
            out.push_str("  <tr>\n");
            for (cell, col) in row.iter().zip(&self.columns) {
                let _ = writeln!(
                    out,
                    "    <td class=\"gt_row {}\">{}</td>",
                    col.align.css_class(),
                    encode_text(cell)
                );
            }
            out.push_str("  </tr>\n");
        }
        out.push_str("</tbody>\n");

        if !self.source_notes.is_empty() {
            out.push_str("<tfoot class=\"gt_sourcenotes\">\n");
            for note in &self.source_notes {
                let _ = writeln!(
                    out,
                    "  <tr>\n    <td class=\"gt_sourcenote\" colspan=\"{}\">{}</td>\n  </tr>",
                    span,
                    encode_text(note)
                );
            }
            out.push_str("</tfoot>\n");
        }

        out.push_str("</table>\n</div>\n");
        out
    }
}

impl HtmlRender for BuiltTable {
    fn render_as_html(&self, make_page: bool, all_important: bool) -> String {
        let fragment = self.render_fragment(all_important);
        if !make_page {
            return fragment;
        }
        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\"/>\n</head>\n<body>\n{}</body>\n</html>\n",
            fragment
        )
    }
}

/// Escape `id` as a CSS identifier for use in a selector.
///
/// `<style>` content is raw text, so HTML entities are never decoded there.
/// Leading digits, control characters and `<` are written as hex escapes, so
/// the output can never close the `<style>` element.
fn css_ident(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    let mut chars = id.chars().peekable();
    let mut index = 0;
    while let Some(c) = chars.next() {
        let leading_digit = c.is_ascii_digit() && (index == 0 || (index == 1 && id.starts_with('-')));
        if c == '\0' {
            out.push('\u{FFFD}');
        } else if c.is_control() || c == '<' || leading_digit {
            let _ = write!(out, "\\{:x} ", u32::from(c));
        } else if c == '-' && index == 0 && chars.peek().is_none() {
            out.push_str("\\-");
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
        index += 1;
    }
    out
}
