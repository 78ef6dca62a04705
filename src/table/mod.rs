//! Table model and the render seams used by the exporters.
//!
//! Export only needs two capabilities from a table: building a render tree
//! for a target context, and serializing that tree to HTML. Both are traits
//! so callers can plug in their own table types; [`Table`] is the built-in
//! implementation.

mod html;

pub use html::{BuiltColumn, BuiltTable};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Output target a render tree is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderContext {
    Html,
}

/// A table that can build a render tree for a given output target.
pub trait RenderTable {
    type Tree: HtmlRender;

    fn build_data(&self, context: RenderContext) -> Self::Tree;
}

/// A render tree that can serialize itself to HTML.
pub trait HtmlRender {
    /// Serialize the tree. `make_page` wraps the fragment in a full document;
    /// `all_important` marks every generated CSS declaration `!important`.
    fn render_as_html(&self, make_page: bool, all_important: bool) -> String;
}

/// Horizontal alignment of a column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    /// Right-align when every non-empty cell is numeric, left otherwise
    #[default]
    Auto,
    Left,
    Center,
    Right,
}

impl Align {
    pub(crate) fn css_class(self) -> &'static str {
        match self {
            Align::Auto | Align::Left => "gt_left",
            Align::Center => "gt_center",
            Align::Right => "gt_right",
        }
    }
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub label: String,
    #[serde(default)]
    pub align: Align,
}

impl Column {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            align: Align::Auto,
        }
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }
}

/// A simple display table: heading, column labels, text body and footnotes.
///
/// # Examples
///
/// ```
/// use tablesnap::table::{Column, Table};
///
/// let table = Table::new(vec![Column::new("name"), Column::new("value")])
///     .title("Totals")
///     .row(["apples", "3"]);
/// assert_eq!(table.rows.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Table {
    /// HTML id used to scope the generated CSS; random when unset
    pub id: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
    pub source_notes: Vec<String>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            ..Default::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn row<I, S>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
        self
    }

    pub fn source_note(mut self, note: impl Into<String>) -> Self {
        self.source_notes.push(note.into());
        self
    }

    fn resolved_align(&self, index: usize) -> Align {
        let align = self.columns[index].align;
        if align != Align::Auto {
            return align;
        }
        let mut cells = self
            .rows
            .iter()
            .filter_map(|r| r.get(index))
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .peekable();
        if cells.peek().is_none() {
            return Align::Left;
        }
        if cells.all(|c| c.replace(',', "").parse::<f64>().is_ok()) {
            Align::Right
        } else {
            Align::Left
        }
    }
}

impl RenderTable for Table {
    type Tree = BuiltTable;

    fn build_data(&self, _context: RenderContext) -> BuiltTable {
        let id = self.id.clone().unwrap_or_else(random_id);
        let columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| BuiltColumn {
                label: c.label.clone(),
                align: self.resolved_align(i),
            })
            .collect::<Vec<_>>();

        // Ragged rows are padded or truncated to the column count
        let width = columns.len();
        let body = self
            .rows
            .iter()
            .map(|r| {
                let mut cells: Vec<String> = r.iter().take(width).cloned().collect();
                cells.resize(width, String::new());
                cells
            })
            .collect();

        BuiltTable {
            id,
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            columns,
            body,
            source_notes: self.source_notes.clone(),
        }
    }
}

fn random_id() -> String {
    let mut rng = rand::rng();
    (0..10)
        .map(|_| rng.random_range(b'a'..=b'z') as char)
        .collect()
}
