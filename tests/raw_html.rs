//! HTML extraction tests

use scraper::{Html, Selector};
use tablesnap::table::{Align, Column, Table};

fn single_cell() -> Table {
    Table::new(vec![Column::new("value")]).row(["42"])
}

fn count(html: &str, css: &str) -> usize {
    let doc = Html::parse_document(html);
    let sel = Selector::parse(css).unwrap();
    doc.select(&sel).count()
}

#[test]
fn single_cell_table_has_one_table_tag() {
    let html = tablesnap::as_raw_html(&single_cell(), false, false);
    assert!(!html.is_empty());
    assert_eq!(html.matches("<table").count(), 1);
    assert_eq!(count(&html, "table"), 1);
    assert_eq!(count(&html, "tbody td"), 1);
}

#[test]
fn make_page_adds_document_scaffold() {
    let page = tablesnap::as_raw_html(&single_cell(), true, false);
    assert!(page.starts_with("<!DOCTYPE html>"));
    assert!(page.contains("<html"));
    assert!(page.contains("<head>"));
    assert!(page.contains("<body>"));
    assert!(page.contains("</body>"));
    assert_eq!(page.matches("<table").count(), 1);
}

#[test]
fn fragment_has_no_document_scaffold() {
    let html = tablesnap::as_raw_html(&single_cell(), false, false);
    assert!(!html.contains("<html"));
    assert!(!html.contains("<head"));
    assert!(!html.contains("<body"));
}

#[test]
fn all_important_only_changes_css() {
    let table = single_cell().id("fixed");
    let plain = tablesnap::as_raw_html(&table, false, false);
    let important = tablesnap::as_raw_html(&table, false, true);
    assert!(!plain.contains("!important"));
    assert!(important.contains("font-size: 16px !important;"));
    assert_eq!(plain.replace(" !important", ""), important.replace(" !important", ""));
}

#[test]
fn heading_columns_and_notes_are_rendered() {
    let table = Table::new(vec![
        Column::new("fruit"),
        Column::new("count").align(Align::Center),
    ])
    .title("Inventory")
    .subtitle("as of today")
    .row(["apple", "3"])
    .row(["pear", "5"])
    .source_note("Counted by hand");
    let html = tablesnap::as_raw_html(&table, false, false);

    assert_eq!(count(&html, "thead .gt_title"), 1);
    assert_eq!(count(&html, "thead .gt_subtitle"), 1);
    assert_eq!(count(&html, "th.gt_col_heading"), 2);
    assert_eq!(count(&html, "tbody tr"), 2);
    assert_eq!(count(&html, "td.gt_center"), 2);
    assert_eq!(count(&html, "tfoot .gt_sourcenote"), 1);

    let doc = Html::parse_document(&html);
    let title = Selector::parse(".gt_title").unwrap();
    let text: String = doc.select(&title).next().unwrap().text().collect();
    assert_eq!(text, "Inventory");
}

#[test]
fn explicit_id_scopes_styles() {
    let html = tablesnap::as_raw_html(&single_cell().id("mytable"), false, false);
    assert_eq!(count(&html, "div#mytable > table.gt_table"), 1);
    assert!(html.contains("#mytable .gt_row {"));
}

#[test]
fn ids_are_random_when_unset() {
    let a = tablesnap::as_raw_html(&single_cell(), false, false);
    let b = tablesnap::as_raw_html(&single_cell(), false, false);
    assert_ne!(a, b);
}

/// The `.gt_table` rule's selector, exactly as emitted inside `<style>`
fn gt_table_selector(html: &str) -> String {
    let line = html
        .lines()
        .find(|l| l.starts_with('#') && l.contains(" .gt_table {"))
        .unwrap();
    line[..line.find(" {").unwrap()].to_string()
}

#[test]
fn styles_match_ids_that_need_escaping() {
    for id in ["a&b", "two words", "1st", "x:y.z"] {
        let html = tablesnap::as_raw_html(&single_cell().id(id), false, false);
        let selector = gt_table_selector(&html);
        assert_eq!(count(&html, &selector), 1, "{} did not match id {:?}", selector, id);
    }
}

#[test]
fn ampersand_id_is_css_escaped() {
    let html = tablesnap::as_raw_html(&single_cell().id("a&b"), false, false);
    assert!(html.contains("<div id=\"a&amp;b\""));
    assert!(html.contains(r"#a\&b .gt_table {"));
    assert!(!html.contains("#a&amp;b"));
}
