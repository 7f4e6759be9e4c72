//! Small helpers shared by the HTML adapters.

use crate::models::{Field, FieldMap};
use scraper::{ElementRef, Html, Selector};

/// Visible text of an element with whitespace collapsed
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first element matching any of `selectors`, tried in order.
/// Selectors that fail to parse are skipped.
pub fn first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        document
            .select(&selector)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

/// Text of the parent of the first element matching `selector`, used for
/// icon-labelled values like `<span><i class="icon bed"></i> 3</span>`.
pub fn parent_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let icon = document.select(&selector).next()?;
    let parent = icon.parent().and_then(ElementRef::wrap)?;
    Some(element_text(parent)).filter(|text| !text.is_empty())
}

/// Finds the value next to a label inside repeated key/value containers.
///
/// For each element matching `row`, the texts of its `cell` children are
/// scanned; the cell after the first one containing `label` is returned.
pub fn labelled_value(document: &Html, row: &str, cell: &str, label: &str) -> Option<String> {
    let row_selector = Selector::parse(row).ok()?;
    let cell_selector = Selector::parse(cell).ok()?;
    let label = label.to_lowercase();

    document.select(&row_selector).find_map(|row| {
        let cells: Vec<String> = row.select(&cell_selector).map(element_text).collect();
        let position = cells
            .iter()
            .position(|text| text.to_lowercase().contains(&label))?;
        cells
            .get(position + 1)
            .filter(|text| !text.is_empty())
            .cloned()
    })
}

/// Resolves `href` against `base`.
pub fn absolute_url(base: &str, href: &str) -> Option<String> {
    let base = url::Url::parse(base).ok()?;
    base.join(href.trim()).ok().map(String::from)
}

/// Appends `?p=N` or `&p=N`; page 1 is the bare search URL.
pub fn page_param_url(search_url: &str, page: usize) -> String {
    if page <= 1 {
        return search_url.to_string();
    }
    let separator = if search_url.contains('?') { '&' } else { '?' };
    format!("{search_url}{separator}p={page}")
}

/// Inserts `value` when present and non-empty.
pub fn put(fields: &mut FieldMap, field: Field, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        fields.insert(field, value);
    }
}
