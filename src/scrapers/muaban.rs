use crate::models::{CandidateLink, Field, FieldMap};
use crate::scrapers::extract::{
    absolute_url, element_text, first_text, labelled_value, page_param_url, put,
};
use crate::scrapers::traits::SourceAdapter;
use crate::scrapers::types::RenderedDocument;
use scraper::{Html, Selector};
use tracing::debug;

/// Adapter for muaban.net listings.
///
/// The site ships generated class names, so selectors list the current
/// generated class first and a semantic fallback after it.
pub struct MuabanAdapter {
    base_url: String,
}

impl MuabanAdapter {
    pub const NAME: &'static str = "muaban.net";

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Value of a `<li><span class="label">..</span><span>..</span></li>` row
    fn attr(document: &Html, label: &str) -> Option<String> {
        labelled_value(document, "li", "span", label)
    }
}

impl SourceAdapter for MuabanAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn build_page_url(&self, search_url: &str, page: usize) -> String {
        page_param_url(search_url, page)
    }

    fn extract_links(&self, document: &RenderedDocument) -> Vec<CandidateLink> {
        let html = Html::parse_document(&document.html);
        let (Ok(item_selector), Ok(link_selector), Ok(title_selector)) = (
            Selector::parse("div.sc-c7upxc-3.cBJHnx"),
            Selector::parse("a[href]"),
            Selector::parse("h3"),
        ) else {
            return Vec::new();
        };

        let links: Vec<CandidateLink> = html
            .select(&item_selector)
            .filter_map(|item| {
                let anchor = item.select(&link_selector).next()?;
                let url = absolute_url(&self.base_url, anchor.value().attr("href")?)?;
                let title = anchor
                    .select(&title_selector)
                    .next()
                    .map(element_text)
                    .unwrap_or_default();
                Some(CandidateLink { url, title })
            })
            .collect();

        debug!(page = %document.url, count = links.len(), "Extracted muaban.net links");
        links
    }

    fn extract_details(&self, document: &RenderedDocument, _url: &str) -> FieldMap {
        let html = Html::parse_document(&document.html);
        let mut fields = FieldMap::new();

        put(
            &mut fields,
            Field::Title,
            first_text(&html, &["h1.sc-6orc5o-8", "h1.title", "h1"]),
        );
        put(&mut fields, Field::Address, first_text(&html, &["div.address", ".address"]));
        put(&mut fields, Field::Price, first_text(&html, &["div.price", ".price"]));
        put(&mut fields, Field::Area, Self::attr(&html, "Diện tích đất"));
        put(
            &mut fields,
            Field::Seller,
            first_text(&html, &[".sc-lohvv8-4 .title", ".seller-name", ".author .title"]),
        );
        put(&mut fields, Field::Bedrooms, Self::attr(&html, "Số phòng ngủ"));
        put(&mut fields, Field::Bathrooms, Self::attr(&html, "Số phòng vệ sinh"));
        put(&mut fields, Field::Frontage, Self::attr(&html, "Mặt tiền"));
        put(&mut fields, Field::Legal, Self::attr(&html, "Giấy tờ pháp lý"));
        put(
            &mut fields,
            Field::PostedDate,
            labelled_value(&html, "div.sc-6orc5o-21 div", "span", "Ngày bắt đầu"),
        );
        put(
            &mut fields,
            Field::Description,
            first_text(&html, &[".sc-6orc5o-10.eRboKF", ".description"]),
        );

        fields
    }
}
