use crate::models::{CandidateLink, Field, FieldMap};
use crate::normalize;
use crate::scrapers::extract::{
    absolute_url, element_text, first_text, labelled_value, page_param_url, parent_text, put,
};
use crate::scrapers::traits::SourceAdapter;
use crate::scrapers::types::RenderedDocument;
use scraper::{Html, Selector};
use tracing::debug;

/// Adapter for bds123.vn listings
pub struct Bds123Adapter {
    base_url: String,
}

impl Bds123Adapter {
    pub const NAME: &'static str = "bds123.vn";

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl SourceAdapter for Bds123Adapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn build_page_url(&self, search_url: &str, page: usize) -> String {
        page_param_url(search_url, page)
    }

    fn extract_links(&self, document: &RenderedDocument) -> Vec<CandidateLink> {
        let html = Html::parse_document(&document.html);
        let (Ok(item_selector), Ok(link_selector)) = (
            Selector::parse("li.vip, li.normal, li.free"),
            Selector::parse("h3 a[href]"),
        ) else {
            return Vec::new();
        };

        let links: Vec<CandidateLink> = html
            .select(&item_selector)
            .filter_map(|item| {
                let anchor = item.select(&link_selector).next()?;
                let url = absolute_url(&self.base_url, anchor.value().attr("href")?)?;
                let title = anchor
                    .value()
                    .attr("title")
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map_or_else(|| element_text(anchor), str::to_string);
                Some(CandidateLink { url, title })
            })
            .collect();

        debug!(page = %document.url, count = links.len(), "Extracted bds123.vn links");
        links
    }

    fn extract_details(&self, document: &RenderedDocument, _url: &str) -> FieldMap {
        let html = Html::parse_document(&document.html);
        let mut fields = FieldMap::new();

        put(&mut fields, Field::Title, first_text(&html, &["header h1", "h1"]));
        put(&mut fields, Field::Address, labelled_value(&html, "tr", "td", "Địa chỉ"));
        put(
            &mut fields,
            Field::Seller,
            first_text(
                &html,
                &[".agent-name a", ".agent-name", ".author-name", ".contact-name"],
            ),
        );
        put(
            &mut fields,
            Field::Description,
            first_text(&html, &[".post__main__content", ".info-content-body", ".description"]),
        );
        put(
            &mut fields,
            Field::Price,
            first_text(&html, &["header .d-flex > div.fs-6.fw-semibold.text-pink"]),
        );
        put(
            &mut fields,
            Field::Area,
            first_text(&html, &["header .d-flex > div.fs-6.d-flex.ms-5"]),
        );
        put(&mut fields, Field::Bedrooms, parent_text(&html, "i.icon.bed"));
        put(&mut fields, Field::Bathrooms, parent_text(&html, "i.icon.bath"));
        put(&mut fields, Field::Legal, labelled_value(&html, "tr", "td", "Pháp lý"));
        put(
            &mut fields,
            Field::PostedDate,
            labelled_value(&html, "tr", "td", "Ngày đăng")
                .or_else(|| first_text(&html, &["tr td time"])),
        );

        let page_text = Selector::parse("body")
            .ok()
            .and_then(|body| html.select(&body).next().map(element_text));
        put(
            &mut fields,
            Field::Phone,
            page_text.as_deref().and_then(normalize::parse_phone),
        );

        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Property;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    const SEARCH_PAGE: &str = r#"
        <ul class="post-listing">
          <li class="item vip"><h3><a href="/ban-nha-quan-3-pr1.html" title=" Bán nhà Quận 3 ">x</a></h3></li>
          <li class="item normal"><h3><a href="https://bds123.vn/ban-nha-go-vap-pr2.html">Bán nhà Gò Vấp</a></h3></li>
          <li class="item ad"><h3><a href="/quang-cao.html">Ad</a></h3></li>
        </ul>"#;

    const DETAIL_PAGE: &str = r#"
        <header>
          <h1>Bán nhà hẻm xe hơi Quận 3</h1>
          <div class="d-flex">
            <div class="fs-6 fw-semibold text-pink">8,5 tỷ</div>
            <div class="fs-6 d-flex ms-5">62 m²</div>
          </div>
        </header>
        <span><i class="icon bed"></i> 4 PN</span>
        <span><i class="icon bath"></i> 3 WC</span>
        <table>
          <tr><td><div>Địa chỉ:</div></td><td>45 Võ Văn Tần, Quận 3, Hồ Chí Minh</td></tr>
          <tr><td><div>Ngày đăng:</div></td><td><time>02/05/2024</time></td></tr>
        </table>
        <div class="agent-name">Chị Lan</div>
        <div class="post__main__content">Liên hệ 0903 123 456 để xem nhà.</div>"#;

    fn adapter() -> Bds123Adapter {
        Bds123Adapter::new("https://bds123.vn/")
    }

    #[test]
    fn test_extract_links_filters_listing_items() {
        let document = RenderedDocument::new("https://bds123.vn/ban-nha.html", SEARCH_PAGE);
        let links = adapter().extract_links(&document);

        assert_eq!(
            links,
            vec![
                CandidateLink {
                    url: "https://bds123.vn/ban-nha-quan-3-pr1.html".to_string(),
                    title: "Bán nhà Quận 3".to_string(),
                },
                CandidateLink {
                    url: "https://bds123.vn/ban-nha-go-vap-pr2.html".to_string(),
                    title: "Bán nhà Gò Vấp".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_extract_details_into_property() {
        let url = "https://bds123.vn/ban-nha-quan-3-pr1.html";
        let document = RenderedDocument::new(url, DETAIL_PAGE);
        let fields = adapter().extract_details(&document, url);
        let property = Property::from_fields(url, Bds123Adapter::NAME, &fields, Utc::now()).unwrap();

        assert_eq!(property.title.as_deref(), Some("Bán nhà hẻm xe hơi Quận 3"));
        assert_eq!(property.price, Some(8_500_000_000.0));
        assert_eq!(property.area, Some(62.0));
        assert_eq!(property.unit_price, Some(137_096_774.19));
        assert_eq!(property.bedrooms, Some(4));
        assert_eq!(property.bathrooms, Some(3));
        assert_eq!(property.city.as_deref(), Some("Hồ Chí Minh"));
        assert_eq!(property.phone.as_deref(), Some("0903123456"));
        assert_eq!(property.seller.as_deref(), Some("Chị Lan"));
        assert_eq!(
            property.posted_date,
            chrono::NaiveDate::from_ymd_opt(2024, 5, 2)
        );
    }
}
