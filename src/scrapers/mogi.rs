use crate::models::{CandidateLink, Field, FieldMap};
use crate::scrapers::extract::{
    absolute_url, element_text, first_text, labelled_value, page_param_url, put,
};
use crate::scrapers::traits::SourceAdapter;
use crate::scrapers::types::RenderedDocument;
use scraper::{Html, Selector};
use tracing::debug;

/// Adapter for mogi.vn listings
pub struct MogiAdapter {
    base_url: String,
}

impl MogiAdapter {
    pub const NAME: &'static str = "mogi.vn";

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn attr(document: &Html, label: &str) -> Option<String> {
        labelled_value(document, ".info-attrs .info-attr", "span", label)
    }
}

impl SourceAdapter for MogiAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn build_page_url(&self, search_url: &str, page: usize) -> String {
        page_param_url(search_url, page)
    }

    fn extract_links(&self, document: &RenderedDocument) -> Vec<CandidateLink> {
        let html = Html::parse_document(&document.html);
        let (Ok(item_selector), Ok(link_selector), Ok(title_selector)) = (
            Selector::parse("div[class*='prop-info']"),
            Selector::parse("a[href]"),
            Selector::parse(".prop-title"),
        ) else {
            return Vec::new();
        };

        let links: Vec<CandidateLink> = html
            .select(&item_selector)
            .filter_map(|item| {
                let href = item.select(&link_selector).next()?.value().attr("href")?;
                let url = absolute_url(&self.base_url, href)?;
                let title = item
                    .select(&title_selector)
                    .next()
                    .map(element_text)
                    .unwrap_or_default();
                Some(CandidateLink { url, title })
            })
            .collect();

        debug!(page = %document.url, count = links.len(), "Extracted mogi.vn links");
        links
    }

    fn extract_details(&self, document: &RenderedDocument, _url: &str) -> FieldMap {
        let html = Html::parse_document(&document.html);
        let mut fields = FieldMap::new();

        put(&mut fields, Field::Title, first_text(&html, &[".main-info .title h1", "h1"]));
        put(
            &mut fields,
            Field::Address,
            first_text(&html, &[".main-info .address", "div.address"]),
        );
        put(&mut fields, Field::Price, first_text(&html, &[".main-info .price"]));
        put(&mut fields, Field::Area, Self::attr(&html, "Diện tích đất"));
        put(&mut fields, Field::Bedrooms, Self::attr(&html, "Phòng ngủ"));
        put(&mut fields, Field::Bathrooms, Self::attr(&html, "Nhà tắm"));
        put(&mut fields, Field::Frontage, Self::attr(&html, "Mặt tiền"));
        put(&mut fields, Field::Legal, Self::attr(&html, "Pháp lý"));
        put(&mut fields, Field::PostedDate, Self::attr(&html, "Ngày đăng"));
        put(&mut fields, Field::Seller, first_text(&html, &[".agent-name a", ".agent-name"]));
        put(&mut fields, Field::Description, first_text(&html, &[".info-content-body"]));

        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SEARCH_PAGE: &str = r#"
        <div class="props">
          <div class="prop-info">
            <a class="link-overlay" href="/quan-7/mua-can-ho/can-ho-sunrise-id101"></a>
            <h2 class="prop-title">Căn hộ Sunrise City 2PN</h2>
          </div>
          <div class="prop-info">
            <a href="https://mogi.vn/thu-duc/mua-nha/nha-pho-id102">
              <span class="prop-title">Nhà phố Thủ Đức</span>
            </a>
          </div>
          <div class="prop-info"><span>no link</span></div>
        </div>"#;

    const DETAIL_PAGE: &str = r#"
        <div class="main-info">
          <div class="title"><h1>Căn hộ Sunrise City 2PN view sông</h1></div>
          <div class="address">23 Nguyễn Hữu Thọ, Quận 7, TP. Hồ Chí Minh</div>
          <div class="price">3,2 tỷ</div>
        </div>
        <div class="info-attrs">
          <div class="info-attr"><span>Diện tích đất</span><span>76 m²</span></div>
          <div class="info-attr"><span>Phòng ngủ</span><span>2</span></div>
          <div class="info-attr"><span>Nhà tắm</span><span>2</span></div>
          <div class="info-attr"><span>Pháp lý</span><span>Sổ hồng</span></div>
          <div class="info-attr"><span>Ngày đăng</span><span>12/04/2024</span></div>
        </div>
        <div class="agent-name"><a href="/agent/1">Nguyễn Văn A</a></div>
        <div class="info-content-body">Gần trường học, siêu thị.</div>"#;

    fn adapter() -> MogiAdapter {
        MogiAdapter::new("https://mogi.vn/")
    }

    #[test]
    fn test_pagination() {
        let adapter = adapter();
        assert_eq!(
            adapter.build_page_url("https://mogi.vn/mua-nha-dat", 1),
            "https://mogi.vn/mua-nha-dat"
        );
        assert_eq!(
            adapter.build_page_url("https://mogi.vn/mua-nha-dat", 2),
            "https://mogi.vn/mua-nha-dat?p=2"
        );
    }

    #[test]
    fn test_extract_links_resolves_relative_urls() {
        let document = RenderedDocument::new("https://mogi.vn/mua-nha-dat", SEARCH_PAGE);
        let links = adapter().extract_links(&document);

        assert_eq!(
            links,
            vec![
                CandidateLink {
                    url: "https://mogi.vn/quan-7/mua-can-ho/can-ho-sunrise-id101".to_string(),
                    title: "Căn hộ Sunrise City 2PN".to_string(),
                },
                CandidateLink {
                    url: "https://mogi.vn/thu-duc/mua-nha/nha-pho-id102".to_string(),
                    title: "Nhà phố Thủ Đức".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_extract_details() {
        let url = "https://mogi.vn/quan-7/mua-can-ho/can-ho-sunrise-id101";
        let document = RenderedDocument::new(url, DETAIL_PAGE);
        let fields = adapter().extract_details(&document, url);

        assert_eq!(
            fields.get(&Field::Title).map(String::as_str),
            Some("Căn hộ Sunrise City 2PN view sông")
        );
        assert_eq!(fields.get(&Field::Price).map(String::as_str), Some("3,2 tỷ"));
        assert_eq!(fields.get(&Field::Area).map(String::as_str), Some("76 m²"));
        assert_eq!(fields.get(&Field::Legal).map(String::as_str), Some("Sổ hồng"));
        assert_eq!(fields.get(&Field::Seller).map(String::as_str), Some("Nguyễn Văn A"));
        assert!(!fields.contains_key(&Field::Frontage));
    }
}
