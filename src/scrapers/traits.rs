use crate::error::CrawlError;
use crate::models::{CandidateLink, FieldMap};
use crate::scrapers::types::{FetchOutcome, RenderedDocument};
use async_trait::async_trait;

/// Per-site extraction rules.
/// One implementation per source, looked up by name in the adapter registry.
pub trait SourceAdapter: Send + Sync {
    /// Name of the source this adapter handles (e.g. `mogi.vn`)
    fn name(&self) -> &str;

    /// URL of page `page` (1-based) of a search listing
    fn build_page_url(&self, search_url: &str, page: usize) -> String;

    /// Listing links found on a search page
    fn extract_links(&self, document: &RenderedDocument) -> Vec<CandidateLink>;

    /// Raw field values found on a listing's detail page
    fn extract_details(&self, document: &RenderedDocument, url: &str) -> FieldMap;
}

/// Page fetching capability.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch and render a single page
    async fn fetch_one(&self, url: &str) -> FetchOutcome;

    /// Fetch several pages with at most `concurrency` in flight.
    ///
    /// Outcomes are returned in the order of `urls`. An `Err` means the
    /// whole batch could not be attempted.
    async fn fetch_many(
        &self,
        urls: &[String],
        concurrency: usize,
    ) -> Result<Vec<FetchOutcome>, CrawlError>;
}
