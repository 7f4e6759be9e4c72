use crate::error::CrawlError;
use crate::scrapers::traits::Fetcher;
use crate::scrapers::types::{FetchOutcome, RenderedDocument};
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Dismisses the most common cookie banners before the DOM is captured.
const ACCEPT_COOKIES_JS: &str = r#"
    const button = document.querySelector('button[id*="accept"], button[class*="accept"], button[id*="dong-y"]');
    if (button) button.click();
"#;

/// Max tabs rendering at once, regardless of the requested concurrency.
const MAX_OPEN_TABS: usize = 4;

/// Fetcher that renders pages in headless Chrome
pub struct BrowserFetcher {
    browser: Arc<Browser>,
    render_wait: Duration,
    tabs: Arc<Semaphore>,
}

impl BrowserFetcher {
    /// Launch a headless Chrome instance
    pub fn new(render_wait: Duration) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self {
            browser: Arc::new(browser),
            render_wait,
            tabs: Arc::new(Semaphore::new(MAX_OPEN_TABS)),
        })
    }

    /// Blocking render of one page; runs on the blocking thread pool.
    /// The tab is closed whether or not the render succeeded.
    fn render(browser: &Browser, url: &str, render_wait: Duration) -> Result<RenderedDocument> {
        let tab = browser.new_tab().context("Failed to open tab")?;
        let rendered = Self::capture(&tab, url, render_wait);

        if let Err(e) = tab.close(true) {
            debug!(url, error = %e, "Failed to close tab");
        }

        rendered
    }

    fn capture(tab: &Tab, url: &str, render_wait: Duration) -> Result<RenderedDocument> {
        tab.navigate_to(url).context("Navigation failed")?;
        tab.wait_until_navigated()
            .context("Page did not finish loading")?;

        // Give client-side rendering time to settle
        thread::sleep(render_wait);
        let _ = tab.evaluate(ACCEPT_COOKIES_JS, false);

        let html = tab.get_content().context("Failed to read page HTML")?;
        debug!(url, bytes = html.len(), "Rendered page");

        Ok(RenderedDocument::new(url, html))
    }
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    async fn fetch_one(&self, url: &str) -> FetchOutcome {
        let _permit = match self.tabs.acquire().await {
            Ok(permit) => permit,
            Err(e) => return FetchOutcome::failure(url, e),
        };

        let browser = Arc::clone(&self.browser);
        let render_wait = self.render_wait;
        let target = url.to_string();
        let rendered =
            tokio::task::spawn_blocking(move || Self::render(&browser, &target, render_wait)).await;

        match rendered {
            Ok(Ok(document)) => FetchOutcome::success(document),
            Ok(Err(e)) => {
                warn!(url, error = %format!("{e:#}"), "Render failed");
                FetchOutcome::failure(url, format!("{e:#}"))
            }
            Err(join_error) => FetchOutcome::failure(url, join_error),
        }
    }

    async fn fetch_many(
        &self,
        urls: &[String],
        concurrency: usize,
    ) -> Result<Vec<FetchOutcome>, CrawlError> {
        let budget = Arc::new(Semaphore::new(concurrency.max(1)));
        let fetches = urls.iter().cloned().map(|url| {
            let budget = Arc::clone(&budget);
            async move {
                let _permit = budget.acquire_owned().await;
                self.fetch_one(&url).await
            }
        });
        Ok(futures::future::join_all(fetches).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_tabs(browser: &Browser) -> usize {
        browser.get_tabs().lock().map(|tabs| tabs.len()).unwrap_or(0)
    }

    #[test]
    #[ignore = "launches a local Chrome"]
    fn test_failed_render_closes_tab() {
        let fetcher = BrowserFetcher::new(Duration::from_millis(10)).unwrap();
        let before = open_tabs(&fetcher.browser);

        let rendered = BrowserFetcher::render(&fetcher.browser, "not a url", Duration::ZERO);
        assert!(rendered.is_err());

        // Target destruction is reported asynchronously
        for _ in 0..20 {
            if open_tabs(&fetcher.browser) == before {
                break;
            }
            thread::sleep(Duration::from_millis(100));
        }
        assert_eq!(open_tabs(&fetcher.browser), before);
    }
}
