use serde::{Deserialize, Serialize};

/// A fetched and rendered page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedDocument {
    /// Final URL of the page
    pub url: String,
    /// Rendered HTML
    pub html: String,
}

impl RenderedDocument {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }
}

/// Result of fetching one URL. Failures are per-URL and never fatal.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub url: String,
    pub result: Result<RenderedDocument, String>,
}

impl FetchOutcome {
    pub fn success(document: RenderedDocument) -> Self {
        Self {
            url: document.url.clone(),
            result: Ok(document),
        }
    }

    pub fn failure(url: impl Into<String>, error: impl ToString) -> Self {
        Self {
            url: url.into(),
            result: Err(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}
