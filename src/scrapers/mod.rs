pub mod bds123;
pub mod browser;
pub mod extract;
pub mod http;
pub mod mogi;
pub mod muaban;
pub mod registry;
pub mod traits;
pub mod types;

pub use bds123::Bds123Adapter;
pub use browser::BrowserFetcher;
pub use http::HttpFetcher;
pub use mogi::MogiAdapter;
pub use muaban::MuabanAdapter;
pub use registry::AdapterRegistry;
pub use traits::{Fetcher, SourceAdapter};
pub use types::{FetchOutcome, RenderedDocument};
