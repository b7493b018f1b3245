pub mod content;
pub mod dom;
pub mod extract;
pub mod harvest;
pub mod http;
pub mod images;
pub mod probe;
pub mod render;

pub use content::ContentFetcher;
pub use harvest::PageHarvester;
pub use http::{HttpFetcher, ProxiedFetch};
pub use images::ReqwestImageDownloader;
pub use probe::{ProbeResult, probe_selector};
pub use render::{NoRender, Render, engine_available};

#[cfg(feature = "browser")]
pub use render::BrowserRenderer;
