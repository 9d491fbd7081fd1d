pub mod browser_extractor;
pub mod browser_pool;
pub mod html_extractor;
pub mod selectors;

pub use browser_extractor::BrowserExtractor;
pub use browser_pool::BrowserPool;
pub use html_extractor::{FallbackExtractor, HtmlExtractor};
