pub mod rss;

pub use rss::{clean_html_summary, fetch_feed};
