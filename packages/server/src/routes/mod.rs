pub mod ai;
pub mod analytics;
pub mod articles;
pub mod content;
pub mod health;
pub mod market;
pub mod scraper;

pub use ai::*;
pub use analytics::*;
pub use articles::*;
pub use content::*;
pub use health::*;
pub use market::*;
pub use scraper::*;
