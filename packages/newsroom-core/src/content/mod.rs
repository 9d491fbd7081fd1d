pub mod content_processor;

pub use content_processor::{ContentProcessor, ContentProcessorStats};
