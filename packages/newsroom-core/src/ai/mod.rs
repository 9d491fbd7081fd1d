pub mod enrichment_service;
pub mod processor;
pub mod provider;

pub use enrichment_service::{EnrichmentOutcome, EnrichmentService};
pub use processor::{AiProcessor, ProcessorRunOutcome, ProcessorStats};
pub use provider::{AiOptions, AiProviderClient};
