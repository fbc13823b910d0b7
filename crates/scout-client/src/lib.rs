pub mod firecrawl;

pub use firecrawl::FirecrawlExtractor;
