pub mod fetcher;
pub mod llm;
pub mod scrape;

pub use fetcher::ReqwestFetcher;
pub use llm::AnthropicSummarizer;
pub use scrape::FeedScraper;
