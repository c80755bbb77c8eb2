//! Walks the presidential-actions feed: paginated listing pages, then the
//! individual article pages for their full text.

use std::collections::HashSet;
use std::time::Duration;

use eotrack_core::error::AppError;
use eotrack_core::models::RawRecord;
use eotrack_core::quality::{FETCH_ERROR_MARKER, NO_CONTENT_MARKER};
use eotrack_core::traits::Fetcher;
use futures::{StreamExt, stream};
use scraper::{ElementRef, Html, Selector};

/// The listing page of the tracked feed.
pub const BASE_URL: &str = "https://www.whitehouse.gov/presidential-actions/";

// The source has changed markup several times; each cascade is tried in
// order and the first selector with a hit wins.
const ITEM_SELECTORS: &[&str] = &["article.news-item", ".news-item", "article", ".post"];
const TITLE_SELECTORS: &[&str] = &[".news-item__title", "h2 a", "h3 a", ".entry-title a"];
const DATE_SELECTORS: &[&str] = &[".news-item__date", ".entry-date", "time"];
const CONTENT_SELECTORS: &[&str] = &[
    "main#main-content",
    ".entry-content",
    ".post-content",
    "article",
];

/// One entry of a listing page, before its article content is fetched.
#[derive(Debug, Clone)]
pub struct ListingItem {
    pub title: Option<String>,
    pub link: String,
    pub date: Option<String>,
    pub page: u32,
}

fn first_match<'a>(scope: &ElementRef<'a>, selectors: &[&str]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|raw| {
        let selector = Selector::parse(raw).unwrap();
        scope.select(&selector).next()
    })
}

fn text_of(element: &ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<String>();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn page_number_from_href(href: &str) -> Option<u32> {
    let idx = href.find("/page/")?;
    let digits: String = href[idx + "/page/".len()..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Detect the total page count from the listing's pagination block,
/// falling back to any `/page/N` link on the page, else 1.
pub fn detect_total_pages(html: &str) -> u32 {
    let doc = Html::parse_document(html);

    let pagination = Selector::parse("nav.wp-block-query-pagination a[href]").unwrap();
    if let Some(max) = doc
        .select(&pagination)
        .filter_map(|a| a.value().attr("href").and_then(page_number_from_href))
        .max()
    {
        return max;
    }

    let any_link = Selector::parse("a[href]").unwrap();
    doc.select(&any_link)
        .filter_map(|a| a.value().attr("href").and_then(page_number_from_href))
        .max()
        .unwrap_or(1)
}

/// Extract the listing items of one feed page.
///
/// An empty result usually means pagination ran past the last page.
pub fn parse_listing(html: &str, page: u32) -> Vec<ListingItem> {
    let doc = Html::parse_document(html);
    let mut found = Vec::new();

    for raw in ITEM_SELECTORS {
        let selector = Selector::parse(raw).unwrap();
        let items: Vec<ElementRef<'_>> = doc.select(&selector).collect();
        if items.is_empty() {
            continue;
        }

        for item in items {
            let Some(title_elem) = first_match(&item, TITLE_SELECTORS) else {
                tracing::debug!(page, "Listing item without a recognizable title element");
                continue;
            };
            let Some(href) = title_elem.value().attr("href") else {
                tracing::debug!(page, "Listing item whose title carries no link");
                continue;
            };

            found.push(ListingItem {
                title: text_of(&title_elem),
                link: href.to_string(),
                date: first_match(&item, DATE_SELECTORS).and_then(|e| text_of(&e)),
                page,
            });
        }
        break;
    }

    found
}

/// Extract the article body: non-empty paragraphs of the first matching
/// content area (falling back to all paragraphs), joined with newlines.
pub fn extract_content(html: &str) -> String {
    let doc = Html::parse_document(html);
    let paragraph = Selector::parse("p").unwrap();

    let area = CONTENT_SELECTORS.iter().find_map(|raw| {
        let selector = Selector::parse(raw).unwrap();
        doc.select(&selector).next()
    });

    let paragraphs: Vec<String> = match area {
        Some(area) => area.select(&paragraph).filter_map(|p| text_of(&p)).collect(),
        None => doc.select(&paragraph).filter_map(|p| text_of(&p)).collect(),
    };

    if paragraphs.is_empty() {
        NO_CONTENT_MARKER.to_string()
    } else {
        paragraphs.join("\n")
    }
}

/// Walks the feed and produces candidate records for the dataset store.
#[derive(Clone)]
pub struct FeedScraper<F: Fetcher> {
    fetcher: F,
    base_url: String,
    page_delay: Duration,
    concurrency: usize,
}

impl<F: Fetcher> FeedScraper<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            base_url: BASE_URL.to_string(),
            page_delay: Duration::from_secs(2),
            concurrency: 4,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Collect candidate records, skipping links already persisted.
    ///
    /// A failing listing page ends the walk with what was gathered so far;
    /// a failing article fetch is isolated to its record, which is kept
    /// with the error marker as content. Candidates come back in discovery
    /// order even though article fetches run concurrently.
    pub async fn collect(&self, known_links: &HashSet<String>) -> Result<Vec<RawRecord>, AppError> {
        let first_page = self.fetcher.fetch(&self.base_url).await?;
        let total_pages = detect_total_pages(&first_page);
        tracing::info!(total_pages, "Detected listing pages");

        let mut pending: Vec<ListingItem> = Vec::new();
        for page in 1..=total_pages {
            let html = if page == 1 {
                first_page.clone()
            } else {
                if !self.page_delay.is_zero() {
                    tokio::time::sleep(self.page_delay).await;
                }
                let url = format!("{}page/{}/", self.base_url, page);
                match self.fetcher.fetch(&url).await {
                    Ok(html) => html,
                    Err(err) => {
                        tracing::warn!(page, error = %err, "Listing page fetch failed; stopping walk");
                        break;
                    }
                }
            };

            let items = parse_listing(&html, page);
            if items.is_empty() {
                tracing::debug!(page, "No items found; assuming last page");
                break;
            }

            for item in items {
                if known_links.contains(&item.link) {
                    tracing::debug!(link = %item.link, "Skipping already collected item");
                    continue;
                }
                pending.push(item);
            }
        }

        tracing::info!(new_items = pending.len(), "Listing walk complete");

        let mut indexed: Vec<(usize, RawRecord)> = stream::iter(pending.into_iter().enumerate())
            .map(|(i, item)| {
                let fetcher = self.fetcher.clone();
                async move {
                    let content = match fetcher.fetch(&item.link).await {
                        Ok(html) => extract_content(&html),
                        Err(err) => {
                            tracing::warn!(
                                link = %item.link,
                                error = %err,
                                "Content fetch failed; keeping record with error marker"
                            );
                            FETCH_ERROR_MARKER.to_string()
                        }
                    };
                    let record = RawRecord {
                        title: item.title,
                        link: Some(item.link),
                        date: item.date,
                        content: Some(content),
                        page_number: Some(item.page),
                    };
                    (i, record)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        indexed.sort_by_key(|(i, _)| *i);
        Ok(indexed.into_iter().map(|(_, record)| record).collect())
    }
}
