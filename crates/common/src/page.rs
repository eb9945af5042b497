//! Generic page collector: links, title and meta description from an
//! arbitrary URL, for the link-diff variant of the scraper.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use fantoccini::Locator;
use futures::future::join_all;

use crate::config::PageScrape;
use crate::driver::ScraperDriver;
use crate::types::{LinkRecord, ScrapedPage};

#[async_trait]
pub trait PageCollector: Send + Sync {
    async fn collect(&self) -> Result<ScrapedPage>;
}

pub struct GenericPageCollector {
    target_url: String,
    max_links: usize,
}

impl GenericPageCollector {
    pub fn new(cfg: &PageScrape) -> Self {
        Self {
            target_url: cfg.target_url.clone(),
            max_links: cfg.max_links,
        }
    }
}

#[async_trait]
impl PageCollector for GenericPageCollector {
    async fn collect(&self) -> Result<ScrapedPage> {
        let driver = ScraperDriver::new().await?;
        let result = scrape_page(&driver.client, &self.target_url, self.max_links).await;
        driver.shutdown().await;
        result
    }
}

async fn scrape_page(
    client: &fantoccini::Client,
    url: &str,
    max_links: usize,
) -> Result<ScrapedPage> {
    tracing::info!(url, "scraping page");
    client.goto(url).await?;

    // Give client-side rendering a moment to settle.
    tokio::time::sleep(Duration::from_secs(2)).await;

    let title = client.title().await?;
    let description = match client
        .find(Locator::Css(r#"meta[name="description"]"#))
        .await
    {
        Ok(element) => element.attr("content").await?.unwrap_or_default(),
        Err(_) => String::new(),
    };

    let anchors = client.find_all(Locator::Css("a")).await?;
    let anchors = &anchors[..anchors.len().min(max_links)];

    let texts = join_all(anchors.iter().map(fantoccini::elements::Element::text)).await;
    let hrefs = join_all(anchors.iter().map(|a| a.attr("href"))).await;

    let now = Utc::now();
    let links = texts
        .into_iter()
        .zip(hrefs)
        .filter_map(|(text, href)| {
            let text = text.ok()?;
            let href = href.ok()??;
            Some(LinkRecord {
                text: text.trim().to_string(),
                href,
                timestamp: now,
            })
        })
        .collect();

    Ok(ScrapedPage {
        title,
        description,
        links,
        scraped_at: now,
    })
}
