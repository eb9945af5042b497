//! DeBank profile collector. Brittle by nature: it drives a real browser
//! against class-name fragments of a third-party site. The comparison engine
//! never sees any of this; it only receives well-formed snapshots.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use fantoccini::elements::Element;
use fantoccini::{Client, Locator};
use regex::Regex;
use reqwest::Url;

use crate::config::Portfolio;
use crate::driver::ScraperDriver;
use crate::types::{AddressSnapshot, ProjectBalance, SnapshotSet, WalletBalance};

const TOTAL_BALANCE_SELECTOR: &str = r#"[class*="HeaderInfo_curveEnable"]"#;
const PORTFOLIO_SELECTOR: &str = r#"[class*="Portfolio_defiItem"]"#;
const WALLET_SELECTOR: &str = r#"[class*="TokenWallet_container"]"#;
const PROJECT_SELECTOR: &str = r#"[class*="Project_project"]"#;
const PROJECT_NAME_SELECTOR: &str = r#"[class*="ProjectTitle_name"]"#;

static DOLLAR_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[\d,]+").expect("static regex"));

/// First `$1,234`-style figure in a text blob, as displayed.
fn first_dollar_amount(text: &str) -> Option<&str> {
    DOLLAR_AMOUNT.find(text).map(|m| m.as_str())
}

/// `$1,234,567` → 1234567.0; anything unparsable → 0.0.
pub fn parse_amount(text: &str) -> f64 {
    text.replace(['$', ','], "").parse().unwrap_or(0.0)
}

/// Produces one `SnapshotSet` per collection run. Implemented by the real
/// browser-backed collector; tests substitute their own.
#[async_trait]
pub trait PortfolioCollector: Send + Sync {
    async fn collect(&self, addresses: &[String]) -> Result<SnapshotSet>;
}

pub struct DebankCollector {
    profile_url: String,
    request_delay: Duration,
    page_timeout: Duration,
}

impl DebankCollector {
    pub fn new(cfg: &Portfolio) -> Self {
        Self {
            profile_url: cfg.profile_url.clone(),
            request_delay: Duration::from_millis(cfg.request_delay_ms),
            page_timeout: Duration::from_millis(cfg.page_timeout_ms),
        }
    }

    async fn scrape_address(&self, client: &Client, address: &str) -> Result<AddressSnapshot> {
        tracing::info!(address, "scraping profile");

        let url = Url::parse(&format!("{}/{address}", self.profile_url))?;
        client.goto(url.as_str()).await?;

        let (total_balance, total_balance_usd) = self.read_total_balance(client, address).await;

        // The portfolio section is mandatory: without it the capture would
        // be an empty shell, so the whole run fails instead.
        client
            .wait()
            .at_most(self.page_timeout)
            .for_element(Locator::Css(PORTFOLIO_SELECTOR))
            .await
            .with_context(|| format!("portfolio section did not load for {address}"))?;

        let wallet = self.read_wallet(client).await;
        let projects = self.read_projects(client).await?;

        tracing::info!(
            address,
            total = %total_balance,
            projects = projects.len(),
            "profile scraped"
        );

        Ok(AddressSnapshot {
            address: address.to_string(),
            total_balance,
            total_balance_usd,
            wallet,
            projects,
            scraped_at: Utc::now(),
        })
    }

    /// Reads the headline balance, polling until the curve widget shows a
    /// real figure. Failure degrades to $0: the element is flaky and a
    /// missing headline should not abort the run.
    async fn read_total_balance(&self, client: &Client, address: &str) -> (String, f64) {
        let deadline = tokio::time::Instant::now() + self.page_timeout;

        let element = match client
            .wait()
            .at_most(self.page_timeout)
            .for_element(Locator::Css(TOTAL_BALANCE_SELECTOR))
            .await
        {
            Ok(element) => element,
            Err(error) => {
                tracing::warn!(address, %error, "total balance element not found");
                return ("$0".to_string(), 0.0);
            }
        };

        loop {
            match element.text().await {
                Ok(text) => {
                    if let Some(amount) = first_dollar_amount(&text) {
                        if amount != "$0" {
                            return (amount.to_string(), parse_amount(amount));
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!(address, %error, "failed to read total balance text");
                    return ("$0".to_string(), 0.0);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(address, "total balance stayed at $0 until timeout");
                return ("$0".to_string(), 0.0);
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    async fn read_wallet(&self, client: &Client) -> Option<WalletBalance> {
        let element = client.find(Locator::Css(WALLET_SELECTOR)).await.ok()?;
        let text = element.text().await.ok()?;
        let amount = first_dollar_amount(&text)?;
        Some(WalletBalance {
            amount: amount.to_string(),
            amount_usd: parse_amount(amount),
        })
    }

    async fn read_projects(&self, client: &Client) -> Result<Vec<ProjectBalance>> {
        let elements = client.find_all(Locator::Css(PROJECT_SELECTOR)).await?;

        let mut projects = Vec::with_capacity(elements.len());
        for element in &elements {
            let name = self.read_project_name(element).await;
            let text = element.text().await.unwrap_or_default();
            let amount = first_dollar_amount(&text).unwrap_or("$0");
            projects.push(ProjectBalance {
                name,
                amount: amount.to_string(),
                amount_usd: parse_amount(amount),
            });
        }
        Ok(projects)
    }

    async fn read_project_name(&self, project: &Element) -> String {
        if let Ok(name_element) = project.find(Locator::Css(PROJECT_NAME_SELECTOR)).await {
            if let Ok(name) = name_element.text().await {
                let name = name.trim();
                if !name.is_empty() {
                    return name.to_string();
                }
            }
        }

        // Fallback when the title class is missing: first short non-dollar
        // text node inside the block.
        if let Ok(candidates) = project.find_all(Locator::Css("span, div")).await {
            for candidate in &candidates {
                if let Ok(text) = candidate.text().await {
                    let text = text.trim();
                    if !text.is_empty() && !text.contains('$') && text.len() < 20 {
                        return text.to_string();
                    }
                }
            }
        }
        "Unknown".to_string()
    }
}

#[async_trait]
impl PortfolioCollector for DebankCollector {
    /// Sequential across addresses, with a fixed inter-request delay to stay
    /// under the site's rate limits. Any per-address failure aborts the run;
    /// a partial set must never be persisted as if it were complete.
    async fn collect(&self, addresses: &[String]) -> Result<SnapshotSet> {
        let driver = ScraperDriver::new().await?;

        let mut set = SnapshotSet::new();
        let mut failure = None;
        for (i, address) in addresses.iter().enumerate() {
            match self.scrape_address(&driver.client, address).await {
                Ok(snapshot) => set.insert(snapshot),
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
            if i + 1 < addresses.len() {
                tokio::time::sleep(self.request_delay).await;
            }
        }

        driver.shutdown().await;
        match failure {
            Some(error) => Err(error),
            None => Ok(set),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_strips_dollar_and_commas() {
        assert_eq!(parse_amount("$1,234,567"), 1234567.0);
        assert_eq!(parse_amount("$42"), 42.0);
        assert_eq!(parse_amount("$0"), 0.0);
    }

    #[test]
    fn test_parse_amount_unparsable_is_zero() {
        assert_eq!(parse_amount(""), 0.0);
        assert_eq!(parse_amount("n/a"), 0.0);
        assert_eq!(parse_amount("$"), 0.0);
    }

    #[test]
    fn test_first_dollar_amount_finds_first_match() {
        assert_eq!(first_dollar_amount("Wallet $1,234 and $99"), Some("$1,234"));
        assert_eq!(first_dollar_amount("no money here"), None);
    }

    #[test]
    fn test_first_dollar_amount_ignores_decimals_suffix() {
        // The display regex only captures the integer part, like the page
        // headline widget shows.
        assert_eq!(first_dollar_amount("$1,234.56"), Some("$1,234"));
    }
}
