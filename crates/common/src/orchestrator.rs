//! Run coordination: load the baseline, collect, persist, compare. Used
//! identically by the scheduled scanner and the web triggers.
//!
//! There is deliberately no mutual exclusion here: two racing triggers both
//! read and write the latest alias with a last-writer-wins outcome.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::compare::{compare, diff_links};
use crate::config::Config;
use crate::debank::PortfolioCollector;
use crate::page::PageCollector;
use crate::store::{RollingStore, SnapshotStore};
use crate::types::{ComparisonReport, PageDiff, ScrapedPage, SnapshotSet};

/// Read-side view of the generic page captures.
pub struct PageData {
    pub current: Option<ScrapedPage>,
    pub previous: Option<ScrapedPage>,
    pub diff: Option<PageDiff>,
}

pub struct Orchestrator {
    portfolio: Arc<dyn PortfolioCollector>,
    page: Arc<dyn PageCollector>,
    snapshots: SnapshotStore,
    pages: RollingStore,
    addresses: Vec<String>,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        portfolio: Arc<dyn PortfolioCollector>,
        page: Arc<dyn PageCollector>,
    ) -> Self {
        Self {
            portfolio,
            page,
            snapshots: SnapshotStore::new(
                &config.storage.data_dir,
                &config.storage.snapshot_prefix,
                &config.storage.latest_name,
            ),
            pages: RollingStore::new(&config.storage.data_dir),
            addresses: config.portfolio.addresses.clone(),
        }
    }

    /// One full portfolio run: previous := latest alias, collect, persist,
    /// compare. A collection failure aborts before anything is persisted;
    /// a partial set must not become the next baseline.
    pub async fn run_portfolio_once(&self) -> Result<ComparisonReport> {
        let previous: Option<SnapshotSet> = self.snapshots.load_latest()?;

        let current = match self.portfolio.collect(&self.addresses).await {
            Ok(set) => set,
            Err(error) => {
                metrics::counter!("scanner_scrape_failures_total").increment(1);
                return Err(error.context("portfolio collection failed"));
            }
        };

        self.snapshots
            .save(&current, Utc::now())
            .context("failed to persist snapshot set")?;

        let report = compare(&current, previous.as_ref());

        metrics::counter!("scanner_scrape_runs_total").increment(1);
        metrics::counter!("scanner_addresses_scraped_total").increment(current.len() as u64);
        metrics::gauge!("scanner_portfolio_total_usd").set(report.total_value);

        Ok(report)
    }

    /// One generic page run: collect, rotate the current capture into the
    /// previous slot, diff against the displaced baseline.
    pub async fn run_page_once(&self) -> Result<(ScrapedPage, PageDiff)> {
        let current = match self.page.collect().await {
            Ok(page) => page,
            Err(error) => {
                metrics::counter!("scanner_scrape_failures_total").increment(1);
                return Err(error.context("page collection failed"));
            }
        };

        let displaced = self.pages.rotate_and_save(&current)?;
        let diff = diff_links(displaced.as_ref(), &current);

        metrics::counter!("scanner_scrape_runs_total").increment(1);
        metrics::gauge!("scanner_page_links").set(current.links.len() as f64);

        Ok((current, diff))
    }

    /// Recomputes the comparison report on demand from the latest snapshot
    /// and the second-newest timestamped file. None when no snapshot exists.
    pub fn portfolio_comparison(&self) -> Result<Option<ComparisonReport>> {
        let Some(latest) = self.snapshots.load_latest::<SnapshotSet>()? else {
            return Ok(None);
        };
        let previous: Option<SnapshotSet> = self.snapshots.load_previous()?;
        Ok(Some(compare(&latest, previous.as_ref())))
    }

    pub fn latest_snapshot(&self) -> Result<Option<SnapshotSet>> {
        Ok(self.snapshots.load_latest()?)
    }

    pub fn page_data(&self) -> Result<PageData> {
        let current: Option<ScrapedPage> = self.pages.load_current()?;
        let previous: Option<ScrapedPage> = self.pages.load_previous()?;
        let diff = match (&current, &previous) {
            (Some(curr), Some(prev)) => Some(diff_links(Some(prev), curr)),
            _ => None,
        };
        Ok(PageData {
            current,
            previous,
            diff,
        })
    }

    /// Snapshot history names, newest first.
    pub fn history(&self) -> Result<Vec<String>> {
        Ok(self.snapshots.list()?)
    }
}
