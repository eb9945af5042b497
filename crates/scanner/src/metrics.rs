use anyhow::Result;
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

pub fn describe() {
    describe_counter!(
        "scanner_scrape_runs_total",
        "Number of completed collection runs (portfolio and page)."
    );
    describe_counter!(
        "scanner_scrape_failures_total",
        "Number of collection runs that failed before persisting."
    );
    describe_counter!(
        "scanner_addresses_scraped_total",
        "Number of address profiles captured across all runs."
    );
    describe_gauge!(
        "scanner_portfolio_total_usd",
        "Aggregate portfolio value (USD) from the latest run."
    );
    describe_gauge!(
        "scanner_page_links",
        "Links captured by the latest page scrape."
    );
}

pub fn install_prometheus(port: u16) -> Result<PrometheusHandle> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    Ok(PrometheusBuilder::new()
        .with_http_listener(addr)
        .install_recorder()?)
}
