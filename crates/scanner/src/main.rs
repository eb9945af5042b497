use anyhow::Result;
use std::sync::Arc;

use common::debank::DebankCollector;
use common::orchestrator::Orchestrator;
use common::page::GenericPageCollector;

mod cli;
mod metrics;
mod scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    let config = common::config::Config::load()?;

    let dispatch = common::observability::build_dispatch(&config.general.log_level);
    tracing::dispatcher::set_global_default(dispatch).map_err(anyhow::Error::msg)?;

    tracing::info!("debank_scanner starting");

    std::fs::create_dir_all(&config.storage.data_dir)?;

    let portfolio = Arc::new(DebankCollector::new(&config.portfolio));
    let page = Arc::new(GenericPageCollector::new(&config.page));
    let orchestrator = Arc::new(Orchestrator::new(&config, portfolio, page));

    // CLI commands run one action and exit immediately.
    let cmd = cli::parse_args(std::env::args()).map_err(anyhow::Error::msg)?;
    if cmd != cli::Command::Run {
        cli::run_command(&orchestrator, cmd).await?;
        return Ok(());
    }

    metrics::install_prometheus(config.observability.prometheus_port)?;
    metrics::describe();

    let (portfolio_tx, mut portfolio_rx) = tokio::sync::mpsc::channel::<()>(8);
    let (page_tx, mut page_rx) = tokio::sync::mpsc::channel::<()>(8);

    let scheduler_jobs = vec![
        scheduler::JobSpec {
            name: "portfolio_scrape".to_string(),
            interval: std::time::Duration::from_secs(config.schedule.portfolio_interval_secs),
            tick: portfolio_tx,
            run_immediately: true,
        },
        scheduler::JobSpec {
            name: "page_scrape".to_string(),
            interval: std::time::Duration::from_secs(config.schedule.page_interval_secs),
            tick: page_tx,
            run_immediately: false,
        },
    ];

    // Worker loops spawn BEFORE the scheduler so an immediate tick is received.
    tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move {
            while portfolio_rx.recv().await.is_some() {
                let span = tracing::info_span!("job_run", job = "portfolio_scrape");
                let _g = span.enter();
                match orchestrator.run_portfolio_once().await {
                    Ok(report) => tracing::info!(
                        addresses = report.addresses.len(),
                        total_value = report.total_value,
                        change = report.total_value_change,
                        "portfolio_scrape done"
                    ),
                    Err(e) => tracing::error!(error = %e, "portfolio_scrape failed"),
                }
            }
        }
    });

    tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move {
            while page_rx.recv().await.is_some() {
                let span = tracing::info_span!("job_run", job = "page_scrape");
                let _g = span.enter();
                match orchestrator.run_page_once().await {
                    Ok((page, _diff)) => {
                        tracing::info!(links = page.links.len(), "page_scrape done");
                    }
                    Err(e) => tracing::error!(error = %e, "page_scrape failed"),
                }
            }
        }
    });

    let _scheduler_handles = scheduler::start(scheduler_jobs);
    tracing::info!(
        portfolio_interval_secs = config.schedule.portfolio_interval_secs,
        page_interval_secs = config.schedule.page_interval_secs,
        "scheduler started"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down (force exit in 5s)");

    // Give spawned tasks a moment to finish, then force exit.
    tokio::spawn(async {
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        tracing::warn!("force exit after timeout");
        std::process::exit(0);
    });

    Ok(())
}
