mod api;

use anyhow::Result;
use askama::Template;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use common::debank::DebankCollector;
use common::orchestrator::Orchestrator;
use common::page::GenericPageCollector;
use common::types::{AddressComparison, ComparisonReport};

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub cron_secret: Option<String>,
    pub started_at: Instant,
}

// --- Templates ---

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate;

#[derive(Template)]
#[template(path = "partials/summary.html")]
struct SummaryTemplate {
    report: Option<ComparisonReport>,
}

#[derive(Template)]
#[template(path = "partials/addresses.html")]
struct AddressesTemplate {
    addresses: Vec<AddressComparison>,
}

// --- Handlers ---

async fn index() -> impl IntoResponse {
    Html(DashboardTemplate.to_string())
}

async fn summary_partial(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.portfolio_comparison() {
        Ok(report) => Html(SummaryTemplate { report }.to_string()).into_response(),
        Err(error) => {
            tracing::error!(%error, "failed to build summary partial");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn addresses_partial(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.portfolio_comparison() {
        Ok(report) => {
            let addresses = report.map(|r| r.addresses).unwrap_or_default();
            Html(AddressesTemplate { addresses }.to_string()).into_response()
        }
        Err(error) => {
            tracing::error!(%error, "failed to build addresses partial");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// --- Router ---

pub fn create_router_with_state(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/partials/summary", get(summary_partial))
        .route("/partials/addresses", get(addresses_partial))
        .route("/api/health", get(api::health))
        .route("/api/cron", get(api::cron))
        .route("/api/scrape", post(api::scrape))
        .route("/api/data", get(api::data))
        .route("/api/comparison", get(api::comparison))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    // Use the [web] section if present, otherwise defaults.
    let config = common::config::Config::load()?;
    let web_port = config.web.as_ref().map_or(8080, |w| w.port);
    let web_host = config
        .web
        .as_ref()
        .map_or("0.0.0.0".to_string(), |w| w.host.clone());
    let cron_secret = config.web.as_ref().and_then(|w| w.cron_secret.clone());

    std::fs::create_dir_all(&config.storage.data_dir)?;

    let portfolio = Arc::new(DebankCollector::new(&config.portfolio));
    let page = Arc::new(GenericPageCollector::new(&config.page));
    let orchestrator = Arc::new(Orchestrator::new(&config, portfolio, page));

    let state = Arc::new(AppState {
        orchestrator,
        cron_secret,
        started_at: Instant::now(),
    });

    let app = create_router_with_state(state);
    let addr: SocketAddr = format!("{web_host}:{web_port}").parse()?;
    tracing::info!("dashboard listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use common::config::Config;
    use common::debank::PortfolioCollector;
    use common::page::PageCollector;
    use common::types::{AddressSnapshot, LinkRecord, ScrapedPage, SnapshotSet};
    use std::sync::Mutex;

    struct StubPortfolio {
        runs: Mutex<Vec<SnapshotSet>>,
    }

    #[async_trait]
    impl PortfolioCollector for StubPortfolio {
        async fn collect(&self, _addresses: &[String]) -> anyhow::Result<SnapshotSet> {
            let mut runs = self.runs.lock().unwrap();
            if runs.is_empty() {
                anyhow::bail!("browser session failed");
            }
            Ok(runs.remove(0))
        }
    }

    struct StubPage {
        runs: Mutex<Vec<ScrapedPage>>,
    }

    #[async_trait]
    impl PageCollector for StubPage {
        async fn collect(&self) -> anyhow::Result<ScrapedPage> {
            let mut runs = self.runs.lock().unwrap();
            if runs.is_empty() {
                anyhow::bail!("browser session failed");
            }
            Ok(runs.remove(0))
        }
    }

    fn test_config(data_dir: &std::path::Path) -> Config {
        let toml = format!(
            r#"
[general]
log_level = "info"

[portfolio]
addresses = ["0xa", "0xb"]
profile_url = "https://debank.com/profile"
request_delay_ms = 1
page_timeout_ms = 1000

[page]
target_url = "https://example.com"
max_links = 20

[storage]
data_dir = "{}"
snapshot_prefix = "debank-data"
latest_name = "debank-latest.json"

[schedule]
portfolio_interval_secs = 21600
page_interval_secs = 3600

[observability]
prometheus_port = 9095
"#,
            data_dir.display()
        );
        Config::from_toml_str(&toml).unwrap()
    }

    fn app(
        portfolio_runs: Vec<SnapshotSet>,
        page_runs: Vec<ScrapedPage>,
        cron_secret: Option<String>,
    ) -> Router {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        // Leak the tempdir to keep it alive for the test.
        std::mem::forget(dir);

        let config = test_config(&path);
        let orchestrator = Arc::new(Orchestrator::new(
            &config,
            Arc::new(StubPortfolio {
                runs: Mutex::new(portfolio_runs),
            }),
            Arc::new(StubPage {
                runs: Mutex::new(page_runs),
            }),
        ));
        let state = Arc::new(AppState {
            orchestrator,
            cron_secret,
            started_at: Instant::now(),
        });
        create_router_with_state(state)
    }

    fn snapshot_set(entries: &[(&str, f64)]) -> SnapshotSet {
        entries
            .iter()
            .map(|(address, total)| AddressSnapshot {
                address: (*address).to_string(),
                total_balance: format!("${total}"),
                total_balance_usd: *total,
                wallet: None,
                projects: vec![],
                scraped_at: Utc::now(),
            })
            .collect()
    }

    fn scraped_page(hrefs: &[&str]) -> ScrapedPage {
        ScrapedPage {
            title: "Example".to_string(),
            description: String::new(),
            links: hrefs
                .iter()
                .map(|href| LinkRecord {
                    text: (*href).to_string(),
                    href: (*href).to_string(),
                    timestamp: Utc::now(),
                })
                .collect(),
            scraped_at: Utc::now(),
        }
    }

    pub(crate) fn portfolio_app(runs: Vec<Vec<(&str, f64)>>) -> Router {
        let runs = runs.iter().map(|r| snapshot_set(r)).collect();
        app(runs, vec![], None)
    }

    /// Portfolio collector with no scripted runs: any collection fails.
    pub(crate) fn failing_app() -> Router {
        app(vec![], vec![], None)
    }

    pub(crate) fn page_app(runs: Vec<Vec<&str>>) -> Router {
        let runs = runs.iter().map(|r| scraped_page(r)).collect();
        app(vec![], runs, None)
    }

    pub(crate) fn secured_page_app(secret: &str, runs: Vec<Vec<&str>>) -> Router {
        let runs = runs.iter().map(|r| scraped_page(r)).collect();
        app(vec![], runs, Some(secret.to_string()))
    }
}
