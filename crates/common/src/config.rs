use anyhow::Result;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub general: General,
    pub portfolio: Portfolio,
    pub page: PageScrape,
    pub storage: Storage,
    pub schedule: Schedule,
    pub observability: Observability,
    pub web: Option<Web>,
}

#[derive(Debug, Deserialize)]
pub struct General {
    pub log_level: String,
}

/// Tracked DeBank addresses and browser pacing.
#[derive(Debug, Deserialize)]
pub struct Portfolio {
    pub addresses: Vec<String>,
    pub profile_url: String,
    pub request_delay_ms: u64,
    pub page_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct PageScrape {
    pub target_url: String,
    pub max_links: usize,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
    pub data_dir: String,
    pub snapshot_prefix: String,
    pub latest_name: String,
}

#[derive(Debug, Deserialize)]
pub struct Schedule {
    pub portfolio_interval_secs: u64,
    pub page_interval_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Observability {
    pub prometheus_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Web {
    pub port: u16,
    pub host: String,
    pub cron_secret: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let content = std::fs::read_to_string("config/default.toml")?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_default_config() {
        let config = Config::from_toml_str(include_str!("../../../config/default.toml")).unwrap();
        assert_eq!(config.general.log_level, "info");
        assert!(!config.portfolio.addresses.is_empty());
        assert!(config.portfolio.request_delay_ms > 0);
        assert!(config.storage.snapshot_prefix.starts_with("debank"));
    }

    #[test]
    fn test_web_config_section() {
        let config = Config::from_toml_str(include_str!("../../../config/default.toml")).unwrap();
        let web = config.web.expect("web section should be present");
        assert_eq!(web.port, 8080);
        assert_eq!(web.host, "0.0.0.0");
    }

    #[test]
    fn test_web_config_optional() {
        // Config without [web] section should still parse
        let toml = r#"
[general]
log_level = "info"

[portfolio]
addresses = ["0xd100b6645eb05bd88ff6491cb9f1c2688948b838"]
profile_url = "https://debank.com/profile"
request_delay_ms = 2000
page_timeout_ms = 30000

[page]
target_url = "https://example.com"
max_links = 20

[storage]
data_dir = "data"
snapshot_prefix = "debank-data"
latest_name = "debank-latest.json"

[schedule]
portfolio_interval_secs = 21600
page_interval_secs = 3600

[observability]
prometheus_port = 9095
"#;
        let config = Config::from_toml_str(toml).unwrap();
        assert!(config.web.is_none());
        assert_eq!(config.portfolio.addresses.len(), 1);
    }
}
