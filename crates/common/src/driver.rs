//! Headless browser session management: one geckodriver child process and a
//! WebDriver client connected to it. Each collection run opens a fresh
//! session and shuts it down when done.

use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use fantoccini::{Client, ClientBuilder};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

pub struct ScraperDriver {
    process: Option<Child>,
    pub client: Client,
}

fn random_port() -> u16 {
    rand::random::<u16>() % (65535 - 1024) + 1024
}

fn spawn_geckodriver(port: u16) -> Result<Child> {
    Command::new("geckodriver")
        .arg("--port")
        .arg(port.to_string())
        .arg("--log")
        .arg("fatal")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("failed to start geckodriver (is it installed and on PATH?)")
}

async fn connect(port: u16) -> Result<Client> {
    let url = format!("http://localhost:{port}");

    // The child process needs a moment to start listening.
    let mut last_err = None;
    for _ in 0..10 {
        match ClientBuilder::native().connect(&url).await {
            Ok(client) => {
                client.set_ua(USER_AGENT).await?;
                return Ok(client);
            }
            Err(error) => {
                last_err = Some(error);
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
        }
    }
    Err(anyhow::anyhow!(
        "failed to connect to webdriver at {url}: {}",
        last_err.map_or_else(|| "no attempts made".to_string(), |e| e.to_string())
    ))
}

impl ScraperDriver {
    pub async fn new() -> Result<Self> {
        let port = random_port();
        let mut process = spawn_geckodriver(port)?;

        match connect(port).await {
            Ok(client) => Ok(Self {
                process: Some(process),
                client,
            }),
            Err(error) => {
                let _ = process.kill();
                Err(error)
            }
        }
    }

    /// Closes the WebDriver session and kills the geckodriver child.
    pub async fn shutdown(mut self) {
        if let Err(error) = self.client.clone().close().await {
            tracing::warn!(%error, "failed to close webdriver session");
        }
        if let Some(mut process) = self.process.take() {
            if let Err(error) = process.kill() {
                tracing::warn!(%error, "failed to kill geckodriver process");
            }
        }
    }
}

impl Drop for ScraperDriver {
    fn drop(&mut self) {
        // Last-resort cleanup when shutdown() was not awaited.
        if let Some(mut process) = self.process.take() {
            let _ = process.kill();
        }
    }
}
