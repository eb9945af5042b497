use anyhow::Result;
use common::orchestrator::Orchestrator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run,
    Scrape,
    Page,
    Compare,
    History,
}

pub fn parse_args<I>(mut args: I) -> std::result::Result<Command, String>
where
    I: Iterator<Item = String>,
{
    // Drop argv[0].
    let _ = args.next();

    let Some(cmd) = args.next() else {
        return Ok(Command::Run);
    };

    match cmd.as_str() {
        "run" => Ok(Command::Run),
        "scrape" => Ok(Command::Scrape),
        "page" => Ok(Command::Page),
        "compare" => Ok(Command::Compare),
        "history" => Ok(Command::History),
        other => Err(format!("unknown command: {other}")),
    }
}

pub async fn run_command(orchestrator: &Orchestrator, cmd: Command) -> Result<()> {
    match cmd {
        Command::Run => Ok(()),
        Command::Scrape => scrape_once(orchestrator).await,
        Command::Page => page_once(orchestrator).await,
        Command::Compare => show_comparison(orchestrator),
        Command::History => show_history(orchestrator),
    }
}

async fn scrape_once(orchestrator: &Orchestrator) -> Result<()> {
    let report = orchestrator.run_portfolio_once().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn page_once(orchestrator: &Orchestrator) -> Result<()> {
    let (page, diff) = orchestrator.run_page_once().await?;
    println!("Scraped {} ({} links)", page.title, page.links.len());
    println!("{}", serde_json::to_string_pretty(&diff)?);
    Ok(())
}

fn show_comparison(orchestrator: &Orchestrator) -> Result<()> {
    match orchestrator.portfolio_comparison()? {
        Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
        None => println!("No snapshots yet. Run `scanner scrape` first."),
    }
    Ok(())
}

fn show_history(orchestrator: &Orchestrator) -> Result<()> {
    let names = orchestrator.history()?;
    if names.is_empty() {
        println!("No snapshots yet.");
        return Ok(());
    }
    println!("Snapshot history (newest first):");
    for name in names {
        println!("  {name}");
    }
    Ok(())
}
