use std::path::Path;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use serde::Serialize;
use tracing::info;

use linkedpanels::cli::{Cli, Command, OutputFormat};
use linkedpanels::{CoordinationStore, LayoutConfig};

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to install tracing subscriber: {}", e))?;

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PanelView {
    panel_id: String,
    resource_ids: Vec<String>,
    current_index: usize,
    visible_resource_id: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose).context("Failed to setup logging")?;

    match cli.command {
        Command::Check { layout } => check(&layout),
        Command::Show { layout, format } => show(&layout, &format),
    }
}

fn check(path: &Path) -> Result<()> {
    let config = LayoutConfig::load(path)?;
    let issues = config.validate();

    if issues.is_empty() {
        println!(
            "{} {} ({} resources, {} panels)",
            "✓".green(),
            path.display(),
            config.resources.len(),
            config.panels.len()
        );
        return Ok(());
    }

    for issue in &issues {
        println!("{} {}", "✗".red(), issue);
    }
    eyre::bail!("{} issue(s) found in {}", issues.len(), path.display())
}

fn show(path: &Path, format: &OutputFormat) -> Result<()> {
    let config = LayoutConfig::load(path)?;
    let mut store = CoordinationStore::new();
    store.set_config(config);

    let visible = store.get_visible_resources_per_panel();
    let panels: Vec<PanelView> = store
        .get_all_panels()
        .into_iter()
        .map(|panel_id| PanelView {
            resource_ids: store.get_resources_in_panel(&panel_id),
            current_index: store.current_index(&panel_id).unwrap_or(0),
            visible_resource_id: visible.get(&panel_id).cloned(),
            panel_id,
        })
        .collect();

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&panels).context("Failed to serialize panels")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            for panel in &panels {
                println!("{}", panel.panel_id.bold());
                if panel.resource_ids.is_empty() {
                    println!("  {}", "(empty)".dimmed());
                }
                for (index, resource_id) in panel.resource_ids.iter().enumerate() {
                    let title = store
                        .get_resource_info(resource_id)
                        .map(|info| info.title)
                        .unwrap_or_else(|| "<unknown>".to_string());
                    if index == panel.current_index {
                        println!("  {} {} {}", "▶".green(), resource_id.cyan(), title);
                    } else {
                        println!("    {} {}", resource_id, title.dimmed());
                    }
                }
            }
        }
    }
    Ok(())
}
