//! Zefest CLI - Main entry point for the CLI binary
//!
//! Exercises the update flow outside the mobile shell: version comparison,
//! manifest checks, the delivery fallback chain and marker bookkeeping.

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use zefest_lib::engine::{
    cli::formatter::{format_size, CliFormatter},
    cli::{Cli, Commands, MarkersAction, OutputFormat},
    config::{ClientConfig, UpdateConfig},
    platform::{DesktopHost, Platform},
    storage::{JsonFileStore, KeyValueStore},
    updater::{
        download::Downloader,
        sequencer::{DeliverySequencer, SequencerOptions},
        version::is_newer,
        UpdateController,
    },
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run_cli(cli).await {
        CliFormatter::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Filter used when `RUST_LOG` is unset
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "zefest_cli=debug,zefest_lib=debug"
    } else {
        "zefest_cli=info,zefest_lib=info"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_cli(cli: Cli) -> Result<()> {
    let json_output = cli.format == OutputFormat::Json;
    let config_path = cli.config_path();
    let config = ClientConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    match cli.command {
        Commands::Compare { candidate, current } => cmd_compare(&candidate, &current, json_output),
        Commands::Check {
            current,
            manifest_url,
        } => {
            let store = open_store(cli.store)?;
            cmd_check(&config, store, current, manifest_url, json_output).await
        }
        Commands::Download {
            url,
            dest,
            no_open,
            timeout,
            save_only,
        } => {
            if save_only {
                cmd_save(&config, &url, dest, json_output).await
            } else {
                cmd_download(&config, &url, dest, no_open, timeout, json_output).await
            }
        }
        Commands::Markers { action } => {
            let store = open_store(cli.store)?;
            cmd_markers(action, &update_controller(&config.update, store), json_output)
        }
    }
}

fn open_store(path: Option<PathBuf>) -> Result<Arc<dyn KeyValueStore>> {
    let path = path
        .or_else(|| Platform::current().storage_path())
        .unwrap_or_else(|| std::env::temp_dir().join("zefest").join("storage.json"));
    let store = JsonFileStore::open(&path)
        .with_context(|| format!("opening store {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Controller over the persisted store; the CLI never delivers through it
fn update_controller(config: &UpdateConfig, store: Arc<dyn KeyValueStore>) -> UpdateController {
    UpdateController::new(
        config,
        store,
        Arc::new(DesktopHost::new().without_opener()),
        Arc::new(Downloader::new()),
    )
}

fn cmd_compare(candidate: &str, current: &str, json: bool) -> Result<()> {
    let newer = is_newer(candidate, current);
    if json {
        println!(
            "{}",
            json!({ "candidate": candidate, "current": current, "newer": newer })
        );
    } else if newer {
        CliFormatter::success(&format!("{} is newer than {}", candidate, current));
    } else {
        CliFormatter::info(&format!("{} is not newer than {}", candidate, current));
    }
    Ok(())
}

async fn cmd_check(
    config: &ClientConfig,
    store: Arc<dyn KeyValueStore>,
    current: Option<String>,
    manifest_url: Option<String>,
    json: bool,
) -> Result<()> {
    let mut update_config = config.update.clone();
    if let Some(url) = manifest_url {
        update_config.manifest_url = url;
    }
    let controller = update_controller(&update_config, store);

    let url = controller.manifest_url().to_string();
    let manifest = controller
        .fetch_manifest()
        .await
        .with_context(|| format!("fetching manifest {}", url))?;
    let report = controller.gate_report(&manifest, current.as_deref());

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "manifest": manifest,
                "current_version": report.current_version,
                "decision": report.decision,
                "offer": report.offer,
            }))?
        );
        return Ok(());
    }

    CliFormatter::header("Update check");
    CliFormatter::kv("Manifest", &url);
    CliFormatter::kv("Available", &manifest.available_version);
    CliFormatter::kv("Current", &report.current_version);
    CliFormatter::kv("Forced", &manifest.force_update.to_string());
    match report.offer {
        Some(offer) => {
            let kind = if offer.forced { "mandatory" } else { "optional" };
            CliFormatter::success(&format!("Prompt shown: {} update to {}", kind, offer.version));
            CliFormatter::kv("Package", &offer.package_url);
        }
        None => CliFormatter::info(&format!("Prompt hidden: {:?}", report.decision)),
    }
    Ok(())
}

async fn cmd_download(
    config: &ClientConfig,
    url: &str,
    dest: Option<PathBuf>,
    no_open: bool,
    timeout: Option<u64>,
    json: bool,
) -> Result<()> {
    let mut host = DesktopHost::new();
    if let Some(dir) = &dest {
        host = host.with_download_dir(dir);
    }
    if no_open {
        host = host.without_opener();
    }

    let mut options = SequencerOptions::from(&config.update);
    if let Some(secs) = timeout {
        options.method_timeout = Duration::from_secs(secs);
    }

    let source = if json {
        Downloader::new()
    } else {
        Downloader::new().with_progress(|done, total| {
            if total > 0 {
                eprint!("\r  {} / {}", format_size(done), format_size(total));
            } else {
                eprint!("\r  {}", format_size(done));
            }
        })
    };

    let download_dir = host.download_dir().to_path_buf();
    let sequencer = DeliverySequencer::new(Arc::new(host), Arc::new(source), options);

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };
    let report = sequencer.run(url, &cancel).await;
    ctrl_c.abort();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    eprintln!();
    CliFormatter::header("Delivery attempts");
    for record in &report.attempts {
        CliFormatter::attempt(record);
    }
    CliFormatter::kv("Download dir", &download_dir.display().to_string());
    CliFormatter::delivery_status(&report.status);
    Ok(())
}

async fn cmd_save(config: &ClientConfig, url: &str, dest: Option<PathBuf>, json: bool) -> Result<()> {
    let dir = match dest {
        Some(dir) => dir,
        None => DesktopHost::new().download_dir().to_path_buf(),
    };
    let path = dir.join(&config.update.package_file_name);

    let downloader = if json {
        Downloader::new()
    } else {
        Downloader::new().with_progress(|done, total| {
            if total > 0 {
                eprint!("\r  {} / {}", format_size(done), format_size(total));
            } else {
                eprint!("\r  {}", format_size(done));
            }
        })
    };
    let written = downloader
        .download_to(url, &path)
        .await
        .with_context(|| format!("downloading {}", url))?;

    if json {
        println!(
            "{}",
            json!({ "path": path.display().to_string(), "bytes": written })
        );
    } else {
        eprintln!();
        CliFormatter::success(&format!(
            "Saved {} to {}",
            format_size(written),
            path.display()
        ));
    }
    Ok(())
}

fn cmd_markers(action: MarkersAction, controller: &UpdateController, json: bool) -> Result<()> {
    match action {
        MarkersAction::Show => {
            let markers = controller.markers();
            if json {
                println!("{}", serde_json::to_string(&markers)?);
            } else {
                CliFormatter::header("Version markers");
                CliFormatter::kv("Installed", markers.installed.as_deref().unwrap_or("-"));
                CliFormatter::kv("Dismissed", markers.dismissed.as_deref().unwrap_or("-"));
            }
        }
        MarkersAction::Clear => {
            controller.clear_markers()?;
            if json {
                println!("{}", json!({ "cleared": true }));
            } else {
                CliFormatter::success("Version markers cleared");
            }
        }
    }
    Ok(())
}
