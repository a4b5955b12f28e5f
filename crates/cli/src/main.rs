use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shotwatch_core::config::AppConfig;
use shotwatch_engine::{MonitorHandle, MonitorService, SortOrder, TaskSort};
use shotwatch_script::{Manifest, list_files, match_shots, scan_candidates};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Shotwatch - video production folder monitor", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Monitor the watch directory and stream changes as JSON lines (default)
    Watch,
    /// List candidate task directories under the watch directory
    Scan,
    /// Parse a task's manifest and show which files bind to each shot
    Inspect {
        /// Task directory
        #[arg(index = 1)]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("❌ Error: configuration is invalid: {}", e);
            eprintln!("   Check shotwatch.toml and the WATCH_DIRECTORY / *_MS environment variables.");
            std::process::exit(1);
        }
    };

    let _guard = init_logging(&config);
    shotwatch_core::init();

    let result = match args.command {
        Some(Commands::Watch) | None => watch(&config).await,
        Some(Commands::Scan) => scan(&config),
        Some(Commands::Inspect { dir }) => inspect(&config, &dir),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}

/// Logs to stderr, or to `log_file` (append) when configured so stdout stays
/// a clean JSON stream.
fn init_logging(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let file = config.log_file.as_ref().and_then(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(shotwatch_core::path_utils::expand_tilde(path))
            .map_err(|e| eprintln!("⚠️ Cannot open log file {}: {}, logging to stderr", path, e))
            .ok()
    });

    match file {
        Some(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt().with_writer(non_blocking).with_ansi(false).init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_writer(std::io::stderr).with_ansi(true).init();
            None
        }
    }
}

async fn watch(config: &AppConfig) -> Result<()> {
    let (handle, service) = MonitorService::spawn(config).await?;
    let mut events = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    info!("👀 Watching {:?}. Commands: start <id> <path> | stop <id> | resume <id> | list [sort] [order] | status", config.watch_root());

    loop {
        tokio::select! {
            message = events.recv() => match message {
                Some(message) => match message.to_json() {
                    Ok(line) => println!("{}", line),
                    Err(e) => error!("Failed to encode hub message: {}", e),
                },
                None => break,
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => run_command(&handle, line.trim()).await,
                Ok(None) => stdin_open = false,
                Err(e) => {
                    error!("stdin: {}", e);
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Interrupted");
                break;
            }
        }
    }

    handle.shutdown().await;
    let _ = service.await;
    Ok(())
}

async fn run_command(handle: &MonitorHandle, line: &str) {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let result = match parts.as_slice() {
        [] => return,
        ["start", id, path] => handle.start(*id, PathBuf::from(*path)).await.map(|t| serde_json::to_string(&t)),
        ["stop", id] => handle.stop(*id).await.map(|t| serde_json::to_string(&t)),
        ["resume", id] => handle.resume(*id).await.map(|t| serde_json::to_string(&t)),
        ["status"] => handle.status().await.map(|s| serde_json::to_string(&s)),
        ["list", rest @ ..] => {
            let sort = match rest.first().map(|s| s.parse::<TaskSort>()).transpose() {
                Ok(sort) => sort.unwrap_or_default(),
                Err(e) => return eprintln!("❌ {}", e),
            };
            let order = match rest.get(1).map(|s| s.parse::<SortOrder>()).transpose() {
                Ok(order) => order.unwrap_or_default(),
                Err(e) => return eprintln!("❌ {}", e),
            };
            handle.tasks(sort, order).await.map(|tasks| serde_json::to_string(&tasks))
        }
        _ => {
            eprintln!("Usage: start <id> <path> | stop <id> | resume <id> | list [createdAt|folderCreatedAt|title] [asc|desc] | status");
            return;
        }
    };

    match result {
        Ok(Ok(json)) => println!("{}", json),
        Ok(Err(e)) => eprintln!("❌ Failed to encode reply: {}", e),
        Err(e) => eprintln!("❌ {}", e),
    }
}

fn scan(config: &AppConfig) -> Result<()> {
    let root = config.watch_root();
    let candidates = scan_candidates(&root, &config.manifest_name).with_context(|| format!("cannot scan {:?}", root))?;
    println!("{}", serde_json::to_string_pretty(&candidates)?);
    Ok(())
}

fn inspect(config: &AppConfig, dir: &Path) -> Result<()> {
    let dir = shotwatch_core::path_utils::absolutize(&dir.to_string_lossy());
    let root = dir.parent().map(Path::to_path_buf).unwrap_or_else(|| dir.clone());
    let task_id = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("task directory has no name")?;

    let manifest_path = dir.join(&config.manifest_name);
    let manifest = Manifest::load(&manifest_path).with_context(|| format!("cannot read {:?}", manifest_path))?;
    let shots = match_shots(&task_id, &manifest.shots, &list_files(&dir, &root), &root);

    println!("🎬 {} ({}), {} shots", manifest.title, manifest.video_id, shots.len());
    for shot in &shots {
        let files: Vec<&str> = shot.assets.iter().map(|a| a.file_path.as_str()).collect();
        println!(
            "  #{:<3} {:<12} {:>6.2}s-{:<6.2}s  {}",
            shot.spec.shot_number,
            shot.spec.shot_id,
            shot.spec.start_time,
            shot.spec.end_time,
            if files.is_empty() { "-".to_string() } else { files.join(", ") }
        );
    }
    Ok(())
}
