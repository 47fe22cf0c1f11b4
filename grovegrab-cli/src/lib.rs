pub mod config;
pub mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::Settings;
use grovegrab_core::{
    HttpTaskSource, LoadPhase, Snapshot, TaskTracker, TrackerEvent, types::ConfigUpdate,
};
use std::{path::PathBuf, sync::Arc};
use tokio::sync::mpsc;

#[derive(Debug, Parser)]
#[command(name = "grovegrab", version, about = "Track and control Spotify downloads")]
pub struct Args {
    /// Backend base URL, overrides the settings file
    #[arg(long, env = "GROVEGRAB_SERVER", global = true)]
    pub server: Option<String>,

    /// Settings file location
    #[arg(long, env = "GROVEGRAB_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,

    /// Poll interval in milliseconds, overrides the settings file
    #[arg(long, global = true)]
    pub interval_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Follow the task list until interrupted
    Watch {
        /// Show per-track detail
        #[arg(long)]
        tracks: bool,
    },
    /// Print the current task list
    Tasks {
        /// Show per-track detail
        #[arg(long)]
        tracks: bool,
    },
    /// Print a single task with its tracks
    Show { id: String },
    /// Print downloaded, downloading, pending and failed songs
    Songs,
    /// Start a download
    Add {
        url: String,
        /// Target directory, defaults to the server's
        #[arg(long)]
        path: Option<String>,
    },
    /// Fetch metadata for a URL without downloading
    Preload { url: String },
    /// Retry a failed task
    Retry { id: String },
    /// Cancel a running task
    Cancel { id: String },
    /// Remove a finished task
    Delete { id: String },
    /// Print the full log of a task
    Logs { id: String },
    /// Check a URL with the server
    Validate { url: String },
    /// Show or change the server configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Check that the server is up
    Health,
    /// Write the local settings file
    Init,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    Show,
    Set {
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        client_secret: String,
        #[arg(long)]
        redirect_uri: Option<String>,
        #[arg(long)]
        download_path: Option<String>,
        #[arg(long)]
        audio_format: Option<String>,
        #[arg(long)]
        audio_quality: Option<String>,
    },
}

async fn settings(args: &Args) -> Result<(Settings, PathBuf)> {
    let path = args.settings.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(&path).await?;
    if let Some(server) = &args.server {
        settings.server_url = server.clone();
    }
    if let Some(interval) = args.interval_ms {
        settings.poll_interval_ms = interval;
    }
    settings.validate()?;
    Ok((settings, path))
}

pub async fn run(args: Args) -> Result<()> {
    let (settings, path) = settings(&args).await?;

    if let Command::Init = args.command {
        settings.save(&path).await?;
        println!("Settings written to {}", path.display());
        return Ok(());
    }

    let source = HttpTaskSource::with_config(settings.client_config())?;
    let (tracker, events) = TaskTracker::new(Arc::new(source), settings.tracker_config());
    tracing::debug!(server = %settings.server_url, "tracker created");

    match args.command {
        Command::Watch { tracks } => watch(&tracker, events, tracks).await?,
        Command::Tasks { tracks } => {
            tracker.reload().await?;
            print!("{}", render::tasks(&tracker.snapshot().tasks, tracks));
        }
        Command::Show { id } => {
            let task = tracker.get_task(&id).await?;
            print!("{}", render::task(&task, true));
        }
        Command::Songs => {
            tracker.reload().await?;
            print!("{}", render::songs(&tracker.snapshot().song_list()));
        }
        Command::Add { url, path } => {
            tracker.load_config().await?;
            let started = tracker.start_download(&url, path.as_deref()).await?;
            println!("Started task {}", started.task_id);
        }
        Command::Preload { url } => {
            let started = tracker.preload(&url).await?;
            println!("Started preload {}", started.task_id);
        }
        Command::Retry { id } => {
            tracker.reload().await?;
            tracker.retry(&id).await?;
            println!("Retrying {id}");
        }
        Command::Cancel { id } => {
            tracker.reload().await?;
            tracker.cancel(&id).await?;
            println!("Cancelled {id}");
        }
        Command::Delete { id } => {
            tracker.reload().await?;
            tracker.delete(&id).await?;
            println!("Deleted {id}");
        }
        Command::Logs { id } => {
            for line in tracker.get_logs(&id).await? {
                println!("{line}");
            }
        }
        Command::Validate { url } => {
            let info = tracker.validate_url(&url).await?;
            println!("{} {} ({})", info.kind, info.id, info.url);
        }
        Command::Config { action } => config(&tracker, action).await?,
        Command::Health => {
            let health = tracker.health().await?;
            match health.timestamp {
                Some(timestamp) => println!("{} at {timestamp}", health.status),
                None => println!("{}", health.status),
            }
        }
        Command::Init => unreachable!("handled before the tracker is built"),
    }

    tracker.stop();
    Ok(())
}

async fn config(tracker: &TaskTracker, action: ConfigAction) -> Result<()> {
    let config = match action {
        ConfigAction::Show => tracker.load_config().await?,
        ConfigAction::Set {
            client_id,
            client_secret,
            redirect_uri,
            download_path,
            audio_format,
            audio_quality,
        } => {
            let defaults = ConfigUpdate::default();
            let update = ConfigUpdate {
                client_id,
                client_secret,
                redirect_uri: redirect_uri.unwrap_or(defaults.redirect_uri),
                download_path,
                audio_format: audio_format.unwrap_or(defaults.audio_format),
                audio_quality: audio_quality.unwrap_or(defaults.audio_quality),
            };
            tracker.update_config(&update).await?
        }
    };

    let credentials = if config.has_credentials {
        "configured"
    } else {
        "missing"
    };
    println!("credentials:   {credentials}");
    println!("download path: {}", config.default_download_path);
    println!("format:        {} {}", config.audio_format, config.audio_quality);
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot, tracks: bool) {
    match &snapshot.phase {
        LoadPhase::Loading => println!("Loading tasks..."),
        LoadPhase::Failed { message } => {
            println!("Failed to load tasks: {message}");
            println!("Retrying on the next poll");
        }
        LoadPhase::Ready => {
            print!("{}", render::tasks(&snapshot.tasks, tracks));
            print!("{}", render::songs(&snapshot.song_list()));
        }
    }
}

async fn watch(
    tracker: &TaskTracker,
    mut events: mpsc::Receiver<TrackerEvent>,
    tracks: bool,
) -> Result<()> {
    let mut snapshots = tracker.subscribe();
    let poller = tracker.start();

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                print_snapshot(&snapshot, tracks);
            }
            Some(event) = events.recv() => {
                tracing::info!("{}", render::event(&event));
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, stopping");
                break;
            }
        }
    }

    poller.stop();
    Ok(())
}
