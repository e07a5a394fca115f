//! lapse: scheduled still capture with cloud photo upload.
//!
//! Subcommands:
//! - `run`: the capture loop (work-window scheduling, upload, local fallback)
//! - `albums`: list the photo library's albums

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cycle;
mod daemon;

#[derive(Parser)]
#[command(name = "lapse")]
#[command(about = "Scheduled still capture with cloud photo upload", long_about = None)]
struct Cli {
    /// Give more output, additive up to 2 times.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Give less output, additive up to 3 times.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the capture loop
    Run {
        /// Minutes to wait between shots
        #[arg(long, default_value = "30", env = "LAPSE_ELAPSE")]
        elapse: i64,

        /// Path to the API client secret
        #[arg(long, default_value = "client_secret.json", env = "LAPSE_SECRET")]
        secret: PathBuf,

        /// Album to save to (created when missing)
        #[arg(long, env = "LAPSE_ALBUM")]
        album: Option<String>,

        /// Hour of day the capture window opens
        #[arg(long, default_value = "7")]
        start_hour: u32,

        /// Hour of day the capture window closes
        #[arg(long, default_value = "20")]
        end_hour: u32,

        /// Directory for frames that could not be uploaded
        #[arg(long, default_value = "photos")]
        photos_dir: PathBuf,

        /// Wait for today's window opening instead of skipping to tomorrow
        /// when started before it
        #[arg(long)]
        same_day_start: bool,

        /// Still-capture program driving the camera
        #[arg(long, default_value = "raspistill", env = "LAPSE_CAMERA_COMMAND")]
        camera_command: String,

        /// Capture width in pixels
        #[arg(long, default_value_t = lapse_camera::MAX_RESOLUTION.0)]
        width: u32,

        /// Capture height in pixels
        #[arg(long, default_value_t = lapse_camera::MAX_RESOLUTION.1)]
        height: u32,

        /// Camera warm-up before each exposure, in seconds
        #[arg(long, default_value = "2")]
        warmup_secs: u64,

        /// Hard limit on one capture, in seconds
        #[arg(long, default_value = "30")]
        capture_timeout_secs: u64,
    },

    /// List album titles and ids
    Albums {
        /// Path to the API client secret
        #[arg(long, default_value = "client_secret.json", env = "LAPSE_SECRET")]
        secret: PathBuf,
    },
}

/// Net `-v`/`-q` count mapped to a default log directive for our crates.
fn log_directive(verbose: u8, quiet: u8) -> String {
    let level = match i16::from(verbose) - i16::from(quiet) {
        v if v >= 2 => "trace",
        1 => "debug",
        0 => "info",
        -1 => "warn",
        -2 => "error",
        _ => "off",
    };
    format!("lapse={level},lapse_scheduler={level},lapse_camera={level},lapse_photos={level}")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_directive(cli.verbose, cli.quiet)),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Run {
            elapse,
            secret,
            album,
            start_hour,
            end_hour,
            photos_dir,
            same_day_start,
            camera_command,
            width,
            height,
            warmup_secs,
            capture_timeout_secs,
        } => {
            daemon::run(daemon::DaemonConfig {
                elapse_minutes: elapse,
                secret,
                album,
                start_hour,
                end_hour,
                photos_dir,
                same_day_start,
                camera_command,
                width,
                height,
                warmup: Duration::from_secs(warmup_secs),
                capture_timeout: Duration::from_secs(capture_timeout_secs),
            })
            .await
        }

        Commands::Albums { secret } => run_albums(&secret).await,
    }
}

async fn run_albums(secret: &Path) -> Result<()> {
    use lapse_photos::{PhotosClient, TokenStore};

    let tokens = TokenStore::load(secret)
        .await
        .map_err(|e| miette::miette!("{}", e))?;
    let client = PhotosClient::new(tokens);

    let mut albums: Vec<_> = client
        .list_albums()
        .await
        .map_err(|e| miette::miette!("{}", e))?
        .into_iter()
        .collect();
    albums.sort();

    if albums.is_empty() {
        println!("no albums");
        return Ok(());
    }
    for (title, id) in albums {
        println!("{title}\t{id}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_counts_map_to_levels() {
        assert!(log_directive(0, 0).contains("lapse=info"));
        assert!(log_directive(1, 0).contains("lapse=debug"));
        assert!(log_directive(2, 0).contains("lapse=trace"));
        assert!(log_directive(0, 1).contains("lapse=warn"));
        assert!(log_directive(0, 2).contains("lapse=error"));
        assert!(log_directive(0, 3).contains("lapse=off"));
    }

    #[test]
    fn verbose_and_quiet_cancel_out() {
        assert!(log_directive(2, 2).contains("lapse=info"));
    }

    #[test]
    fn cli_parses_run_defaults() {
        let cli = Cli::parse_from(["lapse", "run"]);
        match cli.command {
            Commands::Run {
                elapse,
                start_hour,
                end_hour,
                same_day_start,
                ..
            } => {
                assert_eq!(elapse, 30);
                assert_eq!(start_hour, 7);
                assert_eq!(end_hour, 20);
                assert!(!same_day_start);
            }
            _ => panic!("expected run subcommand"),
        }
    }
}
