//! Teatime CLI - automated tee-time booking
//!
//! Usage:
//!   teatime run                 Execute a booking attempt (dry-run by default)
//!   teatime run --live          Execute a real booking
//!   teatime preview             Forced dry-run attempt
//!   teatime dates               Show reachable dates in the booking window
//!   teatime inspect             Print the structure of the current tee sheet
//!   teatime init-config         Write a default config file

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use teatime_core::{candidate_dates, Credentials, StepRecord, TeatimeConfig};
use teatime_browser::{
    ArtifactCapture, Authenticator, BrowserConfig, BrowserSession, Page, SessionAuthenticator,
};
use teatime_engine::{Orchestrator, RunConfig, StepSink, SystemClock, TimingController};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "teatime")]
#[command(author, version, about = "Automated tee-time booking")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to the config file
    #[arg(long, default_value = "config/teatime.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a booking attempt
    Run {
        /// Perform the real, irreversible submission
        #[arg(long, conflicts_with = "dry_run")]
        live: bool,

        /// Force a dry run regardless of configuration
        #[arg(long)]
        dry_run: bool,

        /// Show the browser window
        #[arg(long)]
        headful: bool,
    },

    /// Dry-run attempt: everything except the final submission
    Preview {
        /// Show the browser window
        #[arg(long)]
        headful: bool,
    },

    /// List reachable dates within the booking window
    Dates,

    /// Authenticate, open the tee sheet, and print its structure
    Inspect {
        /// Show the browser window
        #[arg(long)]
        headful: bool,
    },

    /// Write a default config file
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Run {
            live,
            dry_run,
            headful,
        } => {
            let mut config = TeatimeConfig::load_or_default(&cli.config)?;
            if live {
                config.runtime.dry_run = false;
            }
            if dry_run {
                config.runtime.dry_run = true;
            }
            run_attempt(&config, headful).await
        }
        Commands::Preview { headful } => {
            let mut config = TeatimeConfig::load_or_default(&cli.config)?;
            config.runtime.dry_run = true;
            run_attempt(&config, headful).await
        }
        Commands::Dates => {
            let config = TeatimeConfig::load_or_default(&cli.config)?;
            show_dates(&config)
        }
        Commands::Inspect { headful } => {
            let config = TeatimeConfig::load_or_default(&cli.config)?;
            inspect_site(&config, headful).await
        }
        Commands::InitConfig => {
            TeatimeConfig::write_default(&cli.config)?;
            println!("Default configuration written to {}", cli.config.display());
            Ok(())
        }
    }
}

/// Step sink wiring the engine's trace to tracing and the artifact store.
struct CliSink<'a> {
    session: &'a BrowserSession,
    capture: ArtifactCapture,
}

#[async_trait]
impl StepSink for CliSink<'_> {
    fn record(&self, record: &StepRecord) {
        info!(
            "step {} [{:?}]{}",
            record.name,
            record.status,
            record
                .capture
                .as_deref()
                .map(|c| format!(" (captured: {})", c))
                .unwrap_or_default()
        );
    }

    async fn capture(&self, label: &str) -> Option<String> {
        let screenshot = self.capture.screenshot(self.session, label).await;
        let html = self.capture.html_dump(self.session, label).await;
        screenshot.or(html)
    }
}

async fn run_attempt(config: &TeatimeConfig, headful: bool) -> Result<()> {
    let credentials = Credentials::from_env()?;
    let run_config = RunConfig::from_config(config)?;

    let session = BrowserSession::launch_with_config(browser_config(headful)).await?;
    let sink = CliSink {
        session: &session,
        capture: ArtifactCapture::from_settings(&config.capture),
    };

    let auth = Authenticator::new(config.site.login_url(), credentials);
    let clock = SystemClock;
    let orchestrator = Orchestrator::new(run_config, &clock, &auth);

    let outcome = orchestrator.run(&session, &sink).await;

    let report_path = write_report(config, &outcome).await;
    println!("Outcome: {}", outcome.status);
    if let Some(slot) = &outcome.chosen_slot {
        println!(
            "Slot:    {} on {} ({} seat(s) open)",
            slot.time.format("%H:%M"),
            slot.day,
            slot.open_seats
        );
    }
    if let Some(reason) = &outcome.reason {
        println!("Reason:  {}", reason);
    }
    if let Some(path) = report_path {
        println!("Report:  {}", path);
    }

    drop(sink);
    session.close().await?;

    if !outcome.succeeded() {
        bail!(
            "booking attempt failed: {}",
            outcome.reason.as_deref().unwrap_or("unknown")
        );
    }
    Ok(())
}

/// Serialize the attempt outcome for the notification side. Fail-open: a
/// report that cannot be written is logged, not fatal.
async fn write_report(config: &TeatimeConfig, outcome: &teatime_core::AttemptOutcome) -> Option<String> {
    teatime_core::fail_open::fail_open("report::write", || async {
        let dir = PathBuf::from(&config.capture.artifacts_dir).join("reports");
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("attempt_{}.json", outcome.run_id));
        let json = serde_json::to_string_pretty(outcome)?;
        tokio::fs::write(&path, json).await?;
        Ok(path.to_string_lossy().into_owned())
    })
    .await
}

fn show_dates(config: &TeatimeConfig) -> Result<()> {
    let window = config.booking_window()?;
    let clock = SystemClock;
    let timing = TimingController::new(window, &clock);
    let today = timing.club_today();

    println!("Booking window: {} day(s) ahead of {}", window.days_in_advance, today);
    for candidate in candidate_dates(today, window.days_in_advance) {
        println!(
            "  {} ({}) - {} day(s) ahead, opens {}",
            candidate.date,
            candidate.weekday,
            candidate.days_ahead,
            timing.open_instant(candidate.date)
        );
    }
    Ok(())
}

async fn inspect_site(config: &TeatimeConfig, headful: bool) -> Result<()> {
    let credentials = Credentials::from_env()?;
    let window = config.booking_window()?;
    let target = config.booking_target()?;

    let session = BrowserSession::launch_with_config(browser_config(headful)).await?;
    let auth = Authenticator::new(config.site.login_url(), credentials);
    auth.ensure_authenticated(&session).await?;

    let clock = SystemClock;
    let timing = TimingController::new(window, &clock);
    let today = timing.club_today();
    let date = teatime_core::resolve_target_date(&target.day, today, window.days_in_advance)
        .unwrap_or(today);

    session.navigate(&config.site.tee_sheet_url(date)).await?;
    let structure = teatime_browser::inspect(&session).await?;

    println!("{}", structure.summary());
    println!("{}", serde_json::to_string_pretty(&structure)?);

    session.close().await?;
    Ok(())
}

fn browser_config(headful: bool) -> BrowserConfig {
    BrowserConfig {
        headless: !headful,
        ..BrowserConfig::default()
    }
}
