//! Configuration for teatime
//!
//! Settings come from a TOML file (`config/teatime.toml` by default) with
//! every field defaulted, so a missing file is a usable configuration.
//! Credentials never live in the file: they are read from the
//! `TEATIME_USERNAME` / `TEATIME_PASSWORD` environment variables.
//!
//! The booking engine never reads ambient state; it receives the resolved
//! [`BookingTarget`] and [`BookingWindow`] values built here.

use crate::dates::{parse_clock_time, parse_utc_offset};
use crate::types::{BookingTarget, BookingWindow, TargetDay};
use crate::{Result, TeatimeError};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Top-level teatime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeatimeConfig {
    /// What to book
    #[serde(default)]
    pub booking: BookingSettings,

    /// When the reservation window opens
    #[serde(default)]
    pub window: WindowSettings,

    /// Run behavior: dry-run, retries, deadline
    #[serde(default)]
    pub runtime: RuntimeSettings,

    /// Target site routes
    #[serde(default)]
    pub site: SiteSettings,

    /// Diagnostic artifact capture
    #[serde(default)]
    pub capture: CaptureSettings,
}

/// What to book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSettings {
    /// Weekday name ("Sunday") or exact date ("2026-08-16")
    #[serde(default = "default_target_day")]
    pub target_day: String,

    /// Desired tee-off time, e.g. "14:00" or "2:00 PM"
    #[serde(default = "default_target_time")]
    pub target_time: String,

    /// Players to book for
    #[serde(default = "default_players")]
    pub players: u8,
}

/// When the reservation window opens.
///
/// Operators disagree on whether the window opens 7 or 8 days ahead and at
/// midnight or 6am; both are settings, not constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSettings {
    #[serde(default = "default_days_in_advance")]
    pub days_in_advance: u32,

    /// Club-local opening time, e.g. "06:00"
    #[serde(default = "default_open_time")]
    pub open_time: String,

    /// Club-local timezone as a fixed UTC offset, e.g. "-05:00"
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,

    /// Start this many seconds before the opening instant (pre-warm)
    #[serde(default = "default_lead_seconds")]
    pub lead_seconds: u32,

    /// Sleep increment while waiting for the window
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Run behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Preview mode: perform every step except the irreversible submission
    #[serde(default = "default_true")]
    pub dry_run: bool,

    /// Retry budget for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Multiplier applied to the delay after each failed attempt (1.0 = fixed)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Overall wall-clock budget for one run, in seconds
    #[serde(default = "default_run_budget_seconds")]
    pub run_budget_seconds: u64,

    /// Skip waiting for the booking window (manual/test runs)
    #[serde(default)]
    pub skip_wait: bool,
}

/// Target site routes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path token identifying the club in tee-sheet/booking routes
    #[serde(default = "default_club_id")]
    pub club_id: String,

    /// Numeric club id used by the login route
    #[serde(default = "default_login_club_id")]
    pub login_club_id: String,

    /// Booking-view path prefixes, tried in order when navigation fails
    #[serde(default = "default_booking_paths")]
    pub booking_paths: Vec<String>,
}

/// Diagnostic artifact capture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: String,

    #[serde(default = "default_true")]
    pub screenshots: bool,

    #[serde(default = "default_true")]
    pub html_dumps: bool,
}

// Default value providers

fn default_target_day() -> String {
    "Sunday".to_string()
}

fn default_target_time() -> String {
    "14:00".to_string()
}

fn default_players() -> u8 {
    4
}

fn default_days_in_advance() -> u32 {
    7
}

fn default_open_time() -> String {
    "06:00".to_string()
}

fn default_utc_offset() -> String {
    "-05:00".to_string()
}

fn default_lead_seconds() -> u32 {
    5
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_run_budget_seconds() -> u64 {
    300
}

fn default_base_url() -> String {
    "https://customer-cc36.clubcaddie.com".to_string()
}

fn default_club_id() -> String {
    "cbfdabab".to_string()
}

fn default_login_club_id() -> String {
    "103412".to_string()
}

fn default_booking_paths() -> Vec<String> {
    vec!["TeeTimes/view".to_string(), "TeeTimes/booking".to_string()]
}

fn default_artifacts_dir() -> String {
    "artifacts".to_string()
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            target_day: default_target_day(),
            target_time: default_target_time(),
            players: default_players(),
        }
    }
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            days_in_advance: default_days_in_advance(),
            open_time: default_open_time(),
            utc_offset: default_utc_offset(),
            lead_seconds: default_lead_seconds(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            dry_run: true,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            run_budget_seconds: default_run_budget_seconds(),
            skip_wait: false,
        }
    }
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            club_id: default_club_id(),
            login_club_id: default_login_club_id(),
            booking_paths: default_booking_paths(),
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            artifacts_dir: default_artifacts_dir(),
            screenshots: true,
            html_dumps: true,
        }
    }
}

impl Default for TeatimeConfig {
    fn default() -> Self {
        Self {
            booking: BookingSettings::default(),
            window: WindowSettings::default(),
            runtime: RuntimeSettings::default(),
            site: SiteSettings::default(),
            capture: CaptureSettings::default(),
        }
    }
}

impl TeatimeConfig {
    /// Load configuration from the given path, or defaults when it is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content).map_err(|e| {
                TeatimeError::Config(format!("Failed to parse {}: {}", path.display(), e))
            })?;
            info!("Configuration loaded from {}", path.display());
            config.validate()?;
            Ok(config)
        } else {
            warn!(
                "Config file {} not found, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    /// Write the default configuration to the given path.
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| TeatimeError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check that every string-typed field parses; called on load so the
    /// engine only ever sees resolved values.
    pub fn validate(&self) -> Result<()> {
        self.booking_target()?;
        self.booking_window()?;
        if self.site.base_url.is_empty() || self.site.booking_paths.is_empty() {
            return Err(TeatimeError::Config(
                "site.base_url and site.booking_paths must be set".to_string(),
            ));
        }
        Ok(())
    }

    /// The resolved booking target for this run.
    pub fn booking_target(&self) -> Result<BookingTarget> {
        let day: TargetDay = self
            .booking
            .target_day
            .parse()
            .map_err(TeatimeError::Config)?;
        let time = parse_clock_time(&self.booking.target_time).ok_or_else(|| {
            TeatimeError::Config(format!(
                "Invalid booking.target_time: {}",
                self.booking.target_time
            ))
        })?;
        if self.booking.players == 0 {
            return Err(TeatimeError::Config(
                "booking.players must be at least 1".to_string(),
            ));
        }
        Ok(BookingTarget {
            day,
            time,
            players: self.booking.players,
        })
    }

    /// The resolved booking-window parameters for this run.
    pub fn booking_window(&self) -> Result<BookingWindow> {
        let open_time = parse_clock_time(&self.window.open_time).ok_or_else(|| {
            TeatimeError::Config(format!("Invalid window.open_time: {}", self.window.open_time))
        })?;
        let utc_offset = parse_utc_offset(&self.window.utc_offset).ok_or_else(|| {
            TeatimeError::Config(format!(
                "Invalid window.utc_offset: {}",
                self.window.utc_offset
            ))
        })?;
        Ok(BookingWindow {
            days_in_advance: self.window.days_in_advance,
            open_time,
            utc_offset,
            lead: Duration::seconds(i64::from(self.window.lead_seconds)),
            poll_interval: Duration::milliseconds(self.window.poll_interval_ms as i64),
        })
    }
}

impl SiteSettings {
    /// Login page with the numeric club id.
    pub fn login_url(&self) -> String {
        format!("{}/login?clubid={}", self.base_url, self.login_club_id)
    }

    /// Tee-sheet calendar for a date.
    pub fn tee_sheet_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/TeeSheet/view/{}/sheet?date={}",
            self.base_url,
            self.club_id,
            date.format("%Y-%m-%d")
        )
    }

    /// Booking-view routes for a date, primary first. The date parameter is
    /// MM/DD/YYYY with the slashes percent-encoded, which is what the site's
    /// own links produce.
    pub fn booking_urls(&self, date: NaiveDate) -> Vec<String> {
        let url_date = date.format("%m/%d/%Y").to_string().replace('/', "%2F");
        self.booking_paths
            .iter()
            .map(|path| {
                format!(
                    "{}/{}/{}/slots?date={}&player=1&ratetype=any",
                    self.base_url, path, self.club_id, url_date
                )
            })
            .collect()
    }
}

/// Login credentials, environment-only.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub const USERNAME_VAR: &'static str = "TEATIME_USERNAME";
    pub const PASSWORD_VAR: &'static str = "TEATIME_PASSWORD";

    /// Read credentials from the environment, naming whichever variable is
    /// missing without echoing any value.
    pub fn from_env() -> Result<Self> {
        let username = std::env::var(Self::USERNAME_VAR)
            .map_err(|_| TeatimeError::Config(format!("{} is not set", Self::USERNAME_VAR)))?;
        let password = std::env::var(Self::PASSWORD_VAR)
            .map_err(|_| TeatimeError::Config(format!("{} is not set", Self::PASSWORD_VAR)))?;
        if username.is_empty() || password.is_empty() {
            return Err(TeatimeError::Config(
                "credentials must not be empty".to_string(),
            ));
        }
        Ok(Self { username, password })
    }

    /// Username safe for logs: first and last three characters only.
    pub fn masked_username(&self) -> String {
        if self.username.len() <= 6 {
            return "***".to_string();
        }
        format!(
            "{}...{}",
            &self.username[..3],
            &self.username[self.username.len() - 3..]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Weekday};
    use std::io::Write;

    #[test]
    fn defaults_are_a_valid_config() {
        let config = TeatimeConfig::default();
        config.validate().unwrap();
        assert!(config.runtime.dry_run);
        assert_eq!(config.runtime.max_retries, 2);
        assert_eq!(config.window.days_in_advance, 7);

        let target = config.booking_target().unwrap();
        assert_eq!(target.day, TargetDay::Weekday(Weekday::Sun));
        assert_eq!(target.time, NaiveTime::from_hms_opt(14, 0, 0).unwrap());
        assert_eq!(target.players, 4);

        let window = config.booking_window().unwrap();
        assert_eq!(window.open_time, NaiveTime::from_hms_opt(6, 0, 0).unwrap());
        assert_eq!(window.lead, Duration::seconds(5));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config =
            TeatimeConfig::load_or_default(Path::new("/nonexistent/teatime.toml")).unwrap();
        assert!(config.runtime.dry_run);
    }

    #[test]
    fn partial_file_keeps_section_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[booking]\ntarget_day = \"Saturday\"\ntarget_time = \"7:30 AM\"\n\n[runtime]\nmax_retries = 5"
        )
        .unwrap();

        let config = TeatimeConfig::load_or_default(file.path()).unwrap();
        let target = config.booking_target().unwrap();
        assert_eq!(target.day, TargetDay::Weekday(Weekday::Sat));
        assert_eq!(target.time, NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert_eq!(target.players, 4);
        assert_eq!(config.runtime.max_retries, 5);
        assert!(config.runtime.dry_run);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not toml [[[").unwrap();

        let err = TeatimeConfig::load_or_default(file.path()).unwrap_err();
        assert!(matches!(err, TeatimeError::Config(_)));
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn bad_offset_fails_validation() {
        let mut config = TeatimeConfig::default();
        config.window.utc_offset = "central".to_string();
        assert!(matches!(
            config.validate(),
            Err(TeatimeError::Config(_))
        ));
    }

    #[test]
    fn zero_players_rejected() {
        let mut config = TeatimeConfig::default();
        config.booking.players = 0;
        assert!(config.booking_target().is_err());
    }

    #[test]
    fn write_default_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("teatime.toml");
        TeatimeConfig::write_default(&path).unwrap();

        let config = TeatimeConfig::load_or_default(&path).unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn site_urls() {
        let site = SiteSettings::default();
        let date = NaiveDate::from_ymd_opt(2026, 8, 16).unwrap();

        assert_eq!(
            site.login_url(),
            "https://customer-cc36.clubcaddie.com/login?clubid=103412"
        );
        assert_eq!(
            site.tee_sheet_url(date),
            "https://customer-cc36.clubcaddie.com/TeeSheet/view/cbfdabab/sheet?date=2026-08-16"
        );

        let booking = site.booking_urls(date);
        assert_eq!(booking.len(), 2);
        assert!(booking[0].contains("/TeeTimes/view/"));
        assert!(booking[1].contains("/TeeTimes/booking/"));
        assert!(booking[0].contains("date=08%2F16%2F2026"));
    }

    #[test]
    fn masked_username_hides_the_middle() {
        let creds = Credentials {
            username: "golfer@example.com".to_string(),
            password: "secret".to_string(),
        };
        let masked = creds.masked_username();
        assert!(masked.starts_with("gol"));
        assert!(masked.ends_with("com"));
        assert!(!masked.contains("example"));

        let short = Credentials {
            username: "abc".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(short.masked_username(), "***");
    }
}
