//! Booking orchestrator
//!
//! One run, one browser session, one outcome. The pipeline is strictly
//! sequential: wait for the window, authenticate, navigate, classify,
//! extract, rank, reserve. There is nothing to parallelize; only one
//! reservation can succeed and the site's state is shared and external.
//!
//! Every run terminates with exactly one [`AttemptOutcome`]. Partial
//! progress under a blown deadline is reported as Failed with the partial
//! state on record, never reinterpreted as success.

use crate::classify::PageClassifier;
use crate::driver::{DriveOutcome, ReservationDriver};
use crate::rank::rank;
use crate::retry::{route_for_attempt, RetryController, RetryPolicy, RetryState};
use crate::timing::{Clock, TimingController};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use teatime_core::{
    candidate_dates, resolve_target_date, AttemptOutcome, BookingTarget, BookingWindow,
    PageVariant, Result, SiteSettings, Slot, StepRecord, StepStatus, TeatimeConfig, TeatimeError,
};
use teatime_browser::auth::SessionAuthenticator;
use teatime_browser::page::Page;
use tracing::{info, warn};

/// Where the engine hands off step transitions. The engine only produces the
/// data; formatting, logging, and artifact storage live behind this trait.
#[async_trait]
pub trait StepSink: Send + Sync {
    /// A step transition happened.
    fn record(&self, record: &StepRecord);

    /// Capture diagnostic page state, returning a reference for the trace.
    async fn capture(&self, label: &str) -> Option<String>;
}

/// Sink that drops everything; for tests and bare runs.
pub struct NullSink;

#[async_trait]
impl StepSink for NullSink {
    fn record(&self, _record: &StepRecord) {}

    async fn capture(&self, _label: &str) -> Option<String> {
        None
    }
}

/// Resolved, immutable configuration for one run. Built once from the
/// validated [`TeatimeConfig`]; the orchestrator never reads ambient state.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub target: BookingTarget,
    pub window: BookingWindow,
    pub site: SiteSettings,
    pub dry_run: bool,
    pub retry: RetryPolicy,
    pub run_budget: chrono::Duration,
    pub skip_wait: bool,
}

impl RunConfig {
    pub fn from_config(config: &TeatimeConfig) -> Result<Self> {
        Ok(Self {
            target: config.booking_target()?,
            window: config.booking_window()?,
            site: config.site.clone(),
            dry_run: config.runtime.dry_run,
            retry: RetryPolicy::from_runtime(&config.runtime),
            run_budget: chrono::Duration::seconds(config.runtime.run_budget_seconds as i64),
            skip_wait: config.runtime.skip_wait,
        })
    }
}

struct PipelineFailure {
    reason: String,
    partial: Option<Slot>,
}

/// Composes the booking pipeline into an end-to-end run.
pub struct Orchestrator<'a> {
    config: RunConfig,
    classifier: PageClassifier,
    clock: &'a dyn Clock,
    auth: &'a dyn SessionAuthenticator,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: RunConfig,
        clock: &'a dyn Clock,
        auth: &'a dyn SessionAuthenticator,
    ) -> Self {
        Self {
            config,
            classifier: PageClassifier::with_default_strategies(),
            clock,
            auth,
        }
    }

    pub fn with_classifier(mut self, classifier: PageClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Execute one booking attempt end to end.
    pub async fn run(&self, page: &dyn Page, sink: &dyn StepSink) -> AttemptOutcome {
        let started = self.clock.now();
        let deadline = started + self.config.run_budget;
        let mut steps: Vec<StepRecord> = Vec::new();

        info!(
            "Starting booking run (target: {} at {}, {} players, dry_run: {})",
            self.config.target.day,
            self.config.target.time.format("%H:%M"),
            self.config.target.players,
            self.config.dry_run
        );

        match self
            .run_pipeline(page, sink, deadline, &mut steps)
            .await
        {
            Ok((slot, DriveOutcome::Confirmed)) => AttemptOutcome::booked(slot, steps, started),
            Ok((slot, DriveOutcome::DryRunStopped)) => {
                AttemptOutcome::dry_run_preview(slot, steps, started)
            }
            Err(failure) => {
                warn!("Booking run failed: {}", failure.reason);
                AttemptOutcome::failed(failure.reason, failure.partial, steps, started)
            }
        }
    }

    async fn run_pipeline(
        &self,
        page: &dyn Page,
        sink: &dyn StepSink,
        deadline: DateTime<Utc>,
        steps: &mut Vec<StepRecord>,
    ) -> std::result::Result<(Slot, DriveOutcome), PipelineFailure> {
        let retry = RetryController::new(self.clock);
        let timing = TimingController::new(self.config.window, self.clock);

        // Resolve the target date
        self.check_deadline(deadline, sink, steps, "resolve_date", None)
            .await?;
        let target_date = self.resolve_date(&timing);
        record(sink, steps, StepRecord::new("resolve_date", StepStatus::Completed));

        // Wait for the booking window
        if self.config.skip_wait {
            info!("Window wait skipped by configuration");
        } else {
            match timing.wait_until_open(target_date, Some(deadline)).await {
                Ok(open) => {
                    info!("Booking window open since {}", open);
                    record(sink, steps, StepRecord::new("wait_window", StepStatus::Completed));
                }
                Err(e) => {
                    return Err(self
                        .phase_failed(sink, steps, "wait_window", &e, None)
                        .await)
                }
            }
        }

        // Ensure an authenticated session
        self.check_deadline(deadline, sink, steps, "authenticate", None)
            .await?;
        let (result, state) = retry
            .run("authenticate", &self.config.retry, |_| {
                self.auth.ensure_authenticated(page)
            })
            .await;
        if let Err(e) = result {
            return Err(self
                .phase_failed(sink, steps, "authenticate", &e, None)
                .await);
        }
        record(sink, steps, step_record("authenticate", &state));

        // Navigate to a bookable view, rotating through fallback routes
        self.check_deadline(deadline, sink, steps, "navigate", None)
            .await?;
        let mut routes = self.config.site.booking_urls(target_date);
        routes.push(self.config.site.tee_sheet_url(target_date));
        let (result, state) = retry
            .run("navigate", &self.config.retry, |attempt| {
                let route = route_for_attempt(&routes, attempt).to_string();
                async move {
                    page.navigate(&route).await?;
                    let classification = self.classifier.classify(page).await;
                    match classification.variant {
                        PageVariant::Unknown => Err(TeatimeError::UnknownVariant {
                            url: page.current_url().await.unwrap_or_default(),
                        }),
                        PageVariant::Login => Err(TeatimeError::Navigation(
                            "redirected back to login".to_string(),
                        )),
                        _ => Ok(classification),
                    }
                }
            })
            .await;
        let classification = match result {
            Ok(c) => c,
            Err(e) => {
                return Err(self.phase_failed(sink, steps, "navigate", &e, None).await)
            }
        };
        record(sink, steps, step_record("navigate", &state));
        // classify() only hands back bookable variants with a strategy
        let Some(strategy) = classification.strategy else {
            let e = TeatimeError::Other("classification carried no strategy".to_string());
            return Err(self.phase_failed(sink, steps, "navigate", &e, None).await);
        };

        // Extract slots; a partial page load earns one reload per retry
        self.check_deadline(deadline, sink, steps, "extract", None)
            .await?;
        let (result, state) = retry
            .run("extract", &self.config.retry, |attempt| {
                let strategy = Arc::clone(&strategy);
                async move {
                    if attempt > 0 {
                        page.reload().await?;
                    }
                    strategy.extract_slots(page, target_date).await
                }
            })
            .await;
        let slots = match result {
            Ok(slots) => slots,
            Err(e) => {
                return Err(self.phase_failed(sink, steps, "extract", &e, None).await)
            }
        };
        record(sink, steps, step_record("extract", &state));
        info!("Extracted {} open slot(s)", slots.len());

        // Rank against the target
        let candidates = match rank(&slots, &self.config.target, target_date) {
            Ok(candidates) => candidates,
            Err(e) => return Err(self.phase_failed(sink, steps, "rank", &e, None).await),
        };
        let chosen = candidates[0].slot.clone();
        record(sink, steps, StepRecord::new("rank", StepStatus::Completed));
        info!(
            "Best candidate: {} on {} ({} min from target)",
            chosen.time.format("%H:%M"),
            chosen.day,
            candidates[0].time_distance_min
        );

        // Drive the reservation; each retry restarts the state machine from
        // a re-entered view (slots are never reused across navigations)
        self.check_deadline(deadline, sink, steps, "reserve", Some(&chosen))
            .await?;
        let (result, state) = retry
            .run("reserve", &self.config.retry, |attempt| {
                let strategy = Arc::clone(&strategy);
                let chosen = chosen.clone();
                let retry_route = route_for_attempt(&routes, attempt).to_string();
                async move {
                    let slot = if attempt == 0 {
                        chosen
                    } else {
                        page.navigate(&retry_route).await?;
                        let fresh = strategy.extract_slots(page, target_date).await?;
                        fresh
                            .into_iter()
                            .find(|s| s.day == chosen.day && s.time == chosen.time)
                            .ok_or_else(|| {
                                TeatimeError::Extraction(
                                    "selected slot no longer present".to_string(),
                                )
                            })?
                    };
                    let mut driver =
                        ReservationDriver::new(strategy.as_ref(), self.config.dry_run);
                    driver
                        .drive(page, &slot, self.config.target.players)
                        .await
                }
            })
            .await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                return Err(self
                    .phase_failed(sink, steps, "reserve", &e, Some(&chosen))
                    .await)
            }
        };
        record(sink, steps, step_record("reserve", &state));

        Ok((chosen, outcome))
    }

    /// The concrete date to book. A weekday target outside the window falls
    /// back to the furthest reachable date, which is where new availability
    /// appears when the window rolls over.
    fn resolve_date(&self, timing: &TimingController<'_>) -> NaiveDate {
        let today = timing.club_today();
        let window_days = self.config.window.days_in_advance;
        match resolve_target_date(&self.config.target.day, today, window_days) {
            Some(date) => date,
            None => {
                let candidates = candidate_dates(today, window_days.max(1));
                let fallback = candidates[candidates.len() - 1].date;
                warn!(
                    "Target day {} not reachable within {} day(s); defaulting to {}",
                    self.config.target.day, window_days, fallback
                );
                fallback
            }
        }
    }

    async fn check_deadline(
        &self,
        deadline: DateTime<Utc>,
        sink: &dyn StepSink,
        steps: &mut Vec<StepRecord>,
        phase: &str,
        partial: Option<&Slot>,
    ) -> std::result::Result<(), PipelineFailure> {
        if self.clock.now() < deadline {
            return Ok(());
        }
        Err(self
            .phase_failed(sink, steps, phase, &TeatimeError::DeadlineExceeded, partial)
            .await)
    }

    async fn phase_failed(
        &self,
        sink: &dyn StepSink,
        steps: &mut Vec<StepRecord>,
        phase: &str,
        error: &TeatimeError,
        partial: Option<&Slot>,
    ) -> PipelineFailure {
        let capture = sink.capture(&format!("{}_failed", phase)).await;
        let mut failed = StepRecord::new(phase, StepStatus::Failed);
        if let Some(reference) = capture {
            failed = failed.with_capture(reference);
        }
        record(sink, steps, failed);

        let reason = match error {
            TeatimeError::NoAvailableSlot => "no matching availability".to_string(),
            TeatimeError::DeadlineExceeded => "deadline exceeded".to_string(),
            other => other.to_string(),
        };
        PipelineFailure {
            reason,
            partial: partial.cloned(),
        }
    }
}

fn record(sink: &dyn StepSink, steps: &mut Vec<StepRecord>, record: StepRecord) {
    sink.record(&record);
    steps.push(record);
}

fn step_record(name: &str, state: &RetryState) -> StepRecord {
    let status = if state.was_retried() {
        StepStatus::Retried
    } else {
        StepStatus::Completed
    };
    StepRecord::new(name, status)
}
