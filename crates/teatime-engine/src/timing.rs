//! Timing controller
//!
//! Computes the absolute instant the reservation window opens for a target
//! date and blocks until just before it. The wait re-checks the wall clock in
//! short increments instead of taking one long sleep, so clock drift cannot
//! strand the run and an external deadline can cancel it cooperatively.
//!
//! Time is read through the [`Clock`] trait; tests drive the controller on a
//! manual clock and never actually sleep.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use teatime_core::{BookingWindow, Result, TeatimeError};
use tracing::{debug, info};

/// Wall-clock source, mockable for tests.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: std::time::Duration);
}

/// The real clock: `Utc::now` + `tokio::time::sleep`.
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: std::time::Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Waits out the time before the booking window opens.
pub struct TimingController<'a> {
    window: BookingWindow,
    clock: &'a dyn Clock,
}

impl<'a> TimingController<'a> {
    pub fn new(window: BookingWindow, clock: &'a dyn Clock) -> Self {
        Self { window, clock }
    }

    /// Today's date in the club's timezone; target-day resolution must use
    /// this, not the machine-local date.
    pub fn club_today(&self) -> NaiveDate {
        self.clock
            .now()
            .with_timezone(&self.window.utc_offset)
            .date_naive()
    }

    /// The UTC instant the window opens for `target_day`: `days_in_advance`
    /// days earlier, at `open_time` club-local.
    pub fn open_instant(&self, target_day: NaiveDate) -> DateTime<Utc> {
        let open_date = target_day - Duration::days(i64::from(self.window.days_in_advance));
        let local = open_date.and_time(self.window.open_time);
        let utc_naive = local - Duration::seconds(i64::from(self.window.utc_offset.local_minus_utc()));
        DateTime::from_naive_utc_and_offset(utc_naive, Utc)
    }

    /// Block until `open_instant(target_day)` minus the configured lead.
    ///
    /// Returns the opening instant. If that moment has already passed (manual
    /// and test runs), returns immediately without sleeping. `deadline`, when
    /// given, aborts the wait with [`TeatimeError::DeadlineExceeded`].
    pub async fn wait_until_open(
        &self,
        target_day: NaiveDate,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>> {
        let open = self.open_instant(target_day);
        let resume_at = open - self.window.lead;

        let now = self.clock.now();
        if now >= resume_at {
            info!(
                "Booking window for {} already open (opened {})",
                target_day, open
            );
            return Ok(open);
        }

        info!(
            "Waiting for booking window: opens {} (resuming at {}, now {})",
            open, resume_at, now
        );

        loop {
            let now = self.clock.now();
            if now >= resume_at {
                debug!("Booking window wait complete at {}", now);
                return Ok(open);
            }
            if let Some(deadline) = deadline {
                if now >= deadline {
                    return Err(TeatimeError::DeadlineExceeded);
                }
            }

            let remaining = resume_at - now;
            let nap = remaining
                .min(self.window.poll_interval)
                .to_std()
                .unwrap_or_default();
            self.clock.sleep(nap).await;
        }
    }
}

#[cfg(test)]
pub(crate) mod test_clock {
    use super::*;
    use std::sync::Mutex;

    /// Manual clock: `sleep` advances `now` instantly.
    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
        pub sleeps: Mutex<u32>,
    }

    impl ManualClock {
        pub fn at(now: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(now),
                sleeps: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }

        async fn sleep(&self, duration: std::time::Duration) {
            *self.sleeps.lock().unwrap() += 1;
            let mut now = self.now.lock().unwrap();
            *now += Duration::from_std(duration).unwrap_or_else(|_| Duration::zero());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_clock::ManualClock;
    use super::*;
    use chrono::{FixedOffset, NaiveTime, TimeZone};

    fn window(lead_secs: i64) -> BookingWindow {
        BookingWindow {
            days_in_advance: 7,
            open_time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            utc_offset: FixedOffset::west_opt(5 * 3600).unwrap(),
            lead: Duration::seconds(lead_secs),
            poll_interval: Duration::milliseconds(250),
        }
    }

    #[test]
    fn open_instant_accounts_for_offset_and_advance() {
        let clock = ManualClock::at(Utc::now());
        let controller = TimingController::new(window(5), &clock);

        // Target Sunday 2026-08-16; window opens 7 days earlier at 06:00
        // UTC-5, which is 11:00 UTC on 2026-08-09.
        let open = controller.open_instant(NaiveDate::from_ymd_opt(2026, 8, 16).unwrap());
        assert_eq!(open, Utc.with_ymd_and_hms(2026, 8, 9, 11, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn blocks_until_lead_then_resumes_promptly() {
        let target = NaiveDate::from_ymd_opt(2026, 8, 16).unwrap();
        let open = Utc.with_ymd_and_hms(2026, 8, 9, 11, 0, 0).unwrap();
        let clock = ManualClock::at(open - Duration::seconds(5));
        let controller = TimingController::new(window(2), &clock);

        let returned = controller.wait_until_open(target, None).await.unwrap();

        assert_eq!(returned, open);
        let resumed_at = clock.now();
        // No earlier than open - lead, and within one poll increment after
        assert!(resumed_at >= open - Duration::seconds(2));
        assert!(resumed_at <= open - Duration::seconds(2) + Duration::milliseconds(250));
        assert!(*clock.sleeps.lock().unwrap() > 0);
    }

    #[tokio::test]
    async fn already_open_returns_without_sleeping() {
        let target = NaiveDate::from_ymd_opt(2026, 8, 16).unwrap();
        let open = Utc.with_ymd_and_hms(2026, 8, 9, 11, 0, 0).unwrap();
        let clock = ManualClock::at(open + Duration::hours(3));
        let controller = TimingController::new(window(5), &clock);

        let returned = controller.wait_until_open(target, None).await.unwrap();

        assert_eq!(returned, open);
        assert_eq!(*clock.sleeps.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn deadline_cancels_the_wait() {
        let target = NaiveDate::from_ymd_opt(2026, 8, 16).unwrap();
        let open = Utc.with_ymd_and_hms(2026, 8, 9, 11, 0, 0).unwrap();
        let now = open - Duration::hours(2);
        let clock = ManualClock::at(now);
        let controller = TimingController::new(window(5), &clock);

        let err = controller
            .wait_until_open(target, Some(now + Duration::seconds(30)))
            .await
            .unwrap_err();

        assert!(matches!(err, TeatimeError::DeadlineExceeded));
    }

    #[test]
    fn club_today_uses_the_club_offset() {
        // 02:00 UTC is still the previous day at UTC-5
        let clock = ManualClock::at(Utc.with_ymd_and_hms(2026, 8, 10, 2, 0, 0).unwrap());
        let controller = TimingController::new(window(5), &clock);
        assert_eq!(
            controller.club_today(),
            NaiveDate::from_ymd_opt(2026, 8, 9).unwrap()
        );
    }
}
