//! Core type definitions for the teatime booking engine

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which of the known UI layouts the target site is currently presenting.
///
/// Determined fresh on every page load and never persisted; the site renders
/// different markup depending on entry path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageVariant {
    /// Calendar-grid tee sheet (per-slot forms)
    TeeSheet,
    /// Booking sub-page with time cards/rows
    BookingList,
    /// Login form
    Login,
    /// None of the known signal sets matched
    Unknown,
}

impl std::fmt::Display for PageVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TeeSheet => write!(f, "tee_sheet"),
            Self::BookingList => write!(f, "booking_list"),
            Self::Login => write!(f, "login"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// How to act on a slot after extraction.
///
/// Carried through the extraction payload so the driver can address the same
/// element the extractor saw, on whichever variant produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotLocator {
    /// Tee-sheet variant: per-slot form submitted by id
    Form { id: String },
    /// Booking-list variant: clickable element addressed by selector
    Element { selector: String },
}

impl SlotLocator {
    pub fn describe(&self) -> String {
        match self {
            Self::Form { id } => format!("form#{}", id),
            Self::Element { selector } => selector.clone(),
        }
    }
}

/// One candidate reservation unit as read off the current page.
///
/// Slots are ephemeral: reconstructed on every page read, never cached across
/// navigations, because the underlying page can change between reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Calendar date the slot is on
    pub day: NaiveDate,
    /// Tee-off time
    pub time: NaiveTime,
    /// Maximum player capacity of the slot
    pub capacity: u8,
    /// Seats still open
    pub open_seats: u8,
    /// Handle needed to act on the slot
    pub locator: SlotLocator,
}

impl Slot {
    /// Minutes since midnight, the unit slot ranking works in.
    pub fn minutes(&self) -> i64 {
        use chrono::Timelike;
        i64::from(self.time.hour()) * 60 + i64::from(self.time.minute())
    }
}

/// Desired day: either a recurring weekday or one exact date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TargetDay {
    Weekday(Weekday),
    Date(NaiveDate),
}

impl std::fmt::Display for TargetDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Weekday(w) => write!(f, "{}", w),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl std::str::FromStr for TargetDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::Date(date));
        }
        s.parse::<Weekday>()
            .map(Self::Weekday)
            .map_err(|_| format!("Invalid target day: {}", s))
    }
}

impl TryFrom<String> for TargetDay {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TargetDay> for String {
    fn from(day: TargetDay) -> Self {
        day.to_string()
    }
}

/// User-supplied booking goal, immutable for the duration of one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookingTarget {
    pub day: TargetDay,
    pub time: NaiveTime,
    pub players: u8,
}

impl BookingTarget {
    /// Minutes since midnight of the target time.
    pub fn minutes(&self) -> i64 {
        use chrono::Timelike;
        i64::from(self.time.hour()) * 60 + i64::from(self.time.minute())
    }
}

/// A slot plus its computed distance from the booking target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub slot: Slot,
    /// |slot time - target time| in minutes
    pub time_distance_min: i64,
    /// |slot day - resolved target day| in days
    pub day_distance_days: i64,
}

/// The four steps of the reservation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStep {
    SelectSlot,
    SetPlayers,
    Submit,
    Confirm,
}

impl std::fmt::Display for ReservationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelectSlot => write!(f, "select_slot"),
            Self::SetPlayers => write!(f, "set_players"),
            Self::Submit => write!(f, "submit"),
            Self::Confirm => write!(f, "confirm"),
        }
    }
}

impl std::str::FromStr for ReservationStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "select_slot" | "select" => Ok(Self::SelectSlot),
            "set_players" | "players" => Ok(Self::SetPlayers),
            "submit" => Ok(Self::Submit),
            "confirm" => Ok(Self::Confirm),
            _ => Err(format!("Invalid reservation step: {}", s)),
        }
    }
}

/// Reservation driver state.
///
/// `Idle → SlotSelected → PlayersSet → Submitted → Confirmed`, or
/// `Failed(step)` from any state. No transition skips a state; the driver
/// re-verifies page state before advancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    Idle,
    SlotSelected,
    PlayersSet,
    Submitted,
    Confirmed,
    Failed(ReservationStep),
}

impl ReservationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed(_))
    }

    /// The state a successfully verified step advances into.
    pub fn after(step: ReservationStep) -> Self {
        match step {
            ReservationStep::SelectSlot => Self::SlotSelected,
            ReservationStep::SetPlayers => Self::PlayersSet,
            ReservationStep::Submit => Self::Submitted,
            ReservationStep::Confirm => Self::Confirmed,
        }
    }
}

impl std::fmt::Display for ReservationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::SlotSelected => write!(f, "slot_selected"),
            Self::PlayersSet => write!(f, "players_set"),
            Self::Submitted => write!(f, "submitted"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Failed(step) => write!(f, "failed({})", step),
        }
    }
}

/// Terminal status of one orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Booked,
    DryRunPreview,
    Failed,
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Booked => write!(f, "booked"),
            Self::DryRunPreview => write!(f, "dry_run_preview"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Status of one recorded pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Retried,
    Failed,
}

/// One entry of the step trace, emitted at each major step transition.
///
/// The engine only produces the data; formatting and persistence belong to
/// the logging/capture collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub status: StepStatus,
    /// Reference to captured diagnostic state (screenshot/HTML dump path)
    pub capture: Option<String>,
}

impl StepRecord {
    pub fn new(name: impl Into<String>, status: StepStatus) -> Self {
        Self {
            name: name.into(),
            timestamp: Utc::now(),
            status,
            capture: None,
        }
    }

    pub fn with_capture(mut self, reference: impl Into<String>) -> Self {
        self.capture = Some(reference.into());
        self
    }
}

/// Terminal record of one orchestration run, immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptOutcome {
    pub run_id: Uuid,
    pub status: AttemptStatus,
    pub chosen_slot: Option<Slot>,
    pub reason: Option<String>,
    pub steps: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AttemptOutcome {
    /// Booked outcome. Only reachable on explicit UI confirmation, which is
    /// why the slot is not optional here.
    pub fn booked(slot: Slot, steps: Vec<StepRecord>, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: AttemptStatus::Booked,
            chosen_slot: Some(slot),
            reason: None,
            steps,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Dry-run preview carrying the slot that would have been booked.
    pub fn dry_run_preview(slot: Slot, steps: Vec<StepRecord>, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: AttemptStatus::DryRunPreview,
            chosen_slot: Some(slot),
            reason: None,
            steps,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Failed outcome. `partial_slot` records how far the run got (e.g. slot
    /// selected but never confirmed).
    pub fn failed(
        reason: impl Into<String>,
        partial_slot: Option<Slot>,
        steps: Vec<StepRecord>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: AttemptStatus::Failed,
            chosen_slot: partial_slot,
            reason: Some(reason.into()),
            steps,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(
            self.status,
            AttemptStatus::Booked | AttemptStatus::DryRunPreview
        )
    }
}

/// Resolved booking-window parameters.
///
/// Whether the window opens 7 or 8 days ahead, and at midnight or 6am, is
/// operator-specific; both come from configuration.
#[derive(Debug, Clone, Copy)]
pub struct BookingWindow {
    /// How many days before the target date the window opens
    pub days_in_advance: u32,
    /// Club-local time of day the window opens
    pub open_time: NaiveTime,
    /// Club-local timezone as a fixed UTC offset
    pub utc_offset: FixedOffset,
    /// Pre-warm lead: start this much before the opening instant
    pub lead: Duration,
    /// Sleep increment while waiting (short, for drift tolerance)
    pub poll_interval: Duration,
}
