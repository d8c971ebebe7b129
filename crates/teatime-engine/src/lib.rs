//! # teatime-engine
//!
//! The booking orchestration engine: everything between "the window is about
//! to open" and "here is what happened".
//!
//! The pipeline, in execution order:
//!
//! 1. [`timing::TimingController`] waits for the reservation window
//! 2. The [`retry::RetryController`] guards navigation and authentication
//! 3. [`classify::PageClassifier`] decides which UI variant the site rendered
//! 4. The matching [`variant::VariantStrategy`] extracts the visible slots
//! 5. [`rank::rank`] orders them against the booking target
//! 6. [`driver::ReservationDriver`] walks the reservation state machine
//! 7. [`orchestrator::Orchestrator`] composes it all into one
//!    [`teatime_core::AttemptOutcome`]
//!
//! Everything is written against `&dyn Page`, so the whole engine runs on
//! scripted fakes in tests; no test here touches a browser.

pub mod classify;
pub mod driver;
pub mod orchestrator;
pub mod rank;
pub mod retry;
pub mod timing;
pub mod variant;

pub use classify::{Classification, PageClassifier};
pub use driver::{DriveOutcome, ReservationDriver};
pub use orchestrator::{NullSink, Orchestrator, RunConfig, StepSink};
pub use rank::rank;
pub use retry::{RetryController, RetryPolicy, RetryState};
pub use timing::{Clock, SystemClock, TimingController};
pub use variant::{BookingListStrategy, TeeSheetStrategy, VariantStrategy};
