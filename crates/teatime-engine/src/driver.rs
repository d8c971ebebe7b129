//! Reservation driver
//!
//! Walks one chosen slot through the reservation sequence:
//! `Idle → SlotSelected → PlayersSet → Submitted → Confirmed`, failing into
//! `Failed(step)` from any state. Every step performs its UI action and then
//! verifies the resulting page state before advancing; an action that merely
//! did not throw proves nothing on this site.
//!
//! In dry-run mode the driver performs every step up to but excluding the
//! irreversible submission and stops at `PlayersSet`. Dry-run can never reach
//! `Confirmed`, no matter how often the caller retries.

use crate::variant::VariantStrategy;
use teatime_core::{ReservationState, ReservationStep, Result, Slot, TeatimeError};
use teatime_browser::page::Page;
use tracing::{debug, info};

/// How a completed drive ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutcome {
    /// The site acknowledged the reservation.
    Confirmed,
    /// Dry run: stopped just before submission.
    DryRunStopped,
}

/// Drives the reservation sequence for a single slot.
///
/// One driver instance is one attempt; the state machine is not reusable
/// after reaching a terminal state.
pub struct ReservationDriver<'a> {
    strategy: &'a dyn VariantStrategy,
    dry_run: bool,
    state: ReservationState,
}

impl<'a> ReservationDriver<'a> {
    pub fn new(strategy: &'a dyn VariantStrategy, dry_run: bool) -> Self {
        Self {
            strategy,
            dry_run,
            state: ReservationState::Idle,
        }
    }

    pub fn state(&self) -> ReservationState {
        self.state
    }

    fn fail(&mut self, step: ReservationStep, detail: impl Into<String>) -> TeatimeError {
        self.state = ReservationState::Failed(step);
        TeatimeError::Step {
            step,
            detail: detail.into(),
        }
    }

    /// Run the sequence for `slot`.
    pub async fn drive(
        &mut self,
        page: &dyn Page,
        slot: &Slot,
        players: u8,
    ) -> Result<DriveOutcome> {
        if self.state != ReservationState::Idle {
            return Err(TeatimeError::Other(format!(
                "reservation driver reused from state {}",
                self.state
            )));
        }
        let strategy = self.strategy;

        info!(
            "Driving reservation for {} on {} ({} players, dry_run: {})",
            slot.time.format("%H:%M"),
            slot.day,
            players,
            self.dry_run
        );

        // Select slot
        let step = ReservationStep::SelectSlot;
        debug!("Selecting slot via {}", slot.locator.describe());
        if let Err(e) = strategy.select_slot(page, slot).await {
            return Err(self.fail(step, e.to_string()));
        }
        match strategy.selection_visible(page).await {
            Ok(true) => {}
            Ok(false) => return Err(self.fail(step, "booking form did not appear")),
            Err(e) => return Err(self.fail(step, e.to_string())),
        }
        self.state = ReservationState::SlotSelected;
        debug!("State: {}", self.state);

        // Set players
        let step = ReservationStep::SetPlayers;
        if let Err(e) = strategy.set_players(page, players).await {
            return Err(self.fail(step, e.to_string()));
        }
        match strategy.players_applied(page, players).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(self.fail(step, format!("player field did not take {}", players)))
            }
            Err(e) => return Err(self.fail(step, e.to_string())),
        }
        self.state = ReservationState::PlayersSet;
        debug!("State: {}", self.state);

        if self.dry_run {
            info!(
                "DRY RUN: stopping before submission; would book {} on {}",
                slot.time.format("%H:%M"),
                slot.day
            );
            return Ok(DriveOutcome::DryRunStopped);
        }

        // Submit
        let step = ReservationStep::Submit;
        if let Err(e) = strategy.submit(page).await {
            return Err(self.fail(step, e.to_string()));
        }
        self.state = ReservationState::Submitted;
        debug!("State: {}", self.state);

        // Confirm: Booked is only ever reported on explicit acknowledgement
        let step = ReservationStep::Confirm;
        match strategy.confirmation_visible(page).await {
            Ok(true) => {}
            Ok(false) => return Err(self.fail(step, "no confirmation element after submit")),
            Err(e) => return Err(self.fail(step, e.to_string())),
        }
        self.state = ReservationState::Confirmed;
        info!("Reservation confirmed");

        Ok(DriveOutcome::Confirmed)
    }
}
