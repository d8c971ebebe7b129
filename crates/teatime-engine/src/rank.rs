//! Slot ranking
//!
//! Pure ordering logic, no I/O. Given the slots read off the page and the
//! booking target, produce the candidates best-first. Lack of any candidate
//! is a legitimate outcome ([`TeatimeError::NoAvailableSlot`]), distinct from
//! an empty-but-successful list: the site's availability will not change
//! within the run's window, so the orchestrator reports instead of retrying.

use chrono::NaiveDate;
use teatime_core::{BookingTarget, RankedCandidate, Result, Slot, TeatimeError};
use tracing::debug;

/// Rank `slots` against the target, best candidate first.
///
/// `resolved_day` is the concrete date the target day resolved to; day
/// distance is the secondary key so weekday targets prefer the nearest
/// occurrence. Slots without room for the requested player count are
/// excluded outright, even when they are the closest in time.
///
/// Ordering is total and deterministic: time distance, then day distance,
/// then earlier time-of-day, then presentation order (stable sort).
pub fn rank(
    slots: &[Slot],
    target: &BookingTarget,
    resolved_day: NaiveDate,
) -> Result<Vec<RankedCandidate>> {
    let target_minutes = target.minutes();

    let mut candidates: Vec<RankedCandidate> = slots
        .iter()
        .filter(|slot| slot.open_seats >= target.players)
        .map(|slot| RankedCandidate {
            time_distance_min: (slot.minutes() - target_minutes).abs(),
            day_distance_days: (slot.day - resolved_day).num_days().abs(),
            slot: slot.clone(),
        })
        .collect();

    if candidates.is_empty() {
        debug!(
            "No slot with room for {} player(s) among {} extracted",
            target.players,
            slots.len()
        );
        return Err(TeatimeError::NoAvailableSlot);
    }

    candidates.sort_by(|a, b| {
        a.time_distance_min
            .cmp(&b.time_distance_min)
            .then(a.day_distance_days.cmp(&b.day_distance_days))
            .then(a.slot.time.cmp(&b.slot.time))
    });

    debug!(
        "Ranked {} candidate(s), best: {} ({} min off target)",
        candidates.len(),
        candidates[0].slot.time.format("%H:%M"),
        candidates[0].time_distance_min
    );

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Weekday};
    use teatime_core::{SlotLocator, TargetDay};

    fn day() -> NaiveDate {
        // A Sunday
        NaiveDate::from_ymd_opt(2026, 8, 16).unwrap()
    }

    fn slot(hour: u32, minute: u32, open_seats: u8) -> Slot {
        Slot {
            day: day(),
            time: NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
            capacity: 4,
            open_seats,
            locator: SlotLocator::Form {
                id: format!("TeeSheetForm{}{}", hour, minute),
            },
        }
    }

    fn target(hour: u32, minute: u32, players: u8) -> BookingTarget {
        BookingTarget {
            day: TargetDay::Weekday(Weekday::Sun),
            time: NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
            players,
        }
    }

    #[test]
    fn best_candidate_minimizes_time_distance() {
        let slots = vec![slot(9, 0, 4), slot(13, 45, 4), slot(16, 0, 4)];
        let ranked = rank(&slots, &target(14, 0, 4), day()).unwrap();

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].slot.time, NaiveTime::from_hms_opt(13, 45, 0).unwrap());
        assert_eq!(ranked[0].time_distance_min, 15);
        // Every later candidate is at least as far from the target
        for pair in ranked.windows(2) {
            assert!(pair[0].time_distance_min <= pair[1].time_distance_min);
        }
    }

    #[test]
    fn insufficient_capacity_excluded_even_when_closest() {
        // Target Sunday 14:00 for 4: 13:30 has room, 14:15 is closer but full
        let slots = vec![slot(13, 30, 4), slot(14, 15, 2)];
        let ranked = rank(&slots, &target(14, 0, 4), day()).unwrap();

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].slot.time, NaiveTime::from_hms_opt(13, 30, 0).unwrap());
    }

    #[test]
    fn all_insufficient_is_no_available_slot() {
        let slots = vec![slot(13, 30, 2), slot(14, 15, 1)];
        let err = rank(&slots, &target(14, 0, 4), day()).unwrap_err();
        assert!(matches!(err, TeatimeError::NoAvailableSlot));
        assert!(!err.is_transient());
    }

    #[test]
    fn empty_input_is_no_available_slot() {
        let err = rank(&[], &target(14, 0, 4), day()).unwrap_err();
        assert!(matches!(err, TeatimeError::NoAvailableSlot));
    }

    #[test]
    fn equidistant_ties_break_to_earlier_time() {
        // 07:00 and 08:00 are both 30 minutes from 07:30
        let slots = vec![slot(8, 0, 4), slot(7, 0, 4)];
        let ranked = rank(&slots, &target(7, 30, 4), day()).unwrap();

        assert_eq!(ranked[0].slot.time, NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        assert_eq!(ranked[0].time_distance_min, ranked[1].time_distance_min);
    }

    #[test]
    fn nearer_day_wins_at_equal_time_distance() {
        let mut far = slot(14, 0, 4);
        far.day = day() + chrono::Duration::days(7);
        let near = slot(14, 0, 4);

        let ranked = rank(&[far, near], &target(14, 0, 4), day()).unwrap();
        assert_eq!(ranked[0].day_distance_days, 0);
        assert_eq!(ranked[1].day_distance_days, 7);
    }

    #[test]
    fn ranking_is_idempotent() {
        let slots = vec![slot(7, 0, 4), slot(8, 0, 4), slot(9, 30, 4), slot(14, 0, 2)];
        let t = target(8, 15, 2);

        let once = rank(&slots, &t, day()).unwrap();
        let re_input: Vec<Slot> = once.iter().map(|c| c.slot.clone()).collect();
        let twice = rank(&re_input, &t, day()).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn presentation_order_is_preserved_for_full_ties() {
        // Identical times: stable sort keeps the site's order
        let first = slot(10, 0, 4);
        let mut second = slot(10, 0, 4);
        second.locator = SlotLocator::Element {
            selector: "[data-teatime-slot='slot-1']".into(),
        };

        let ranked = rank(&[first.clone(), second.clone()], &target(10, 0, 4), day()).unwrap();
        assert_eq!(ranked[0].slot, first);
        assert_eq!(ranked[1].slot, second);
    }
}
