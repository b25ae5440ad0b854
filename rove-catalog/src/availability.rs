use chrono::NaiveDate;
use crate::activity::{Activity, TimeSlot};

/// Rejections from the availability check, in the order the checks run.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AvailabilityError {
    #[error("Date {0} is blacked out for this activity")]
    DateBlackedOut(NaiveDate),

    #[error("Requested slot is not in the activity schedule")]
    OutOfSchedule,

    #[error("Participant count {requested} outside allowed range [{min}, {max}]")]
    CapacityExceeded {
        requested: u32,
        min: u32,
        max: u32,
    },

    #[error("Slot is full: requested {requested}, remaining {remaining}")]
    SlotFull {
        requested: u32,
        remaining: u32,
    },
}

/// Validate a candidate booking against the activity's rules.
///
/// `already_booked` is the participant count currently consuming the slot
/// (pending and confirmed bookings). This function is pure; the store re-runs
/// the remaining-capacity comparison under its own lock when inserting, so a
/// race between two callers cannot jointly exceed capacity.
pub fn check_slot(
    activity: &Activity,
    slot: &TimeSlot,
    participants: u32,
    already_booked: u32,
) -> Result<(), AvailabilityError> {
    if activity.blackout_dates.contains(&slot.date) {
        return Err(AvailabilityError::DateBlackedOut(slot.date));
    }

    if !activity.schedule.contains(slot) {
        return Err(AvailabilityError::OutOfSchedule);
    }

    let cap = activity.capacity;
    if participants < cap.min || participants > cap.max {
        return Err(AvailabilityError::CapacityExceeded {
            requested: participants,
            min: cap.min,
            max: cap.max,
        });
    }

    let remaining = cap.max.saturating_sub(already_booked);
    if participants > remaining {
        return Err(AvailabilityError::SlotFull {
            requested: participants,
            remaining,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityPricing, Capacity, Schedule};
    use uuid::Uuid;

    fn activity() -> (Activity, TimeSlot) {
        let slot = TimeSlot {
            date: "2026-09-05".parse().unwrap(),
            start_time: "10:00:00".parse().unwrap(),
            end_time: "13:00:00".parse().unwrap(),
        };
        let activity = Activity {
            id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            title: "Coastal kayak tour".to_string(),
            capacity: Capacity { min: 1, max: 10 },
            schedule: Schedule::Fixed { slots: vec![slot] },
            blackout_dates: vec!["2026-09-12".parse().unwrap()],
            pricing: ActivityPricing {
                base_price: 4500,
                currency: "USD".to_string(),
                tax_rate: 0.1,
                discount: None,
            },
            cancellation_policy: None,
            is_active: true,
        };
        (activity, slot)
    }

    #[test]
    fn test_accepts_valid_request() {
        let (activity, slot) = activity();
        assert!(check_slot(&activity, &slot, 2, 0).is_ok());
    }

    #[test]
    fn test_blackout_checked_first() {
        let (activity, _) = activity();
        let blacked_out = TimeSlot {
            date: "2026-09-12".parse().unwrap(),
            start_time: "10:00:00".parse().unwrap(),
            end_time: "13:00:00".parse().unwrap(),
        };
        // Slot is also out of schedule, but blackout wins the ordering
        assert_eq!(
            check_slot(&activity, &blacked_out, 2, 0),
            Err(AvailabilityError::DateBlackedOut("2026-09-12".parse().unwrap()))
        );
    }

    #[test]
    fn test_out_of_schedule() {
        let (activity, slot) = activity();
        let unlisted = TimeSlot {
            date: slot.date,
            start_time: "11:00:00".parse().unwrap(),
            end_time: slot.end_time,
        };
        assert_eq!(check_slot(&activity, &unlisted, 2, 0), Err(AvailabilityError::OutOfSchedule));
    }

    #[test]
    fn test_participant_count_bounds() {
        let (activity, slot) = activity();
        assert!(matches!(
            check_slot(&activity, &slot, 11, 0),
            Err(AvailabilityError::CapacityExceeded { requested: 11, .. })
        ));
        assert!(matches!(
            check_slot(&activity, &slot, 0, 0),
            Err(AvailabilityError::CapacityExceeded { requested: 0, .. })
        ));
    }

    #[test]
    fn test_slot_full_accounts_for_existing_bookings() {
        let (activity, slot) = activity();
        assert!(check_slot(&activity, &slot, 3, 7).is_ok());
        assert_eq!(
            check_slot(&activity, &slot, 4, 7),
            Err(AvailabilityError::SlotFull { requested: 4, remaining: 3 })
        );
    }
}
