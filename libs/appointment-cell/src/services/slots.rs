// libs/appointment-cell/src/services/slots.rs
use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{AvailabilitySlot, BookedInterval};

pub const OPENING_HOUR: u32 = 9;
pub const CLOSING_HOUR: u32 = 17;
pub const SLOT_MINUTES: u32 = 30;

/// Fixed-grid availability calendar: 16 half-hour slots between 09:00 and
/// 17:00 for the given day. A slot is unavailable when an active
/// appointment's interval contains its start time, or when the start is not
/// strictly in the future. Results are advisory; the authoritative conflict
/// check happens at booking time.
pub fn day_slots(
    date: NaiveDate,
    booked: &[BookedInterval],
    now: DateTime<Utc>,
) -> Vec<AvailabilitySlot> {
    let mut slots = Vec::with_capacity(((CLOSING_HOUR - OPENING_HOUR) * 60 / SLOT_MINUTES) as usize);

    for hour in OPENING_HOUR..CLOSING_HOUR {
        for minute in [0, SLOT_MINUTES] {
            let time = date
                .and_hms_opt(hour, minute, 0)
                .expect("grid times are always valid")
                .and_utc();

            let is_booked = booked
                .iter()
                .any(|apt| apt.scheduled_at <= time && time < apt.end());

            slots.push(AvailabilitySlot {
                time,
                available: !is_booked && time > now,
            });
        }
    }

    slots
}
