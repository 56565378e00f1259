// libs/appointment-cell/src/services/overlap.rs
use chrono::{DateTime, Duration, Utc};

use crate::models::Appointment;

/// Half-open interval overlap test: `[s1, s1+d1)` conflicts with
/// `[s2, s2+d2)` iff `s1 < s2+d2 && s1+d1 > s2`. Touching endpoints do not
/// conflict, so back-to-back appointments are legal.
pub fn intervals_overlap(
    start_a: DateTime<Utc>,
    duration_a: i32,
    start_b: DateTime<Utc>,
    duration_b: i32,
) -> bool {
    let end_a = start_a + Duration::minutes(duration_a as i64);
    let end_b = start_b + Duration::minutes(duration_b as i64);
    start_a < end_b && end_a > start_b
}

/// Scan a doctor's active appointments for one overlapping the candidate
/// interval. Callers pre-filter to SCHEDULED/CONFIRMED records.
pub fn find_conflict(
    candidate_start: DateTime<Utc>,
    candidate_duration: i32,
    existing: &[Appointment],
) -> Option<&Appointment> {
    existing.iter().find(|apt| {
        intervals_overlap(candidate_start, candidate_duration, apt.scheduled_at, apt.duration)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn overlapping_intervals_conflict() {
        assert!(intervals_overlap(at(10, 0), 30, at(10, 15), 30));
        assert!(intervals_overlap(at(10, 15), 30, at(10, 0), 30));
    }

    #[test]
    fn containment_conflicts() {
        assert!(intervals_overlap(at(10, 0), 60, at(10, 15), 15));
        assert!(intervals_overlap(at(10, 15), 15, at(10, 0), 60));
    }

    #[test]
    fn touching_endpoints_do_not_conflict() {
        assert!(!intervals_overlap(at(10, 0), 30, at(10, 30), 30));
        assert!(!intervals_overlap(at(10, 30), 30, at(10, 0), 30));
    }

    #[test]
    fn disjoint_intervals_do_not_conflict() {
        assert!(!intervals_overlap(at(9, 0), 30, at(14, 0), 30));
    }

    #[test]
    fn identical_intervals_conflict() {
        assert!(intervals_overlap(at(10, 0), 30, at(10, 0), 30));
    }
}
