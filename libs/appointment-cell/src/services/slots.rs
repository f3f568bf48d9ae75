use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

use clinic_cell::WorkingHours;

use crate::models::MinuteRange;

fn minutes_to_time(minutes: i64) -> Option<NaiveTime> {
    let minutes = u32::try_from(minutes).ok()?;
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
}

/// Start times on `date` at which a `slot_minutes` appointment fits entirely
/// inside the day's working hours without touching any `booked` range.
/// Candidates step by the slot length from the opening time.
pub fn available_slots(
    working_hours: &WorkingHours,
    slot_minutes: i32,
    date: NaiveDate,
    booked: &[MinuteRange],
) -> Vec<NaiveTime> {
    if slot_minutes <= 0 {
        return Vec::new();
    }
    let Some(hours) = working_hours.for_weekday(date.weekday()) else {
        return Vec::new();
    };

    let open = MinuteRange::starting_at(hours.start, 0).start;
    let close = MinuteRange::starting_at(hours.end, 0).start;
    let step = i64::from(slot_minutes);

    let mut slots = Vec::new();
    let mut start = open;
    while start + step <= close {
        let candidate = MinuteRange { start, end: start + step };
        if !booked.iter().any(|b| b.overlaps(&candidate)) {
            if let Some(time) = minutes_to_time(start) {
                slots.push(time);
            }
        }
        start += step;
    }
    slots
}

/// Drop slots that have already started when `date` is today.
pub fn future_slots(slots: Vec<NaiveTime>, date: NaiveDate, now: NaiveDateTime) -> Vec<NaiveTime> {
    if date != now.date() {
        return slots;
    }
    slots.into_iter().filter(|slot| *slot > now.time()).collect()
}

/// Whether `[time, time + duration)` lies inside the day's working hours.
pub fn within_working_hours(
    working_hours: &WorkingHours,
    date: NaiveDate,
    time: NaiveTime,
    duration_minutes: i32,
) -> bool {
    let Some(hours) = working_hours.for_weekday(date.weekday()) else {
        return false;
    };
    let requested = MinuteRange::starting_at(time, duration_minutes);
    let open = MinuteRange::starting_at(hours.start, 0).start;
    let close = MinuteRange::starting_at(hours.end, 0).start;
    requested.start >= open && requested.end <= close
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_cell::DayHours;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn hours(start: NaiveTime, end: NaiveTime) -> WorkingHours {
        WorkingHours {
            sunday: Some(DayHours::new(start, end)),
            ..Default::default()
        }
    }

    // 2026-03-01 is a Sunday.
    fn sunday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[test]
    fn fills_the_working_range() {
        let slots = available_slots(&hours(at(9, 0), at(11, 0)), 30, sunday(), &[]);
        assert_eq!(slots, [at(9, 0), at(9, 30), at(10, 0), at(10, 30)]);
    }

    #[test]
    fn last_slot_must_fit_entirely() {
        let slots = available_slots(&hours(at(9, 0), at(10, 40)), 30, sunday(), &[]);
        assert_eq!(slots, [at(9, 0), at(9, 30), at(10, 0)]);
    }

    #[test]
    fn booked_ranges_block_overlapping_slots() {
        let booked = [
            MinuteRange::starting_at(at(9, 30), 30),
            // Off-grid booking overlaps two slots.
            MinuteRange::starting_at(at(10, 45), 30),
        ];
        let slots = available_slots(&hours(at(9, 0), at(12, 0)), 30, sunday(), &booked);
        assert_eq!(slots, [at(9, 0), at(10, 0), at(11, 30)]);
    }

    #[test]
    fn closed_days_have_no_slots() {
        let monday = sunday().succ_opt().unwrap();
        assert!(available_slots(&hours(at(9, 0), at(17, 0)), 30, monday, &[]).is_empty());
        assert!(available_slots(&hours(at(9, 0), at(17, 0)), 0, sunday(), &[]).is_empty());
    }

    #[test]
    fn disabled_day_is_closed() {
        let mut working_hours = hours(at(9, 0), at(17, 0));
        if let Some(day) = working_hours.sunday.as_mut() {
            day.enabled = false;
        }
        assert!(available_slots(&working_hours, 30, sunday(), &[]).is_empty());
    }

    #[test]
    fn past_slots_are_dropped_only_today() {
        let slots = vec![at(9, 0), at(9, 30), at(10, 0)];
        let now = sunday().and_time(at(9, 30));
        assert_eq!(future_slots(slots.clone(), sunday(), now), [at(10, 0)]);

        let yesterday = sunday().pred_opt().unwrap().and_time(at(23, 0));
        assert_eq!(future_slots(slots.clone(), sunday(), yesterday), slots);
    }

    #[test]
    fn working_hours_bound_requests() {
        let working_hours = hours(at(9, 0), at(17, 0));
        assert!(within_working_hours(&working_hours, sunday(), at(16, 30), 30));
        assert!(!within_working_hours(&working_hours, sunday(), at(16, 45), 30));
        assert!(!within_working_hours(&working_hours, sunday(), at(8, 30), 30));
    }
}
