// libs/scheduling-cell/src/services/validator.rs
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use tracing::debug;

use crate::models::{Room, SchedulingError, Slot, TherapySession};

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Parses an "HH:MM" wall-clock time into minutes after midnight.
pub fn parse_hhmm(value: &str) -> Result<u32, SchedulingError> {
    let invalid = || SchedulingError::InvalidSlot(format!("'{}' is not a valid HH:MM time", value));

    let (hours, minutes) = value.trim().split_once(':').ok_or_else(invalid)?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return Err(invalid());
    }
    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;

    // "24:00" closes a slot at midnight
    if minutes >= 60 || hours > 24 || (hours == 24 && minutes != 0) {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

impl Slot {
    pub fn minute_range(&self) -> Result<(u32, u32), SchedulingError> {
        Ok((parse_hhmm(&self.start_time)?, parse_hhmm(&self.end_time)?))
    }

    /// Whether this slot's window fully contains the requested window.
    pub fn contains(&self, window: &BookingWindow) -> bool {
        match self.minute_range() {
            Ok((start, end)) => {
                self.day_of_week == window.day_of_week
                    && start <= window.start_minute
                    && window.end_minute <= end
            }
            Err(_) => false,
        }
    }
}

/// Checks a room's slot list: valid fields, and no two slots on the same
/// weekday overlapping.
pub fn validate_slots(slots: &[Slot]) -> Result<(), SchedulingError> {
    let mut ranges: Vec<(u8, u32, u32)> = Vec::with_capacity(slots.len());

    for slot in slots {
        if slot.day_of_week > 6 {
            return Err(SchedulingError::InvalidSlot(
                "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
            ));
        }
        if slot.max_concurrent < 1 {
            return Err(SchedulingError::InvalidSlot("max_concurrent must be at least 1".to_string()));
        }

        let (start, end) = slot.minute_range()?;
        if start >= end {
            return Err(SchedulingError::InvalidSlot(format!(
                "Slot start {} must be before end {}",
                slot.start_time, slot.end_time
            )));
        }

        if let Some(clash) = ranges
            .iter()
            .find(|(day, s, e)| *day == slot.day_of_week && start < *e && end > *s)
        {
            return Err(SchedulingError::InvalidSlot(format!(
                "Slot {}-{} overlaps another slot on day {} ({:02}:{:02}-{:02}:{:02})",
                slot.start_time,
                slot.end_time,
                clash.0,
                clash.1 / 60,
                clash.1 % 60,
                clash.2 / 60,
                clash.2 % 60
            )));
        }
        ranges.push((slot.day_of_week, start, end));
    }

    Ok(())
}

/// Half-open interval overlap: touching endpoints do not overlap.
pub fn intervals_overlap<T: PartialOrd>(a_start: T, a_end: T, b_start: T, b_end: T) -> bool {
    a_start < b_end && a_end > b_start
}

/// A requested booking expressed in the clinic's local week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingWindow {
    pub day_of_week: u8,
    pub start_minute: u32,
    pub end_minute: u32,
}

/// Projects a UTC range onto the clinic's local calendar. Returns `None` when
/// the range crosses local midnight, which no single slot can contain.
pub fn booking_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<Option<BookingWindow>, SchedulingError> {
    if end <= start {
        return Err(SchedulingError::InvalidTimeRange(
            "End time must be after start time".to_string(),
        ));
    }

    let local_start = start.with_timezone(&offset);
    let local_end = end.with_timezone(&offset);

    // start rounds down, end rounds up to whole minutes
    let start_minute = local_start.hour() * 60 + local_start.minute();
    let end_minute = if local_end.date_naive() == local_start.date_naive() {
        ceil_minute_of_day(&local_end)
    } else if local_end.date_naive() == local_start.date_naive().succ_opt().unwrap_or(local_start.date_naive())
        && ceil_minute_of_day(&local_end) == 0
    {
        // ending exactly at midnight still belongs to the start day
        MINUTES_PER_DAY
    } else {
        return Ok(None);
    };

    Ok(Some(BookingWindow {
        day_of_week: local_start.weekday().num_days_from_sunday() as u8,
        start_minute,
        end_minute,
    }))
}

/// Minute of the day, counting any seconds past the minute as a full minute.
fn ceil_minute_of_day(at: &DateTime<FixedOffset>) -> u32 {
    let minute = at.hour() * 60 + at.minute();
    if at.second() > 0 || at.nanosecond() > 0 {
        minute + 1
    } else {
        minute
    }
}

/// First slot of the room (in list order) containing the window.
pub fn find_slot<'a>(room: &'a Room, window: &BookingWindow) -> Option<&'a Slot> {
    room.slots.iter().find(|slot| slot.contains(window))
}

/// Number of capacity-holding sessions on `room_id` overlapping `[start, end)`.
pub fn count_overlapping(
    sessions: &[TherapySession],
    room_id: uuid::Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> usize {
    sessions
        .iter()
        .filter(|s| s.room_id == room_id && s.status.occupies_room())
        .filter(|s| intervals_overlap(s.start_time, s.end_time, start, end))
        .count()
}

/// Decides whether `[start, end)` can be booked in `room` given the existing
/// sessions. Pure: callers persist the session themselves.
pub fn can_book_room(
    room: &Room,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    existing: &[TherapySession],
    offset: FixedOffset,
) -> Result<Slot, SchedulingError> {
    let window = booking_window(start, end, offset)?;

    if !room.is_available {
        return Err(SchedulingError::RoomUnavailable);
    }

    let slot = window
        .as_ref()
        .and_then(|w| find_slot(room, w))
        .ok_or(SchedulingError::NoSlot)?;

    let overlapping = count_overlapping(existing, room.id, start, end);
    debug!(
        "Room {} slot {}-{}: {} overlapping of {} allowed",
        room.id, slot.start_time, slot.end_time, overlapping, slot.max_concurrent
    );

    if overlapping >= slot.max_concurrent as usize {
        return Err(SchedulingError::CapacityFull);
    }

    Ok(slot.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn slot(day: u8, start: &str, end: &str) -> Slot {
        Slot { day_of_week: day, start_time: start.into(), end_time: end.into(), max_concurrent: 1 }
    }

    #[test]
    fn parses_wall_clock_times() {
        assert_eq!(parse_hhmm("09:30").unwrap(), 570);
        assert_eq!(parse_hhmm("9:05").unwrap(), 545);
        assert_eq!(parse_hhmm("24:00").unwrap(), 1440);
        assert!(parse_hhmm("24:30").is_err());
        assert!(parse_hhmm("12:60").is_err());
        assert!(parse_hhmm("noon").is_err());
        assert!(parse_hhmm("12:5").is_err());
    }

    #[test]
    fn overlapping_slots_on_same_day_are_rejected() {
        assert!(validate_slots(&[slot(1, "09:00", "13:00"), slot(1, "13:00", "17:00")]).is_ok());
        assert!(validate_slots(&[slot(1, "09:00", "13:00"), slot(2, "10:00", "11:00")]).is_ok());
        assert!(validate_slots(&[slot(1, "09:00", "13:00"), slot(1, "12:00", "14:00")]).is_err());
        assert!(validate_slots(&[slot(7, "09:00", "13:00")]).is_err());
        assert!(validate_slots(&[slot(1, "13:00", "09:00")]).is_err());
        assert!(validate_slots(&[Slot { max_concurrent: 0, ..slot(1, "09:00", "10:00") }]).is_err());
    }

    #[test]
    fn overlap_is_half_open_and_symmetric() {
        assert!(!intervals_overlap(9, 10, 10, 11));
        assert!(!intervals_overlap(10, 11, 9, 10));
        assert!(intervals_overlap(9, 11, 10, 12));
        assert!(intervals_overlap(10, 12, 9, 11));
        assert!(intervals_overlap(9, 12, 10, 11));
    }

    #[test]
    fn windows_use_the_clinic_offset() {
        // 2024-01-01 is a Monday
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 3, 30, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 4, 30, 0).unwrap();

        let utc = booking_window(start, end, FixedOffset::east_opt(0).unwrap()).unwrap().unwrap();
        assert_eq!(utc, BookingWindow { day_of_week: 1, start_minute: 210, end_minute: 270 });

        // India Standard Time, +05:30
        let ist = FixedOffset::east_opt(330 * 60).unwrap();
        let local = booking_window(start, end, ist).unwrap().unwrap();
        assert_eq!(local, BookingWindow { day_of_week: 1, start_minute: 540, end_minute: 600 });
    }

    #[test]
    fn cross_midnight_ranges_have_no_window() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap();

        let to_midnight = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let window = booking_window(start, to_midnight, utc).unwrap().unwrap();
        assert_eq!(window.end_minute, 1440);

        let past_midnight = Utc.with_ymd_and_hms(2024, 1, 2, 0, 30, 0).unwrap();
        assert_eq!(booking_window(start, past_midnight, utc).unwrap(), None);
    }

    #[test]
    fn partial_minutes_extend_the_window() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 13, 0, 59).unwrap();
        let window = booking_window(start, end, utc).unwrap().unwrap();
        assert_eq!(window.start_minute, 720);
        assert_eq!(window.end_minute, 781);

        let room = Room {
            id: uuid::Uuid::new_v4(),
            name: "Basti-1".into(),
            room_type: "basti".into(),
            capacity: 1,
            is_available: true,
            slots: vec![slot(1, "09:00", "13:00")],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(find_slot(&room, &window).is_none());

        let late_evening = Utc.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + chrono::Duration::milliseconds(1);
        assert_eq!(booking_window(late_evening, end, utc).unwrap(), None);
    }

    #[test]
    fn empty_or_inverted_ranges_are_invalid() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        assert!(matches!(
            booking_window(at, at, utc),
            Err(SchedulingError::InvalidTimeRange(_))
        ));
    }
}
