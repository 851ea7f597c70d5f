//! Calendar arithmetic tests, including the worked business-hours example
//! and DST behavior around spring-forward and fall-back transitions.

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use proptest::prelude::*;

use super::*;

fn nine_to_five(tz: Tz) -> OperationalHoursProfile {
    let schedule = WeekSchedule::weekdays(
        NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
    )
    .unwrap();
    OperationalHoursProfile::business(tz, schedule)
}

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

// 2025-06-02 is a Monday; 2025-06-04 (Wednesday) is the holiday used below.
fn wednesday_holiday() -> HolidaySet {
    HolidaySet::new([NaiveDate::from_ymd_opt(2025, 6, 4).unwrap()]).unwrap()
}

#[test]
fn eight_hour_budget_lands_tuesday_afternoon() {
    let profile = nine_to_five(chrono_tz::UTC);
    let holidays = wednesday_holiday();
    let anchor = utc(2025, 6, 2, 16, 0);

    // Monday 16:00-17:00 contributes 1h, Tuesday 09:00 onward the rest.
    let deadline =
        add_counted_duration(anchor, Duration::hours(8), &profile, &holidays).unwrap();
    assert_eq!(deadline, utc(2025, 6, 3, 16, 0));
}

#[test]
fn sixteen_hour_budget_skips_holiday_and_lands_thursday() {
    let profile = nine_to_five(chrono_tz::UTC);
    let holidays = wednesday_holiday();
    let anchor = utc(2025, 6, 2, 16, 0);

    // Monday 1h + Tuesday 8h + Wednesday (holiday) 0h + Thursday 7h.
    let deadline =
        add_counted_duration(anchor, Duration::hours(16), &profile, &holidays).unwrap();
    assert_eq!(deadline, utc(2025, 6, 5, 16, 0));
}

#[test]
fn budget_exhausted_at_window_close_lands_on_the_close_instant() {
    let profile = nine_to_five(chrono_tz::UTC);
    let holidays = HolidaySet::empty();
    let anchor = utc(2025, 6, 2, 16, 0);

    // Monday 1h + Tuesday's full 8h window.
    let deadline =
        add_counted_duration(anchor, Duration::hours(9), &profile, &holidays).unwrap();
    assert_eq!(deadline, utc(2025, 6, 3, 17, 0));
}

#[test]
fn weekend_contributes_nothing() {
    let profile = nine_to_five(chrono_tz::UTC);
    let holidays = HolidaySet::empty();
    // Friday 2025-06-06 16:30 + 1h counted crosses the weekend.
    let anchor = utc(2025, 6, 6, 16, 30);

    let deadline =
        add_counted_duration(anchor, Duration::hours(1), &profile, &holidays).unwrap();
    assert_eq!(deadline, utc(2025, 6, 9, 9, 30));
}

#[test]
fn anchor_before_window_open_starts_counting_at_open() {
    let profile = nine_to_five(chrono_tz::UTC);
    let holidays = HolidaySet::empty();
    let anchor = utc(2025, 6, 2, 6, 0);

    let deadline =
        add_counted_duration(anchor, Duration::hours(2), &profile, &holidays).unwrap();
    assert_eq!(deadline, utc(2025, 6, 2, 11, 0));
}

#[test]
fn counted_duration_matches_the_worked_example() {
    let profile = nine_to_five(chrono_tz::UTC);
    let holidays = wednesday_holiday();

    let monday = utc(2025, 6, 2, 16, 0);
    assert_eq!(
        counted_duration(monday, utc(2025, 6, 3, 16, 0), &profile, &holidays),
        Duration::hours(8)
    );
    assert_eq!(
        counted_duration(monday, utc(2025, 6, 5, 16, 0), &profile, &holidays),
        Duration::hours(16)
    );
}

#[test]
fn counted_duration_is_zero_for_reversed_or_equal_bounds() {
    let profile = nine_to_five(chrono_tz::UTC);
    let holidays = HolidaySet::empty();
    let instant = utc(2025, 6, 2, 12, 0);

    assert_eq!(
        counted_duration(instant, instant, &profile, &holidays),
        Duration::zero()
    );
    assert_eq!(
        counted_duration(instant, instant - Duration::hours(4), &profile, &holidays),
        Duration::zero()
    );
}

#[test]
fn calendar_mode_counts_wall_clock_minus_holidays() {
    let profile = OperationalHoursProfile::calendar(chrono_tz::UTC);
    let holidays = HolidaySet::new([NaiveDate::from_ymd_opt(2025, 6, 3).unwrap()]).unwrap();
    let anchor = utc(2025, 6, 2, 12, 0);

    // Monday 12h + Tuesday (holiday) 0h + Wednesday 12h.
    let deadline =
        add_counted_duration(anchor, Duration::hours(24), &profile, &holidays).unwrap();
    assert_eq!(deadline, utc(2025, 6, 4, 12, 0));

    assert_eq!(
        counted_duration(anchor, deadline, &profile, &holidays),
        Duration::hours(24)
    );
}

#[test]
fn recurring_holiday_matches_every_year() {
    let mut holidays = HolidaySet::empty();
    holidays.add_recurring(1, 1).unwrap();

    assert!(holidays.contains(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
    assert!(holidays.contains(NaiveDate::from_ymd_opt(2031, 1, 1).unwrap()));
    assert!(!holidays.contains(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()));
}

#[test]
fn duplicate_holiday_dates_are_rejected() {
    let date = NaiveDate::from_ymd_opt(2025, 12, 25).unwrap();
    let result = HolidaySet::new([date, date]);
    assert!(matches!(
        result,
        Err(CalendarError::DuplicateHoliday { .. })
    ));
}

#[test]
fn calendar_mode_spring_forward_counts_every_wall_instant_once() {
    // America/New_York jumps 02:00 -> 03:00 on 2025-03-09. In calendar
    // mode every wall-clock instant counts, so adding 24h of budget is
    // exactly 24h of UTC time regardless of the local-day length.
    let profile = OperationalHoursProfile::calendar(chrono_tz::America::New_York);
    let holidays = HolidaySet::empty();
    let anchor = utc(2025, 3, 8, 17, 0);

    let deadline =
        add_counted_duration(anchor, Duration::hours(24), &profile, &holidays).unwrap();
    assert_eq!(deadline, anchor + Duration::hours(24));
}

#[test]
fn window_straddling_spring_forward_gap_is_shortened() {
    // A 01:00-04:00 local window on the spring-forward day spans only two
    // wall hours because 02:00-03:00 does not exist.
    let schedule = WeekSchedule::new([
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        vec![TimeWindow::new(
            NaiveTime::from_hms_opt(1, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(4, 0, 0).unwrap(),
        )
        .unwrap()],
    ])
    .unwrap();
    let profile = OperationalHoursProfile::custom(chrono_tz::America::New_York, schedule);
    let holidays = HolidaySet::empty();

    // Sunday 2025-03-09 local, bounded well around the window in UTC.
    let counted = counted_duration(
        utc(2025, 3, 9, 0, 0),
        utc(2025, 3, 10, 0, 0),
        &profile,
        &holidays,
    );
    assert_eq!(counted, Duration::hours(2));
}

#[test]
fn window_straddling_fall_back_includes_the_repeated_hour_once() {
    // On 2025-11-02 the 01:00-04:00 local window spans four wall hours:
    // the repeated 01:00 hour lies inside the window interval exactly once
    // because the start resolves to the earlier occurrence.
    let schedule = WeekSchedule::new([
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        vec![TimeWindow::new(
            NaiveTime::from_hms_opt(1, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(4, 0, 0).unwrap(),
        )
        .unwrap()],
    ])
    .unwrap();
    let profile = OperationalHoursProfile::custom(chrono_tz::America::New_York, schedule);
    let holidays = HolidaySet::empty();

    let counted = counted_duration(
        utc(2025, 11, 2, 0, 0),
        utc(2025, 11, 3, 0, 0),
        &profile,
        &holidays,
    );
    assert_eq!(counted, Duration::hours(4));
}

#[test]
fn empty_schedule_is_rejected_at_construction() {
    let result = WeekSchedule::new(Default::default());
    assert!(matches!(result, Err(CalendarError::EmptySchedule)));
}

#[test]
fn unordered_windows_are_rejected_at_construction() {
    let morning = TimeWindow::new(
        NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
    )
    .unwrap();
    let overlapping = TimeWindow::new(
        NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
    )
    .unwrap();

    let result = WeekSchedule::new([
        vec![morning, overlapping],
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
    ]);
    assert!(matches!(
        result,
        Err(CalendarError::UnorderedWindows {
            weekday: Weekday::Mon
        })
    ));
}

#[test]
fn inverted_window_is_rejected() {
    let result = TimeWindow::new(
        NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
    );
    assert!(matches!(result, Err(CalendarError::InvalidWindow { .. })));
}

#[test]
fn oversized_budget_exhausts_the_lookahead_instead_of_hanging() {
    let profile = nine_to_five(chrono_tz::UTC);
    let holidays = HolidaySet::empty();
    let anchor = utc(2025, 6, 2, 9, 0);

    // More counted hours than two years of 8h weekdays can supply.
    let result = add_counted_duration(anchor, Duration::hours(6000), &profile, &holidays);
    assert!(matches!(
        result,
        Err(CalendarError::LookaheadExhausted { .. })
    ));
}

#[test]
fn zero_budget_returns_the_anchor_unchanged() {
    let profile = nine_to_five(chrono_tz::UTC);
    let holidays = HolidaySet::empty();
    let anchor = utc(2025, 6, 7, 3, 0);

    let deadline =
        add_counted_duration(anchor, Duration::zero(), &profile, &holidays).unwrap();
    assert_eq!(deadline, anchor);
}

#[test]
fn profile_survives_a_serde_round_trip() {
    let profile = nine_to_five(chrono_tz::Europe::Berlin);
    let json = serde_json::to_string(&profile).unwrap();
    let restored: OperationalHoursProfile = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, profile);
}

#[test]
fn invalid_window_is_rejected_during_deserialization() {
    let json = r#"{"start":"17:00:00","end":"09:00:00"}"#;
    let result: Result<TimeWindow, _> = serde_json::from_str(json);
    assert!(result.is_err());
}

proptest! {
    #[test]
    fn counted_duration_is_monotone_in_the_end_bound(
        start_hour in 0u32..24,
        first_offset in 0i64..(14 * 24 * 60),
        second_offset in 0i64..(14 * 24 * 60),
    ) {
        let profile = nine_to_five(chrono_tz::UTC);
        let holidays = wednesday_holiday();
        let start = utc(2025, 6, 2, start_hour, 0);
        let (near, far) = if first_offset <= second_offset {
            (first_offset, second_offset)
        } else {
            (second_offset, first_offset)
        };

        let shorter = counted_duration(
            start,
            start + Duration::minutes(near),
            &profile,
            &holidays,
        );
        let longer = counted_duration(
            start,
            start + Duration::minutes(far),
            &profile,
            &holidays,
        );
        prop_assert!(shorter >= Duration::zero());
        prop_assert!(shorter <= longer);
    }

    #[test]
    fn add_then_count_round_trips_the_budget(
        start_hour in 0u32..24,
        start_minute in 0u32..60,
        budget_minutes in 1i64..(10 * 8 * 60),
    ) {
        let profile = nine_to_five(chrono_tz::UTC);
        let holidays = wednesday_holiday();
        let start = Utc
            .with_ymd_and_hms(2025, 6, 2, start_hour, start_minute, 0)
            .unwrap();
        let budget = Duration::minutes(budget_minutes);

        let deadline = add_counted_duration(start, budget, &profile, &holidays).unwrap();
        prop_assert_eq!(
            counted_duration(start, deadline, &profile, &holidays),
            budget
        );
    }
}
