use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Average school days per calendar month (January..December), public
/// holidays and vacations removed. August sits inside the summer break.
pub const SCHOOL_DAYS_PER_MONTH: [f64; 12] = [
    19.0, 15.0, 21.0, 15.0, 19.0, 20.0, 9.0, 0.0, 21.0, 17.0, 21.0, 13.0,
];

const WEEKS_PER_MONTH: f64 = 4.345;

pub const MONTH_ABBREV: [&str; 12] = [
    "Jan", "Feb", "Mär", "Apr", "Mai", "Jun", "Jul", "Aug", "Sep", "Okt", "Nov", "Dez",
];

/// The academic year: second Monday of September through the first Friday on
/// or after July 31 of the following calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchoolYear {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SchoolYear {
    pub fn starting_in(year: i32) -> Self {
        let start = second_monday_of_september(year);
        let end = first_friday_on_or_after(ymd(year + 1, 7, 31));
        Self { start, end }
    }

    /// The school year a given day falls into. Days during the summer break
    /// before the September start still belong to the year that just ended.
    pub fn containing(today: NaiveDate) -> Self {
        let candidate = Self::starting_in(today.year());
        if today < candidate.start {
            Self::starting_in(today.year() - 1)
        } else {
            candidate
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid calendar date")
}

fn second_monday_of_september(year: i32) -> NaiveDate {
    let sept_first = ymd(year, 9, 1);
    let until_monday = (7 - sept_first.weekday().num_days_from_monday()) % 7;
    sept_first + Duration::days(i64::from(until_monday) + 7)
}

fn first_friday_on_or_after(date: NaiveDate) -> NaiveDate {
    let mut day = date;
    while day.weekday() != Weekday::Fri {
        day += Duration::days(1);
    }
    day
}

/// School-year ordering for ISO week numbers. Weeks 35 and 36 may precede the
/// actual year start, weeks 37..53 run to December, weeks 1..34 cover the
/// January-July stretch of the following calendar year.
pub fn week_sort_key(week: u32) -> i32 {
    match week {
        35 | 36 => week as i32,
        w if w >= 37 => w as i32 + 100,
        w => w as i32 + 200,
    }
}

/// School-year ordering for calendar months: September=1 .. August=12.
pub fn month_sort_key(month: u32) -> i32 {
    match month {
        9 => 1,
        10 => 2,
        11 => 3,
        12 => 4,
        1 => 5,
        2 => 6,
        3 => 7,
        4 => 8,
        5 => 9,
        6 => 10,
        7 => 11,
        _ => 12,
    }
}

/// Successor in school-year week order. Week 53 only exists in some ISO
/// years, so the caller states whether it participates.
pub fn next_week(week: u32, include_53: bool) -> u32 {
    match week {
        52 if include_53 => 53,
        52 | 53 => 1,
        w => w + 1,
    }
}

/// Inverse of [`week_sort_key`].
pub fn week_from_sort_key(key: i32) -> Option<u32> {
    let week = match key {
        35 | 36 => key,
        137..=153 => key - 100,
        201..=234 => key - 200,
        _ => return None,
    };
    Some(week as u32)
}

/// Inverse of [`month_sort_key`].
pub fn month_from_sort_key(key: i32) -> Option<u32> {
    if !(1..=12).contains(&key) {
        return None;
    }
    let month = if key <= 4 { key + 8 } else { key - 4 };
    Some(month as u32)
}

pub fn next_calendar_month(month: u32) -> u32 {
    if month == 12 {
        1
    } else {
        month + 1
    }
}

pub fn month_label(month: u32, year: i32) -> String {
    let idx = month.clamp(1, 12) as usize - 1;
    format!("{} {}", MONTH_ABBREV[idx], year)
}

/// Approximate calendar month an ISO week falls into, via the week's
/// Thursday in a reference non-leap year.
pub fn month_for_week(week: u32) -> u32 {
    let day_of_year = (week * 7).saturating_sub(3).clamp(1, 365);
    NaiveDate::from_yo_opt(2023, day_of_year)
        .map(|d| d.month())
        .unwrap_or(1)
}

pub fn school_days_in_month(month: u32) -> f64 {
    let idx = month.clamp(1, 12) as usize - 1;
    SCHOOL_DAYS_PER_MONTH[idx]
}

/// Average school days in one week of the given month, capped at a full
/// Monday-Friday week.
pub fn school_days_in_week_of_month(month: u32) -> f64 {
    (school_days_in_month(month) / WEEKS_PER_MONTH).min(5.0)
}

/// Monday-Friday window covering the `weeks` most recently completed school
/// weeks. A week counts as completed once its Friday is reached, so a
/// mid-week call excludes the current partial week.
pub fn trailing_completed_weeks(today: NaiveDate, weeks: u32) -> (NaiveDate, NaiveDate) {
    let weeks = i64::from(weeks.max(1));
    let since_friday = (i64::from(today.weekday().num_days_from_monday()) + 7
        - i64::from(Weekday::Fri.num_days_from_monday()))
        % 7;
    let anchor_friday = today - Duration::days(since_friday);
    let start_monday = anchor_friday - Duration::days(4) - Duration::weeks(weeks - 1);
    (start_monday, anchor_friday)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn school_year_2024_starts_on_second_monday() {
        let year = SchoolYear::starting_in(2024);
        assert_eq!(year.start, ymd(2024, 9, 9));
        // July 31st 2025 is a Thursday, so the year runs into August 1st.
        assert_eq!(year.end, ymd(2025, 8, 1));
    }

    #[test]
    fn days_before_september_start_belong_to_previous_year() {
        let year = SchoolYear::containing(ymd(2024, 9, 1));
        assert_eq!(year.start, ymd(2023, 9, 11));
        assert_eq!(year.end, ymd(2024, 8, 2));

        let year = SchoolYear::containing(ymd(2024, 10, 1));
        assert_eq!(year.start, ymd(2024, 9, 9));
    }

    #[test]
    fn week_keys_order_across_the_year_boundary() {
        let keys: Vec<i32> = [38, 50, 3, 20].iter().map(|&w| week_sort_key(w)).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
        assert!(week_sort_key(35) < week_sort_key(37));
        assert!(week_sort_key(53) < week_sort_key(1));
    }

    #[test]
    fn month_keys_start_in_september() {
        assert_eq!(month_sort_key(9), 1);
        assert_eq!(month_sort_key(12), 4);
        assert_eq!(month_sort_key(1), 5);
        assert_eq!(month_sort_key(7), 11);
        assert_eq!(month_sort_key(8), 12);
    }

    #[test]
    fn week_succession_wraps_after_december() {
        assert_eq!(next_week(37, false), 38);
        assert_eq!(next_week(52, false), 1);
        assert_eq!(next_week(52, true), 53);
        assert_eq!(next_week(53, true), 1);
    }

    #[test]
    fn trailing_window_excludes_partial_week() {
        // Wednesday 2024-10-16: the current week has not reached Friday yet.
        let (start, end) = trailing_completed_weeks(ymd(2024, 10, 16), 3);
        assert_eq!(end, ymd(2024, 10, 11));
        assert_eq!(start, ymd(2024, 9, 23));
        assert_eq!(end.weekday(), Weekday::Fri);
        assert_eq!(start.weekday(), Weekday::Mon);
    }

    #[test]
    fn trailing_window_counts_a_week_finished_today() {
        // A Friday closes its own week.
        let (start, end) = trailing_completed_weeks(ymd(2024, 10, 18), 1);
        assert_eq!(end, ymd(2024, 10, 18));
        assert_eq!(start, ymd(2024, 10, 14));
    }

    #[test]
    fn week_to_month_mapping_is_plausible() {
        assert_eq!(month_for_week(1), 1);
        assert_eq!(month_for_week(36), 9);
        assert_eq!(month_for_week(52), 12);
    }

    #[test]
    fn weekly_school_day_rate_never_exceeds_a_full_week() {
        for month in 1..=12 {
            let rate = school_days_in_week_of_month(month);
            assert!((0.0..=5.0).contains(&rate));
        }
        assert_eq!(school_days_in_week_of_month(8), 0.0);
    }
}
