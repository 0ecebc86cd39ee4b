//! Calendar arithmetic for Saturday-to-Saturday billing weeks.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

pub const BILLING_WEEK_START: Weekday = Weekday::Sat;
pub const BILLING_WEEK_NIGHTS: u32 = 7;

/// The Saturday on or before `date`.
pub fn week_start_for(date: NaiveDate) -> NaiveDate {
    let days_since_saturday = (date.weekday().num_days_from_sunday() + 1) % 7;
    date - Duration::days(i64::from(days_since_saturday))
}

pub fn is_week_start(date: NaiveDate) -> bool {
    date.weekday() == BILLING_WEEK_START
}

/// Billing weeks charged for a stay of `nights` starting at `checkin`.
///
/// A stay is billed in whole units of seven nights; unit `i` begins on
/// `checkin + 7 * i` and is priced at the billing week containing that night.
pub fn billing_weeks(checkin: NaiveDate, nights: u32) -> Vec<NaiveDate> {
    let units = nights.div_ceil(BILLING_WEEK_NIGHTS);
    (0..units)
        .map(|unit| {
            let night = checkin + Duration::days(i64::from(unit * BILLING_WEEK_NIGHTS));
            week_start_for(night)
        })
        .collect()
}

pub fn first_week_start(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, 1, BILLING_WEEK_START, 1)
}

/// Every billing week whose Saturday falls inside `year`.
pub fn week_starts_in_year(year: i32) -> Vec<NaiveDate> {
    let Some(first) = first_week_start(year) else {
        return Vec::new();
    };

    std::iter::successors(Some(first), |current| {
        Some(*current + Duration::days(7)).filter(|next| next.year() == year)
    })
    .collect()
}

/// Maps the n-th billing week of `source_year` onto the n-th billing week of `target_year`.
pub fn shift_week_to_year(
    week_start: NaiveDate,
    source_year: i32,
    target_year: i32,
) -> Option<NaiveDate> {
    let source_first = first_week_start(source_year)?;
    let offset = (week_start - source_first).num_days();
    if offset < 0 || offset % 7 != 0 {
        return None;
    }

    let shifted = first_week_start(target_year)? + Duration::days(offset);
    (shifted.year() == target_year).then_some(shifted)
}
