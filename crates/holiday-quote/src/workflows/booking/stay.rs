use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

use super::calendar::is_valid_check_in_out_day;

pub const MIN_NIGHTS: u32 = 5;
pub const MAX_NIGHTS: u32 = 28;
pub const FERRAGOSTO_MIN_NIGHTS: u32 = 14;

/// Whole nights between two calendar dates; zero when `checkout <= checkin`.
pub fn nights_between(checkin: NaiveDate, checkout: NaiveDate) -> u32 {
    u32::try_from((checkout - checkin).num_days()).unwrap_or(0)
}

pub fn is_stay_length_valid(nights: u32) -> bool {
    (MIN_NIGHTS..=MAX_NIGHTS).contains(&nights)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TwoWeeksRequirement {
    /// True when the stay covers a Saturday Ferragosto and is shorter than 14 nights.
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TwoWeeksRequirement {
    fn satisfied() -> Self {
        Self {
            required: false,
            message: None,
        }
    }
}

/// August 15 of `year` when it falls on a Saturday.
fn saturday_ferragosto(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 8, 15).filter(|date| date.weekday() == Weekday::Sat)
}

/// Applies the 14-night minimum to stays covering a Saturday August 15.
/// Every year the stay touches is checked.
pub fn requires_two_weeks_minimum(checkin: NaiveDate, checkout: NaiveDate) -> TwoWeeksRequirement {
    let nights = nights_between(checkin, checkout);
    if nights == 0 {
        return TwoWeeksRequirement::satisfied();
    }

    (checkin.year()..=checkout.year())
        .filter_map(saturday_ferragosto)
        .find(|ferragosto| checkin <= *ferragosto && checkout > *ferragosto)
        .filter(|_| nights < FERRAGOSTO_MIN_NIGHTS)
        .map(|ferragosto| TwoWeeksRequirement {
            required: true,
            message: Some(format!(
                "stays including Saturday 15 August {} require at least {} nights",
                ferragosto.year(),
                FERRAGOSTO_MIN_NIGHTS
            )),
        })
        .unwrap_or_else(TwoWeeksRequirement::satisfied)
}

/// Validation errors raised on the date step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StayValidationError {
    #[error("check-in on {0} is not allowed (Saturday, Sunday or Monday only)")]
    InvalidCheckInDay(NaiveDate),
    #[error("check-out on {0} is not allowed (Saturday, Sunday or Monday only)")]
    InvalidCheckOutDay(NaiveDate),
    #[error("check-out must be after check-in")]
    CheckOutBeforeCheckIn,
    #[error("stay of {nights} nights is shorter than the 5-night minimum")]
    StayTooShort { nights: u32 },
    #[error("stay of {nights} nights exceeds the 28-night maximum")]
    StayTooLong { nights: u32 },
    #[error("{0}")]
    FerragostoMinimum(String),
    #[error("{date} cannot be booked: {reason}")]
    DateUnavailable { date: NaiveDate, reason: String },
}

/// Runs every date-step rule, returning the night count on success.
pub fn validate_stay(checkin: NaiveDate, checkout: NaiveDate) -> Result<u32, StayValidationError> {
    let nights = nights_between(checkin, checkout);
    if nights == 0 {
        return Err(StayValidationError::CheckOutBeforeCheckIn);
    }
    if !is_valid_check_in_out_day(checkin) {
        return Err(StayValidationError::InvalidCheckInDay(checkin));
    }
    if !is_valid_check_in_out_day(checkout) {
        return Err(StayValidationError::InvalidCheckOutDay(checkout));
    }
    if nights < MIN_NIGHTS {
        return Err(StayValidationError::StayTooShort { nights });
    }
    if nights > MAX_NIGHTS {
        return Err(StayValidationError::StayTooLong { nights });
    }

    let ferragosto = requires_two_weeks_minimum(checkin, checkout);
    if ferragosto.required {
        return Err(StayValidationError::FerragostoMinimum(
            ferragosto.message.unwrap_or_default(),
        ));
    }

    Ok(nights)
}
