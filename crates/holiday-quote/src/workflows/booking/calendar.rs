use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;
use tracing::warn;

use super::domain::{ApartmentId, DateBlock, SeasonConfig};
use super::stay::{validate_stay, StayValidationError};
use super::store::{guarded, CalendarRepository, LookupContext};

pub const OUTSIDE_SEASON_REASON: &str = "outside season";
pub const DEFAULT_BLOCK_REASON: &str = "unavailable period";

const DEFAULT_SEASON_START: (u32, u32) = (6, 1);
const DEFAULT_SEASON_END: (u32, u32) = (10, 31);

/// Check-in and check-out are only allowed on Saturday, Sunday or Monday.
pub fn is_valid_check_in_out_day(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun | Weekday::Mon)
}

/// Closed calendar range during which a year accepts bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeasonWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SeasonWindow {
    pub fn default_for(year: i32) -> Option<Self> {
        Self::from_parts(year, DEFAULT_SEASON_START, DEFAULT_SEASON_END)
    }

    pub fn from_config(config: &SeasonConfig) -> Option<Self> {
        Self::from_parts(
            config.year,
            (config.start_month, config.start_day),
            (config.end_month, config.end_day),
        )
        .filter(|window| window.start <= window.end)
    }

    /// An active config wins; anything else falls back to June 1 - October 31.
    pub fn resolve(year: i32, config: Option<&SeasonConfig>) -> Option<Self> {
        match config.filter(|config| config.is_active && config.year == year) {
            Some(config) => Self::from_config(config).or_else(|| {
                warn!(year, "season config has invalid dates, using default window");
                Self::default_for(year)
            }),
            None => Self::default_for(year),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    fn from_parts(year: i32, start: (u32, u32), end: (u32, u32)) -> Option<Self> {
        Some(Self {
            start: NaiveDate::from_ymd_opt(year, start.0, start.1)?,
            end: NaiveDate::from_ymd_opt(year, end.0, end.1)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateBlockInfo {
    pub is_blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DateBlockInfo {
    pub fn open() -> Self {
        Self {
            is_blocked: false,
            reason: None,
        }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            is_blocked: true,
            reason: Some(reason.into()),
        }
    }
}

/// Season check first, then the first active block covering the date.
pub fn evaluate_date(
    date: NaiveDate,
    season: Option<&SeasonWindow>,
    blocks: &[DateBlock],
    apartment: Option<&ApartmentId>,
) -> DateBlockInfo {
    if !season.map(|window| window.contains(date)).unwrap_or(false) {
        return DateBlockInfo::blocked(OUTSIDE_SEASON_REASON);
    }

    blocks
        .iter()
        .find(|block| block.covers(date) && block.applies_to(apartment))
        .map(|block| {
            let reason = block.reason.trim();
            if reason.is_empty() {
                DateBlockInfo::blocked(DEFAULT_BLOCK_REASON)
            } else {
                DateBlockInfo::blocked(reason)
            }
        })
        .unwrap_or_else(DateBlockInfo::open)
}

/// One day of the booking calendar as rendered on the date step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub is_blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub check_in_allowed: bool,
}

/// Season windows and date blocks backed by the calendar repository.
pub struct CalendarRules {
    repository: Arc<dyn CalendarRepository>,
}

impl CalendarRules {
    pub fn new(repository: Arc<dyn CalendarRepository>) -> Self {
        Self { repository }
    }

    pub async fn season_window(&self, ctx: &LookupContext, year: i32) -> Option<SeasonWindow> {
        let config = match guarded(ctx, "season config", self.repository.season_config(year)).await
        {
            Ok(config) => config,
            Err(err) => {
                warn!(year, error = %err, "season config unavailable, using default window");
                None
            }
        };
        SeasonWindow::resolve(year, config.as_ref())
    }

    /// Calendar display passes `apartment = None`, which only honors global blocks.
    pub async fn date_block_info(
        &self,
        ctx: &LookupContext,
        date: NaiveDate,
        apartment: Option<&ApartmentId>,
    ) -> DateBlockInfo {
        let season = self.season_window(ctx, date.year()).await;
        let blocks = self.active_blocks(ctx).await;
        evaluate_date(date, season.as_ref(), &blocks, apartment)
    }

    /// Stay rules plus the season window and global blocks on both ends of the stay.
    pub async fn check_stay_dates(
        &self,
        ctx: &LookupContext,
        checkin: NaiveDate,
        checkout: NaiveDate,
    ) -> Result<u32, StayValidationError> {
        let nights = validate_stay(checkin, checkout)?;
        for date in [checkin, checkout] {
            let info = self.date_block_info(ctx, date, None).await;
            if info.is_blocked {
                return Err(StayValidationError::DateUnavailable {
                    date,
                    reason: info
                        .reason
                        .unwrap_or_else(|| DEFAULT_BLOCK_REASON.to_string()),
                });
            }
        }
        Ok(nights)
    }

    /// Per-day view for `[from, to]`, loading each year's season once.
    pub async fn calendar_range(
        &self,
        ctx: &LookupContext,
        from: NaiveDate,
        to: NaiveDate,
        apartment: Option<&ApartmentId>,
    ) -> Vec<CalendarDay> {
        if to < from {
            return Vec::new();
        }

        let blocks = self.active_blocks(ctx).await;
        let mut seasons = Vec::new();
        for year in from.year()..=to.year() {
            seasons.push((year, self.season_window(ctx, year).await));
        }

        let days = (to - from).num_days();
        (0..=days)
            .map(|offset| from + Duration::days(offset))
            .map(|date| {
                let season = seasons
                    .iter()
                    .find(|(year, _)| *year == date.year())
                    .and_then(|(_, window)| window.as_ref());
                let info = evaluate_date(date, season, &blocks, apartment);
                CalendarDay {
                    date,
                    check_in_allowed: !info.is_blocked && is_valid_check_in_out_day(date),
                    is_blocked: info.is_blocked,
                    reason: info.reason,
                }
            })
            .collect()
    }

    async fn active_blocks(&self, ctx: &LookupContext) -> Vec<DateBlock> {
        match guarded(ctx, "date blocks", self.repository.active_blocks()).await {
            Ok(blocks) => blocks.into_iter().filter(|block| block.is_active).collect(),
            Err(err) => {
                warn!(error = %err, "date blocks unavailable, treating calendar as unblocked");
                Vec::new()
            }
        }
    }
}
