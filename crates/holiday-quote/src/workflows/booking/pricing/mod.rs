//! Weekly price lookup and administration over the price repository and its cache.
//!
//! Reads are cache-aside: the cache is consulted first, misses go to the durable
//! store and populate the cache. Every write goes to the store and then clears
//! the cache so the quote calculator never prices against a stale week.

pub mod seed;
pub mod weeks;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::calendar::SeasonWindow;
use super::domain::{Apartment, ApartmentId, PricePeriod};
use super::store::{guarded, LookupContext, PriceCache, PriceKey, PriceRepository, RepositoryError};

pub use seed::{PriceTableSeed, RoundingMode, SeasonBand};
pub use weeks::{billing_weeks, week_start_for};

/// Where a weekly price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Cache,
    Store,
    /// No price period exists for the week.
    Missing,
    /// The store failed or timed out.
    Degraded,
}

impl PriceSource {
    pub const fn is_fallback(self) -> bool {
        matches!(self, Self::Missing | Self::Degraded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeeklyPrice {
    pub week_start: NaiveDate,
    /// Zero when `source` is a fallback.
    pub amount: Decimal,
    pub source: PriceSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyYearRequest {
    pub source_year: i32,
    pub target_year: i32,
    /// Signed percentage, e.g. `5` raises prices by 5%.
    #[serde(default)]
    pub percent_adjust: Decimal,
    #[serde(default)]
    pub rounding: RoundingMode,
    #[serde(default = "default_round_to_nearest")]
    pub round_to_nearest: Decimal,
    #[serde(default)]
    pub apartment_filter: Option<Vec<ApartmentId>>,
}

fn default_round_to_nearest() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CopyYearSummary {
    pub copied: usize,
    /// Source weeks with no counterpart in the target year.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("week start {0} is not a Saturday")]
    MisalignedWeekStart(NaiveDate),
    #[error("price must not be negative (found {0})")]
    NegativePrice(Decimal),
    #[error("source and target year are both {0}")]
    SameYear(i32),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct PricingPeriodStore {
    repository: Arc<dyn PriceRepository>,
    cache: Arc<dyn PriceCache>,
}

impl PricingPeriodStore {
    pub fn new(repository: Arc<dyn PriceRepository>, cache: Arc<dyn PriceCache>) -> Self {
        Self { repository, cache }
    }

    /// Looks up the weekly price of the billing week containing `week_start`.
    ///
    /// A miss or store failure is not an error: the amount is zero and the
    /// source says why, so callers can substitute a catalog price.
    pub async fn weekly_price(
        &self,
        ctx: &LookupContext,
        apartment_id: &ApartmentId,
        week_start: NaiveDate,
    ) -> WeeklyPrice {
        let week_start = week_start_for(week_start);
        let key = PriceKey {
            apartment_id: apartment_id.clone(),
            week_start,
        };

        if let Some(amount) = self.cache.get(&key) {
            return WeeklyPrice {
                week_start,
                amount,
                source: PriceSource::Cache,
            };
        }

        let generation = self.cache.generation();
        let lookup = guarded(
            ctx,
            "weekly price lookup",
            self.repository.fetch(apartment_id, week_start),
        )
        .await;

        match lookup {
            Ok(Some(period)) => {
                self.cache.put(key, period.price, generation);
                WeeklyPrice {
                    week_start,
                    amount: period.price,
                    source: PriceSource::Store,
                }
            }
            Ok(None) => {
                warn!(apartment_id = %apartment_id, %week_start, "no weekly price configured");
                WeeklyPrice {
                    week_start,
                    amount: Decimal::ZERO,
                    source: PriceSource::Missing,
                }
            }
            Err(err) => {
                warn!(apartment_id = %apartment_id, %week_start, error = %err, "weekly price lookup degraded");
                WeeklyPrice {
                    week_start,
                    amount: Decimal::ZERO,
                    source: PriceSource::Degraded,
                }
            }
        }
    }

    pub async fn upsert_price(
        &self,
        ctx: &LookupContext,
        apartment_id: &ApartmentId,
        week_start: NaiveDate,
        price: Decimal,
        year: i32,
    ) -> Result<PricePeriod, PricingError> {
        if !weeks::is_week_start(week_start) {
            return Err(PricingError::MisalignedWeekStart(week_start));
        }
        if price < Decimal::ZERO {
            return Err(PricingError::NegativePrice(price));
        }

        let period = PricePeriod {
            apartment_id: apartment_id.clone(),
            year,
            week_start,
            price,
        };
        let written = self.write(ctx, period.clone()).await;
        self.invalidate_cache();
        written?;

        Ok(period)
    }

    /// Copies every price period of `source_year` into `target_year`, adjusting
    /// by `percent_adjust` and rounding to `round_to_nearest`.
    pub async fn copy_year(
        &self,
        ctx: &LookupContext,
        request: &CopyYearRequest,
    ) -> Result<CopyYearSummary, PricingError> {
        if request.source_year == request.target_year {
            return Err(PricingError::SameYear(request.source_year));
        }

        let periods = guarded(
            ctx,
            "price periods by year",
            self.repository.periods_for_year(request.source_year),
        )
        .await?;

        let factor = Decimal::ONE + request.percent_adjust / Decimal::ONE_HUNDRED;
        let mut summary = CopyYearSummary::default();
        let mut outcome = Ok(());

        for period in periods {
            if let Some(filter) = &request.apartment_filter {
                if !filter.contains(&period.apartment_id) {
                    continue;
                }
            }

            let Some(week_start) = weeks::shift_week_to_year(
                period.week_start,
                request.source_year,
                request.target_year,
            ) else {
                summary.skipped += 1;
                continue;
            };

            let price = request
                .rounding
                .apply(period.price * factor, request.round_to_nearest)
                .max(Decimal::ZERO);

            let copied = PricePeriod {
                apartment_id: period.apartment_id,
                year: request.target_year,
                week_start,
                price,
            };

            if let Err(err) = self.write(ctx, copied).await {
                outcome = Err(err);
                break;
            }
            summary.copied += 1;
        }

        self.invalidate_cache();
        outcome?;

        info!(
            source_year = request.source_year,
            target_year = request.target_year,
            copied = summary.copied,
            skipped = summary.skipped,
            "copied price year"
        );
        Ok(summary)
    }

    /// Seeds missing weeks of `year` inside `season` for every apartment. Existing
    /// prices are left untouched. Returns the number of periods written.
    pub async fn initialize_defaults(
        &self,
        ctx: &LookupContext,
        year: i32,
        apartments: &[Apartment],
        season: &SeasonWindow,
        seed: &PriceTableSeed,
    ) -> Result<usize, PricingError> {
        let existing: HashSet<(ApartmentId, NaiveDate)> = guarded(
            ctx,
            "price periods by year",
            self.repository.periods_for_year(year),
        )
        .await?
        .into_iter()
        .map(|period| (period.apartment_id, period.week_start))
        .collect();

        let mut written = 0;
        let mut outcome = Ok(());

        'weeks: for week_start in weeks::week_starts_in_year(year) {
            if !season.contains(week_start) {
                continue;
            }

            for apartment in apartments {
                if existing.contains(&(apartment.id.clone(), week_start)) {
                    continue;
                }

                let period = PricePeriod {
                    apartment_id: apartment.id.clone(),
                    year,
                    week_start,
                    price: seed.price_for(apartment.base_weekly_price, week_start),
                };
                if let Err(err) = self.write(ctx, period).await {
                    outcome = Err(err);
                    break 'weeks;
                }
                written += 1;
            }
        }

        self.invalidate_cache();
        outcome?;

        info!(year, written, seed_version = seed.version, "initialized default prices");
        Ok(written)
    }

    pub fn invalidate_cache(&self) {
        debug!("price cache invalidated");
        self.cache.invalidate_all();
    }

    async fn write(&self, ctx: &LookupContext, period: PricePeriod) -> Result<(), PricingError> {
        guarded(ctx, "price upsert", self.repository.upsert(period))
            .await
            .map_err(PricingError::from)
    }
}
