use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::config::EngineConfig;

use super::availability::{AvailabilityChecker, AvailabilityOutcome, AvailabilityReport};
use super::calendar::{self, CalendarDay, CalendarRules, DateBlockInfo, SeasonWindow};
use super::domain::{
    ApartmentId, GuestContact, PricePeriod, QuoteRequest, QuoteRequestId,
};
use super::pricing::{
    CopyYearRequest, CopyYearSummary, PriceTableSeed, PricingError, PricingPeriodStore,
    WeeklyPrice,
};
use super::quote::{QuoteCalculator, QuoteParams, QuoteResult, Tariff};
use super::stay::{self, StayValidationError, TwoWeeksRequirement};
use super::store::{
    guarded, ApartmentRepository, CalendarRepository, Connectivity, InMemoryPriceCache,
    LookupContext, PriceCache, PriceRepository, QuoteRequestRepository, RepositoryError,
    ReservationRepository,
};

/// Durable stores the engine reads from and writes to.
#[derive(Clone)]
pub struct BookingStores {
    pub apartments: Arc<dyn ApartmentRepository>,
    pub prices: Arc<dyn PriceRepository>,
    pub calendar: Arc<dyn CalendarRepository>,
    pub reservations: Arc<dyn ReservationRepository>,
    pub quote_requests: Arc<dyn QuoteRequestRepository>,
}

/// Error raised by the booking service.
#[derive(Debug, thiserror::Error)]
pub enum BookingServiceError {
    #[error("invalid quote request: {0}")]
    Validation(String),
    #[error(transparent)]
    Stay(#[from] StayValidationError),
    #[error("apartments unavailable for the selected dates: {}", join_ids(.apartments))]
    AvailabilityConflict { apartments: Vec<ApartmentId> },
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub(crate) fn join_ids(ids: &[ApartmentId]) -> String {
    ids.iter()
        .map(|id| id.0.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Entry point consumed by the wizard and the HTTP layer.
pub struct BookingQuoteService {
    stores: BookingStores,
    pricing: Arc<PricingPeriodStore>,
    calendar: CalendarRules,
    availability: AvailabilityChecker,
    calculator: QuoteCalculator,
    config: EngineConfig,
    reference_day: Option<NaiveDate>,
}

impl BookingQuoteService {
    pub fn new(stores: BookingStores, config: EngineConfig) -> Self {
        Self::with_cache(stores, Arc::new(InMemoryPriceCache::default()), config)
    }

    pub fn with_cache(
        stores: BookingStores,
        cache: Arc<dyn PriceCache>,
        config: EngineConfig,
    ) -> Self {
        Self::with_tariff(stores, cache, config, Tariff::default())
    }

    pub fn with_tariff(
        stores: BookingStores,
        cache: Arc<dyn PriceCache>,
        config: EngineConfig,
        tariff: Tariff,
    ) -> Self {
        let pricing = Arc::new(PricingPeriodStore::new(stores.prices.clone(), cache));
        let calendar = CalendarRules::new(stores.calendar.clone());
        let availability = AvailabilityChecker::new(stores.reservations.clone())
            .with_suggestion_horizon(config.suggestion_horizon_days);
        let calculator = QuoteCalculator::new(stores.apartments.clone(), pricing.clone(), tariff);

        Self {
            stores,
            pricing,
            calendar,
            availability,
            calculator,
            config,
            reference_day: None,
        }
    }

    /// Pins the day used by [`Self::context_for_today`] instead of the local clock.
    pub fn with_reference_day(mut self, day: NaiveDate) -> Self {
        self.reference_day = Some(day);
        self
    }

    /// Lookup context for `today` using the configured timeout and connectivity.
    pub fn context(&self, today: NaiveDate) -> LookupContext {
        let ctx = if self.config.offline {
            LookupContext::offline(today)
        } else {
            LookupContext::online(today)
        };
        ctx.with_timeout(self.config.store_timeout)
    }

    pub fn context_for_today(&self) -> LookupContext {
        let today = self
            .reference_day
            .unwrap_or_else(|| Local::now().date_naive());
        self.context(today)
    }

    pub fn connectivity(&self) -> Connectivity {
        if self.config.offline {
            Connectivity::Offline
        } else {
            Connectivity::Online
        }
    }

    pub async fn calculate_quote(&self, ctx: &LookupContext, params: &QuoteParams) -> QuoteResult {
        self.calculator.calculate(ctx, params).await
    }

    pub async fn check_availability(
        &self,
        ctx: &LookupContext,
        apartment_id: &ApartmentId,
        checkin: NaiveDate,
        checkout: NaiveDate,
    ) -> bool {
        self.availability
            .is_available(ctx, apartment_id, checkin, checkout)
            .await
    }

    pub async fn check_availability_detailed(
        &self,
        ctx: &LookupContext,
        apartment_id: &ApartmentId,
        checkin: NaiveDate,
        checkout: NaiveDate,
    ) -> AvailabilityReport {
        self.availability
            .check_detailed(ctx, apartment_id, checkin, checkout)
            .await
    }

    pub async fn check_many_availability(
        &self,
        ctx: &LookupContext,
        apartment_ids: &[ApartmentId],
        checkin: NaiveDate,
        checkout: NaiveDate,
    ) -> BTreeMap<ApartmentId, AvailabilityOutcome> {
        self.availability
            .check_many(ctx, apartment_ids, checkin, checkout)
            .await
    }

    pub async fn date_block_info(
        &self,
        ctx: &LookupContext,
        date: NaiveDate,
        apartment: Option<&ApartmentId>,
    ) -> DateBlockInfo {
        self.calendar.date_block_info(ctx, date, apartment).await
    }

    pub async fn calendar_range(
        &self,
        ctx: &LookupContext,
        from: NaiveDate,
        to: NaiveDate,
        apartment: Option<&ApartmentId>,
    ) -> Vec<CalendarDay> {
        self.calendar.calendar_range(ctx, from, to, apartment).await
    }

    pub fn is_valid_check_in_out_day(date: NaiveDate) -> bool {
        calendar::is_valid_check_in_out_day(date)
    }

    pub fn requires_two_weeks_minimum(
        checkin: NaiveDate,
        checkout: NaiveDate,
    ) -> TwoWeeksRequirement {
        stay::requires_two_weeks_minimum(checkin, checkout)
    }

    pub fn validate_stay(
        checkin: NaiveDate,
        checkout: NaiveDate,
    ) -> Result<u32, StayValidationError> {
        stay::validate_stay(checkin, checkout)
    }

    /// Stay rules checked against the season window and global date blocks.
    pub async fn check_stay_dates(
        &self,
        ctx: &LookupContext,
        checkin: NaiveDate,
        checkout: NaiveDate,
    ) -> Result<u32, StayValidationError> {
        self.calendar.check_stay_dates(ctx, checkin, checkout).await
    }

    /// Re-validates the stay, confirms every selected apartment is free, prices
    /// the parameters and stores the result.
    pub async fn submit_quote_request(
        &self,
        ctx: &LookupContext,
        params: &QuoteParams,
        guest: &GuestContact,
    ) -> Result<(QuoteRequestId, QuoteResult), BookingServiceError> {
        let (Some(checkin), Some(checkout)) = (params.checkin, params.checkout) else {
            return Err(BookingServiceError::Validation(
                "check-in and check-out dates are required".to_string(),
            ));
        };
        if params.apartments.is_empty() {
            return Err(BookingServiceError::Validation(
                "select at least one apartment".to_string(),
            ));
        }
        self.check_stay_dates(ctx, checkin, checkout).await?;

        let availability = self
            .check_many_availability(ctx, &params.apartments, checkin, checkout)
            .await;
        let unavailable: Vec<ApartmentId> = availability
            .into_iter()
            .filter(|(_, outcome)| !outcome.is_available())
            .map(|(id, _)| id)
            .collect();
        if !unavailable.is_empty() {
            return Err(BookingServiceError::AvailabilityConflict {
                apartments: unavailable,
            });
        }

        let quote = self.calculate_quote(ctx, params).await;
        let id = self.save_quote_request(ctx, params, &quote, guest).await?;
        Ok((id, quote))
    }

    /// Persists an immutable snapshot of a computed quote.
    pub async fn save_quote_request(
        &self,
        ctx: &LookupContext,
        params: &QuoteParams,
        result: &QuoteResult,
        guest: &GuestContact,
    ) -> Result<QuoteRequestId, BookingServiceError> {
        let (Some(checkin), Some(checkout)) = (params.checkin, params.checkout) else {
            return Err(BookingServiceError::Validation(
                "check-in and check-out dates are required".to_string(),
            ));
        };
        if !result.is_priced() {
            return Err(BookingServiceError::Validation(
                "quote has not been calculated".to_string(),
            ));
        }
        if !guest.is_reachable() {
            return Err(BookingServiceError::Validation(
                "guest name and an e-mail or phone number are required".to_string(),
            ));
        }

        let request = QuoteRequest {
            id: QuoteRequestId(Uuid::new_v4().to_string()),
            checkin,
            checkout,
            adults: params.adults,
            children: params.children.len() as u32,
            selected_apartments: params.with_distinct_apartments().apartments,
            has_pet: params.has_pet,
            linen_requested: params.linen_requested,
            base_total: result.apartments_subtotal,
            discount_total: result.discount_total,
            extras_total: result.extras_total,
            final_total: result.final_total,
            guest_name: guest.name.trim().to_string(),
            guest_email: guest.email.clone(),
            guest_phone: guest.phone.clone(),
            whatsapp_sent: false,
            created_at: Utc::now(),
        };

        let stored = guarded(
            ctx,
            "quote request insert",
            self.stores.quote_requests.insert(request),
        )
        .await?;

        info!(quote_request_id = %stored.id, final_total = %stored.final_total, "quote request saved");
        Ok(stored.id)
    }

    pub async fn quote_request(
        &self,
        ctx: &LookupContext,
        id: &QuoteRequestId,
    ) -> Result<QuoteRequest, BookingServiceError> {
        guarded(ctx, "quote request fetch", self.stores.quote_requests.fetch(id))
            .await?
            .ok_or(BookingServiceError::Repository(RepositoryError::NotFound))
    }

    pub async fn mark_quote_request_sent(
        &self,
        ctx: &LookupContext,
        id: &QuoteRequestId,
    ) -> Result<(), BookingServiceError> {
        guarded(ctx, "quote request update", self.stores.quote_requests.mark_sent(id)).await?;
        Ok(())
    }

    pub async fn weekly_price(
        &self,
        ctx: &LookupContext,
        apartment_id: &ApartmentId,
        week_start: NaiveDate,
    ) -> WeeklyPrice {
        self.pricing.weekly_price(ctx, apartment_id, week_start).await
    }

    pub async fn upsert_price(
        &self,
        ctx: &LookupContext,
        apartment_id: &ApartmentId,
        week_start: NaiveDate,
        price: Decimal,
        year: i32,
    ) -> Result<PricePeriod, BookingServiceError> {
        Ok(self
            .pricing
            .upsert_price(ctx, apartment_id, week_start, price, year)
            .await?)
    }

    pub async fn copy_year(
        &self,
        ctx: &LookupContext,
        request: &CopyYearRequest,
    ) -> Result<CopyYearSummary, BookingServiceError> {
        Ok(self.pricing.copy_year(ctx, request).await?)
    }

    /// Seeds the year's season weeks for every catalog apartment.
    pub async fn initialize_defaults(
        &self,
        ctx: &LookupContext,
        year: i32,
        seed: &PriceTableSeed,
    ) -> Result<usize, BookingServiceError> {
        let apartments = guarded(ctx, "apartment list", self.stores.apartments.list()).await?;
        let season = self
            .calendar
            .season_window(ctx, year)
            .await
            .ok_or_else(|| BookingServiceError::Validation(format!("year {year} out of range")))?;

        Ok(self
            .pricing
            .initialize_defaults(ctx, year, &apartments, &season, seed)
            .await?)
    }

    pub async fn season_window(&self, ctx: &LookupContext, year: i32) -> Option<SeasonWindow> {
        self.calendar.season_window(ctx, year).await
    }

    pub fn invalidate_cache(&self) {
        self.pricing.invalidate_cache();
    }

    pub fn tariff(&self) -> &Tariff {
        self.calculator.tariff()
    }
}
