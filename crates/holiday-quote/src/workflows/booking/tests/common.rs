use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::Response;
use axum::Router;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use tokio::sync::Notify;

use crate::config::EngineConfig;
use crate::workflows::booking::domain::{
    Apartment, ApartmentId, DateBlock, PaymentStatus, PricePeriod, QuoteRequest, QuoteRequestId,
    Reservation, ReservationId, SeasonConfig,
};
use crate::workflows::booking::quote::QuoteParams;
use crate::workflows::booking::service::{BookingQuoteService, BookingStores};
use crate::workflows::booking::store::{
    ApartmentRepository, CalendarRepository, InMemoryPriceCache, LookupContext, PriceRepository,
    QuoteRequestRepository, RepositoryError, ReservationRepository,
};
use crate::workflows::booking::booking_router;

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn apt(id: &str) -> ApartmentId {
    ApartmentId::new(id)
}

pub(super) fn today() -> NaiveDate {
    date(2025, 5, 1)
}

pub(super) fn ctx() -> LookupContext {
    LookupContext::online(today())
}

/// "orchidea" sleeps six with the default cleaning fee, "glicine" sleeps four
/// with its own fee of 70.
pub(super) fn catalog() -> Vec<Apartment> {
    vec![
        Apartment {
            id: apt("orchidea"),
            name: "Orchidea".to_string(),
            capacity: 6,
            beds: 6,
            bedrooms: 3,
            base_weekly_price: dec!(650),
            cleaning_fee: None,
        },
        Apartment {
            id: apt("glicine"),
            name: "Glicine".to_string(),
            capacity: 4,
            beds: 4,
            bedrooms: 2,
            base_weekly_price: dec!(500),
            cleaning_fee: Some(dec!(70)),
        },
    ]
}

pub(super) fn reservation(
    id: &str,
    apartment: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Reservation {
    Reservation {
        id: ReservationId(id.to_string()),
        apartment_ids: vec![apt(apartment)],
        start_date: start,
        end_date: end,
        guest_name: "Rossi".to_string(),
        payment_status: PaymentStatus::DepositPaid,
    }
}

pub(super) fn block(id: &str, apartment: Option<&str>, start: NaiveDate, end: NaiveDate) -> DateBlock {
    DateBlock {
        id: id.to_string(),
        apartment_id: apartment.map(apt),
        start_date: start,
        end_date: end,
        reason: String::new(),
        is_active: true,
    }
}

/// Seven nights from Saturday 2025-07-05 for four adults in "orchidea".
pub(super) fn week_in_july() -> QuoteParams {
    QuoteParams {
        apartments: vec![apt("orchidea")],
        checkin: Some(date(2025, 7, 5)),
        checkout: Some(date(2025, 7, 12)),
        adults: 4,
        ..QuoteParams::default()
    }
}

pub(super) struct MemoryApartments {
    apartments: Vec<Apartment>,
}

impl MemoryApartments {
    pub(super) fn new(apartments: Vec<Apartment>) -> Self {
        Self { apartments }
    }
}

#[async_trait]
impl ApartmentRepository for MemoryApartments {
    async fn list(&self) -> Result<Vec<Apartment>, RepositoryError> {
        Ok(self.apartments.clone())
    }

    async fn fetch(&self, id: &ApartmentId) -> Result<Option<Apartment>, RepositoryError> {
        Ok(self
            .apartments
            .iter()
            .find(|apartment| &apartment.id == id)
            .cloned())
    }
}

#[derive(Default)]
pub(super) struct MemoryPrices {
    periods: Mutex<BTreeMap<(ApartmentId, NaiveDate), PricePeriod>>,
    fetches: AtomicUsize,
}

impl MemoryPrices {
    pub(super) fn with_price(self, apartment: &str, week_start: NaiveDate, price: Decimal) -> Self {
        self.periods.lock().expect("prices mutex poisoned").insert(
            (apt(apartment), week_start),
            PricePeriod {
                apartment_id: apt(apartment),
                year: week_start.year(),
                week_start,
                price,
            },
        );
        self
    }

    pub(super) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(super) fn price(&self, apartment: &str, week_start: NaiveDate) -> Option<Decimal> {
        self.periods
            .lock()
            .expect("prices mutex poisoned")
            .get(&(apt(apartment), week_start))
            .map(|period| period.price)
    }

    pub(super) fn count_for_year(&self, year: i32) -> usize {
        self.periods
            .lock()
            .expect("prices mutex poisoned")
            .values()
            .filter(|period| period.year == year)
            .count()
    }
}

#[async_trait]
impl PriceRepository for MemoryPrices {
    async fn fetch(
        &self,
        apartment_id: &ApartmentId,
        week_start: NaiveDate,
    ) -> Result<Option<PricePeriod>, RepositoryError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .periods
            .lock()
            .expect("prices mutex poisoned")
            .get(&(apartment_id.clone(), week_start))
            .cloned())
    }

    async fn periods_for_year(&self, year: i32) -> Result<Vec<PricePeriod>, RepositoryError> {
        Ok(self
            .periods
            .lock()
            .expect("prices mutex poisoned")
            .values()
            .filter(|period| period.year == year)
            .cloned()
            .collect())
    }

    async fn upsert(&self, period: PricePeriod) -> Result<(), RepositoryError> {
        self.periods
            .lock()
            .expect("prices mutex poisoned")
            .insert((period.apartment_id.clone(), period.week_start), period);
        Ok(())
    }
}

pub(super) struct FailingPrices;

#[async_trait]
impl PriceRepository for FailingPrices {
    async fn fetch(
        &self,
        _apartment_id: &ApartmentId,
        _week_start: NaiveDate,
    ) -> Result<Option<PricePeriod>, RepositoryError> {
        Err(RepositoryError::Unavailable("connection reset".to_string()))
    }

    async fn periods_for_year(&self, _year: i32) -> Result<Vec<PricePeriod>, RepositoryError> {
        Err(RepositoryError::Unavailable("connection reset".to_string()))
    }

    async fn upsert(&self, _period: PricePeriod) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("connection reset".to_string()))
    }
}

/// Holds the first price lookup after reading it until `release` is notified.
pub(super) struct GatedPrices {
    pub(super) inner: MemoryPrices,
    gated: AtomicBool,
    pub(super) entered: Notify,
    pub(super) release: Notify,
}

impl GatedPrices {
    pub(super) fn new(inner: MemoryPrices) -> Self {
        Self {
            inner,
            gated: AtomicBool::new(true),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl PriceRepository for GatedPrices {
    async fn fetch(
        &self,
        apartment_id: &ApartmentId,
        week_start: NaiveDate,
    ) -> Result<Option<PricePeriod>, RepositoryError> {
        let result = self.inner.fetch(apartment_id, week_start).await;
        if self.gated.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        result
    }

    async fn periods_for_year(&self, year: i32) -> Result<Vec<PricePeriod>, RepositoryError> {
        self.inner.periods_for_year(year).await
    }

    async fn upsert(&self, period: PricePeriod) -> Result<(), RepositoryError> {
        self.inner.upsert(period).await
    }
}

/// Answers every price lookup after `delay`.
pub(super) struct SlowPrices {
    pub(super) delay: Duration,
}

#[async_trait]
impl PriceRepository for SlowPrices {
    async fn fetch(
        &self,
        apartment_id: &ApartmentId,
        week_start: NaiveDate,
    ) -> Result<Option<PricePeriod>, RepositoryError> {
        tokio::time::sleep(self.delay).await;
        Ok(Some(PricePeriod {
            apartment_id: apartment_id.clone(),
            year: week_start.year(),
            week_start,
            price: dec!(999),
        }))
    }

    async fn periods_for_year(&self, _year: i32) -> Result<Vec<PricePeriod>, RepositoryError> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    async fn upsert(&self, _period: PricePeriod) -> Result<(), RepositoryError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryCalendar {
    pub(super) seasons: Vec<SeasonConfig>,
    pub(super) blocks: Vec<DateBlock>,
}

#[async_trait]
impl CalendarRepository for MemoryCalendar {
    async fn season_config(&self, year: i32) -> Result<Option<SeasonConfig>, RepositoryError> {
        Ok(self
            .seasons
            .iter()
            .find(|config| config.year == year && config.is_active)
            .copied())
    }

    async fn active_blocks(&self) -> Result<Vec<DateBlock>, RepositoryError> {
        Ok(self.blocks.clone())
    }
}

pub(super) struct FailingCalendar;

#[async_trait]
impl CalendarRepository for FailingCalendar {
    async fn season_config(&self, _year: i32) -> Result<Option<SeasonConfig>, RepositoryError> {
        Err(RepositoryError::Unavailable("calendar offline".to_string()))
    }

    async fn active_blocks(&self) -> Result<Vec<DateBlock>, RepositoryError> {
        Err(RepositoryError::Unavailable("calendar offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryReservations {
    pub(super) reservations: Vec<Reservation>,
}

#[async_trait]
impl ReservationRepository for MemoryReservations {
    async fn for_apartment(
        &self,
        apartment_id: &ApartmentId,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        Ok(self
            .reservations
            .iter()
            .filter(|reservation| reservation.involves(apartment_id))
            .cloned()
            .collect())
    }
}

/// Fails lookups for one apartment and serves the rest from memory.
pub(super) struct PartiallyFailingReservations {
    pub(super) failing: ApartmentId,
    pub(super) inner: MemoryReservations,
}

#[async_trait]
impl ReservationRepository for PartiallyFailingReservations {
    async fn for_apartment(
        &self,
        apartment_id: &ApartmentId,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        if apartment_id == &self.failing {
            return Err(RepositoryError::Unavailable("reservations offline".to_string()));
        }
        self.inner.for_apartment(apartment_id).await
    }
}

#[derive(Default)]
pub(super) struct MemoryQuoteRequests {
    requests: Mutex<BTreeMap<QuoteRequestId, QuoteRequest>>,
}

impl MemoryQuoteRequests {
    pub(super) fn stored(&self) -> Vec<QuoteRequest> {
        self.requests
            .lock()
            .expect("quote mutex poisoned")
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl QuoteRequestRepository for MemoryQuoteRequests {
    async fn insert(&self, request: QuoteRequest) -> Result<QuoteRequest, RepositoryError> {
        let mut guard = self.requests.lock().expect("quote mutex poisoned");
        if guard.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    async fn fetch(&self, id: &QuoteRequestId) -> Result<Option<QuoteRequest>, RepositoryError> {
        Ok(self
            .requests
            .lock()
            .expect("quote mutex poisoned")
            .get(id)
            .cloned())
    }

    async fn mark_sent(&self, id: &QuoteRequestId) -> Result<(), RepositoryError> {
        let mut guard = self.requests.lock().expect("quote mutex poisoned");
        let request = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        request.whatsapp_sent = true;
        Ok(())
    }
}

/// Service wired to in-memory stores, with handles kept for assertions.
pub(super) struct Harness {
    pub(super) service: Arc<BookingQuoteService>,
    pub(super) prices: Arc<MemoryPrices>,
    pub(super) cache: Arc<InMemoryPriceCache>,
    pub(super) quote_requests: Arc<MemoryQuoteRequests>,
}

pub(super) fn default_prices() -> MemoryPrices {
    MemoryPrices::default()
        .with_price("orchidea", date(2025, 7, 5), dec!(400))
        .with_price("orchidea", date(2025, 7, 12), dec!(450))
        .with_price("glicine", date(2025, 7, 5), dec!(300))
        .with_price("glicine", date(2025, 7, 12), dec!(320))
}

pub(super) fn default_reservations() -> MemoryReservations {
    MemoryReservations {
        reservations: vec![reservation(
            "res-1",
            "glicine",
            date(2025, 7, 12),
            date(2025, 7, 26),
        )],
    }
}

pub(super) fn harness() -> Harness {
    harness_with(
        default_prices(),
        MemoryCalendar::default(),
        default_reservations(),
        EngineConfig::default(),
    )
}

pub(super) fn harness_with(
    prices: MemoryPrices,
    calendar: MemoryCalendar,
    reservations: MemoryReservations,
    config: EngineConfig,
) -> Harness {
    let prices = Arc::new(prices);
    let cache = Arc::new(InMemoryPriceCache::default());
    let quote_requests = Arc::new(MemoryQuoteRequests::default());

    let stores = BookingStores {
        apartments: Arc::new(MemoryApartments::new(catalog())),
        prices: prices.clone(),
        calendar: Arc::new(calendar),
        reservations: Arc::new(reservations),
        quote_requests: quote_requests.clone(),
    };

    Harness {
        service: Arc::new(
            BookingQuoteService::with_cache(stores, cache.clone(), config)
                .with_reference_day(today()),
        ),
        prices,
        cache,
        quote_requests,
    }
}

/// Service whose stores are replaced piecewise by the caller.
pub(super) fn service_with_stores(
    prices: Arc<dyn PriceRepository>,
    calendar: Arc<dyn CalendarRepository>,
    reservations: Arc<dyn ReservationRepository>,
) -> BookingQuoteService {
    let stores = BookingStores {
        apartments: Arc::new(MemoryApartments::new(catalog())),
        prices,
        calendar,
        reservations,
        quote_requests: Arc::new(MemoryQuoteRequests::default()),
    };
    BookingQuoteService::new(stores, EngineConfig::default()).with_reference_day(today())
}

pub(super) fn router_for(harness: &Harness) -> Router {
    booking_router(harness.service.clone())
}

pub(super) async fn json_body(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}
