use async_trait::async_trait;
use chrono::{Local, NaiveDate, Weekday};
use holiday_quote::config::EngineConfig;
use holiday_quote::workflows::booking::{
    Apartment, ApartmentId, ApartmentRepository, BookingQuoteService, BookingStores,
    CalendarRepository, DateBlock, LookupContext, PaymentStatus, PricePeriod, PriceRepository,
    PriceTableSeed, QuoteRequest, QuoteRequestId, QuoteRequestRepository, RepositoryError,
    Reservation, ReservationId, ReservationRepository, SeasonConfig,
};
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, store: &str) -> Result<MutexGuard<'a, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable(format!("{store} mutex poisoned")))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryCatalog {
    apartments: Arc<Mutex<Vec<Apartment>>>,
}

impl InMemoryCatalog {
    pub(crate) fn with_apartments(apartments: Vec<Apartment>) -> Self {
        Self {
            apartments: Arc::new(Mutex::new(apartments)),
        }
    }
}

#[async_trait]
impl ApartmentRepository for InMemoryCatalog {
    async fn list(&self) -> Result<Vec<Apartment>, RepositoryError> {
        Ok(lock(&self.apartments, "catalog")?.clone())
    }

    async fn fetch(&self, id: &ApartmentId) -> Result<Option<Apartment>, RepositoryError> {
        let guard = lock(&self.apartments, "catalog")?;
        Ok(guard.iter().find(|apartment| &apartment.id == id).cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryPriceStore {
    periods: Arc<Mutex<HashMap<(ApartmentId, NaiveDate), PricePeriod>>>,
}

#[async_trait]
impl PriceRepository for InMemoryPriceStore {
    async fn fetch(
        &self,
        apartment_id: &ApartmentId,
        week_start: NaiveDate,
    ) -> Result<Option<PricePeriod>, RepositoryError> {
        let guard = lock(&self.periods, "price")?;
        Ok(guard.get(&(apartment_id.clone(), week_start)).cloned())
    }

    async fn periods_for_year(&self, year: i32) -> Result<Vec<PricePeriod>, RepositoryError> {
        let guard = lock(&self.periods, "price")?;
        let mut periods: Vec<PricePeriod> = guard
            .values()
            .filter(|period| period.year == year)
            .cloned()
            .collect();
        periods.sort_by(|a, b| {
            (a.week_start, &a.apartment_id).cmp(&(b.week_start, &b.apartment_id))
        });
        Ok(periods)
    }

    async fn upsert(&self, period: PricePeriod) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.periods, "price")?;
        guard.insert((period.apartment_id.clone(), period.week_start), period);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryCalendar {
    seasons: Arc<Mutex<Vec<SeasonConfig>>>,
    blocks: Arc<Mutex<Vec<DateBlock>>>,
}

impl InMemoryCalendar {
    pub(crate) fn with_blocks(blocks: Vec<DateBlock>) -> Self {
        Self {
            seasons: Arc::default(),
            blocks: Arc::new(Mutex::new(blocks)),
        }
    }
}

#[async_trait]
impl CalendarRepository for InMemoryCalendar {
    async fn season_config(&self, year: i32) -> Result<Option<SeasonConfig>, RepositoryError> {
        let guard = lock(&self.seasons, "season")?;
        Ok(guard
            .iter()
            .find(|config| config.year == year && config.is_active)
            .copied())
    }

    async fn active_blocks(&self) -> Result<Vec<DateBlock>, RepositoryError> {
        let guard = lock(&self.blocks, "date block")?;
        Ok(guard.iter().filter(|block| block.is_active).cloned().collect())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryReservations {
    reservations: Arc<Mutex<Vec<Reservation>>>,
}

impl InMemoryReservations {
    pub(crate) fn with_reservations(reservations: Vec<Reservation>) -> Self {
        Self {
            reservations: Arc::new(Mutex::new(reservations)),
        }
    }
}

#[async_trait]
impl ReservationRepository for InMemoryReservations {
    async fn for_apartment(
        &self,
        apartment_id: &ApartmentId,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        let guard = lock(&self.reservations, "reservation")?;
        Ok(guard
            .iter()
            .filter(|reservation| reservation.involves(apartment_id))
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryQuoteRequests {
    requests: Arc<Mutex<BTreeMap<QuoteRequestId, QuoteRequest>>>,
}

impl InMemoryQuoteRequests {
    pub(crate) fn requests(&self) -> Vec<QuoteRequest> {
        self.requests
            .lock()
            .map(|guard| guard.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl QuoteRequestRepository for InMemoryQuoteRequests {
    async fn insert(&self, request: QuoteRequest) -> Result<QuoteRequest, RepositoryError> {
        let mut guard = lock(&self.requests, "quote request")?;
        if guard.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    async fn fetch(&self, id: &QuoteRequestId) -> Result<Option<QuoteRequest>, RepositoryError> {
        let guard = lock(&self.requests, "quote request")?;
        Ok(guard.get(id).cloned())
    }

    async fn mark_sent(&self, id: &QuoteRequestId) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.requests, "quote request")?;
        let request = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        request.whatsapp_sent = true;
        Ok(())
    }
}

/// Demo backend: stores wired for the service plus handles kept for inspection.
#[derive(Clone)]
pub(crate) struct DemoBackend {
    pub(crate) catalog: InMemoryCatalog,
    pub(crate) prices: InMemoryPriceStore,
    pub(crate) calendar: InMemoryCalendar,
    pub(crate) reservations: InMemoryReservations,
    pub(crate) quote_requests: InMemoryQuoteRequests,
}

impl DemoBackend {
    /// Three apartments with a few reservations and an end-of-season block in `year`.
    pub(crate) fn seeded(year: i32) -> Self {
        Self {
            catalog: InMemoryCatalog::with_apartments(demo_catalog()),
            prices: InMemoryPriceStore::default(),
            calendar: InMemoryCalendar::with_blocks(demo_blocks(year)),
            reservations: InMemoryReservations::with_reservations(demo_reservations(year)),
            quote_requests: InMemoryQuoteRequests::default(),
        }
    }

    pub(crate) fn stores(&self) -> BookingStores {
        BookingStores {
            apartments: Arc::new(self.catalog.clone()),
            prices: Arc::new(self.prices.clone()),
            calendar: Arc::new(self.calendar.clone()),
            reservations: Arc::new(self.reservations.clone()),
            quote_requests: Arc::new(self.quote_requests.clone()),
        }
    }
}

/// Builds the service over `backend` and seeds default weekly prices for `seed_years`.
pub(crate) async fn demo_service(
    backend: &DemoBackend,
    config: EngineConfig,
    seed_years: &[i32],
) -> BookingQuoteService {
    let ctx = LookupContext::online(Local::now().date_naive()).with_timeout(config.store_timeout);
    let service = BookingQuoteService::new(backend.stores(), config);
    let seed = PriceTableSeed::standard();

    for &year in seed_years {
        match service.initialize_defaults(&ctx, year, &seed).await {
            Ok(written) => info!(year, written, "seeded default weekly prices"),
            Err(err) => warn!(year, error = %err, "default weekly prices not seeded"),
        }
    }

    service
}

pub(crate) fn demo_catalog() -> Vec<Apartment> {
    vec![
        Apartment {
            id: ApartmentId::new("girasole"),
            name: "Girasole".to_string(),
            capacity: 4,
            beds: 4,
            bedrooms: 2,
            base_weekly_price: dec!(600),
            cleaning_fee: None,
        },
        Apartment {
            id: ApartmentId::new("corallo"),
            name: "Corallo".to_string(),
            capacity: 6,
            beds: 6,
            bedrooms: 3,
            base_weekly_price: dec!(800),
            cleaning_fee: Some(dec!(60)),
        },
        Apartment {
            id: ApartmentId::new("ulivo"),
            name: "Ulivo".to_string(),
            capacity: 2,
            beds: 2,
            bedrooms: 1,
            base_weekly_price: dec!(400),
            cleaning_fee: Some(dec!(40)),
        },
    ]
}

fn nth_saturday(year: i32, month: u32, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, Weekday::Sat, n)
}

fn demo_reservations(year: i32) -> Vec<Reservation> {
    let booking = |id: &str, apartments: &[&str], start: Option<NaiveDate>, weeks: i64| {
        start.map(|start| Reservation {
            id: ReservationId(format!("{id}-{year}")),
            apartment_ids: apartments.iter().map(|key| ApartmentId::new(*key)).collect(),
            start_date: start,
            end_date: start + chrono::Duration::weeks(weeks),
            guest_name: "Demo guest".to_string(),
            payment_status: PaymentStatus::DepositPaid,
        })
    };

    [
        booking("res-girasole", &["girasole"], nth_saturday(year, 7, 1), 1),
        booking("res-corallo", &["corallo"], nth_saturday(year, 8, 2), 2),
        booking("res-group", &["girasole", "ulivo"], nth_saturday(year, 9, 1), 1),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn demo_blocks(year: i32) -> Vec<DateBlock> {
    let (Some(start), Some(end)) = (
        NaiveDate::from_ymd_opt(year, 10, 20),
        NaiveDate::from_ymd_opt(year, 10, 31),
    ) else {
        return Vec::new();
    };

    vec![DateBlock {
        id: format!("maintenance-{year}"),
        apartment_id: None,
        start_date: start,
        end_date: end,
        reason: "end-of-season maintenance".to_string(),
        is_active: true,
    }]
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
