use std::collections::HashMap;
use std::future::Future;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{
    Apartment, ApartmentId, DateBlock, PricePeriod, QuoteRequest, QuoteRequestId, Reservation,
    SeasonConfig,
};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(2500);

/// Error enumeration for durable store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("{operation} timed out after {after_ms} ms")]
    Timeout {
        operation: &'static str,
        after_ms: u128,
    },
    #[error("store skipped while offline")]
    Offline,
}

#[async_trait]
pub trait ApartmentRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Apartment>, RepositoryError>;
    async fn fetch(&self, id: &ApartmentId) -> Result<Option<Apartment>, RepositoryError>;
}

#[async_trait]
pub trait PriceRepository: Send + Sync {
    async fn fetch(
        &self,
        apartment_id: &ApartmentId,
        week_start: NaiveDate,
    ) -> Result<Option<PricePeriod>, RepositoryError>;
    async fn periods_for_year(&self, year: i32) -> Result<Vec<PricePeriod>, RepositoryError>;
    /// Inserts or overwrites the period for `(apartment_id, week_start)`.
    async fn upsert(&self, period: PricePeriod) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CalendarRepository: Send + Sync {
    async fn season_config(&self, year: i32) -> Result<Option<SeasonConfig>, RepositoryError>;
    async fn active_blocks(&self) -> Result<Vec<DateBlock>, RepositoryError>;
}

#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn for_apartment(
        &self,
        apartment_id: &ApartmentId,
    ) -> Result<Vec<Reservation>, RepositoryError>;
}

#[async_trait]
pub trait QuoteRequestRepository: Send + Sync {
    async fn insert(&self, request: QuoteRequest) -> Result<QuoteRequest, RepositoryError>;
    async fn fetch(&self, id: &QuoteRequestId) -> Result<Option<QuoteRequest>, RepositoryError>;
    async fn mark_sent(&self, id: &QuoteRequestId) -> Result<(), RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriceKey {
    pub apartment_id: ApartmentId,
    pub week_start: NaiveDate,
}

/// Read-through cache in front of the price repository.
///
/// Every `invalidate_all` starts a new generation. A reader captures the
/// generation before going to the store and passes it to `put`, which drops
/// the value when an invalidation happened in between.
pub trait PriceCache: Send + Sync {
    fn get(&self, key: &PriceKey) -> Option<Decimal>;
    fn generation(&self) -> u64;
    fn put(&self, key: PriceKey, price: Decimal, generation: u64);
    fn invalidate_all(&self);
}

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    entries: HashMap<PriceKey, Decimal>,
}

#[derive(Debug, Default)]
pub struct InMemoryPriceCache {
    state: RwLock<CacheState>,
}

impl InMemoryPriceCache {
    pub fn len(&self) -> usize {
        self.state.read().map(|guard| guard.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PriceCache for InMemoryPriceCache {
    fn get(&self, key: &PriceKey) -> Option<Decimal> {
        self.state
            .read()
            .ok()
            .and_then(|guard| guard.entries.get(key).copied())
    }

    fn generation(&self) -> u64 {
        match self.state.read() {
            Ok(guard) => guard.generation,
            Err(poisoned) => poisoned.into_inner().generation,
        }
    }

    fn put(&self, key: PriceKey, price: Decimal, generation: u64) {
        if let Ok(mut guard) = self.state.write() {
            if guard.generation == generation {
                guard.entries.insert(key, price);
            }
        }
    }

    fn invalidate_all(&self) {
        let mut guard = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.generation += 1;
        guard.entries.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Online,
    Offline,
}

/// Per-call settings for store lookups: connectivity, timeout and the reference day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupContext {
    pub connectivity: Connectivity,
    pub timeout: Duration,
    pub today: NaiveDate,
}

impl LookupContext {
    pub fn online(today: NaiveDate) -> Self {
        Self {
            connectivity: Connectivity::Online,
            timeout: DEFAULT_STORE_TIMEOUT,
            today,
        }
    }

    pub fn offline(today: NaiveDate) -> Self {
        Self {
            connectivity: Connectivity::Offline,
            ..Self::online(today)
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_offline(&self) -> bool {
        self.connectivity == Connectivity::Offline
    }
}

/// Runs a store call under the context's connectivity and timeout rules.
pub(crate) async fn guarded<T, F>(
    ctx: &LookupContext,
    operation: &'static str,
    call: F,
) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    if ctx.is_offline() {
        return Err(RepositoryError::Offline);
    }

    match tokio::time::timeout(ctx.timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(RepositoryError::Timeout {
            operation,
            after_ms: ctx.timeout.as_millis(),
        }),
    }
}
