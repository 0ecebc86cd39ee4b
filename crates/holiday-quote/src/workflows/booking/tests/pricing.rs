use super::common::*;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;

use crate::workflows::booking::pricing::{
    CopyYearRequest, PriceSource, PriceTableSeed, PricingError, PricingPeriodStore, RoundingMode,
};
use crate::workflows::booking::service::BookingServiceError;
use crate::workflows::booking::store::{
    InMemoryPriceCache, LookupContext, PriceCache, PriceKey,
};

#[tokio::test]
async fn weekly_price_reads_through_the_cache() {
    let harness = harness();
    let ctx = ctx();

    let first = harness
        .service
        .weekly_price(&ctx, &apt("orchidea"), date(2025, 7, 5))
        .await;
    let second = harness
        .service
        .weekly_price(&ctx, &apt("orchidea"), date(2025, 7, 5))
        .await;

    assert_eq!(first.amount, dec!(400));
    assert_eq!(first.source, PriceSource::Store);
    assert_eq!(second.amount, dec!(400));
    assert_eq!(second.source, PriceSource::Cache);
    assert_eq!(harness.prices.fetch_count(), 1);
    assert_eq!(harness.cache.len(), 1);
}

#[test]
fn cache_drops_values_read_before_an_invalidation() {
    let cache = InMemoryPriceCache::default();
    let key = PriceKey {
        apartment_id: apt("orchidea"),
        week_start: date(2025, 7, 5),
    };

    let before = cache.generation();
    cache.invalidate_all();
    cache.put(key.clone(), dec!(400), before);
    assert!(cache.get(&key).is_none());

    cache.put(key.clone(), dec!(450), cache.generation());
    assert_eq!(cache.get(&key), Some(dec!(450)));
}

#[tokio::test]
async fn write_during_a_slow_read_is_not_cached_over() {
    let prices = Arc::new(GatedPrices::new(default_prices()));
    let cache = Arc::new(InMemoryPriceCache::default());
    let store = Arc::new(PricingPeriodStore::new(prices.clone(), cache.clone()));
    let ctx = ctx();

    let reader = {
        let store = store.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            store
                .weekly_price(&ctx, &apt("orchidea"), date(2025, 7, 5))
                .await
        })
    };
    prices.entered.notified().await;
    store
        .upsert_price(&ctx, &apt("orchidea"), date(2025, 7, 5), dec!(900), 2025)
        .await
        .expect("price written");
    prices.release.notify_one();

    let in_flight = reader.await.expect("reader finishes");
    assert_eq!(in_flight.amount, dec!(400));
    assert!(cache.is_empty());

    let next = store
        .weekly_price(&ctx, &apt("orchidea"), date(2025, 7, 5))
        .await;
    assert_eq!(next.amount, dec!(900));
    assert_eq!(next.source, PriceSource::Store);
}

#[tokio::test]
async fn mid_week_dates_resolve_to_their_saturday() {
    let harness = harness();

    let price = harness
        .service
        .weekly_price(&ctx(), &apt("glicine"), date(2025, 7, 9))
        .await;

    assert_eq!(price.week_start, date(2025, 7, 5));
    assert_eq!(price.amount, dec!(300));
}

#[tokio::test]
async fn missing_week_is_a_zero_fallback_not_an_error() {
    let harness = harness();

    let price = harness
        .service
        .weekly_price(&ctx(), &apt("orchidea"), date(2025, 9, 6))
        .await;

    assert_eq!(price.amount, dec!(0));
    assert_eq!(price.source, PriceSource::Missing);
    assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn store_failure_degrades_the_lookup() {
    let store = PricingPeriodStore::new(
        Arc::new(FailingPrices),
        Arc::new(InMemoryPriceCache::default()),
    );

    let price = store
        .weekly_price(&ctx(), &apt("orchidea"), date(2025, 7, 5))
        .await;

    assert_eq!(price.source, PriceSource::Degraded);
    assert_eq!(price.amount, dec!(0));
}

#[tokio::test]
async fn slow_store_times_out_into_a_degraded_lookup() {
    let store = PricingPeriodStore::new(
        Arc::new(SlowPrices {
            delay: Duration::from_millis(500),
        }),
        Arc::new(InMemoryPriceCache::default()),
    );
    let ctx = ctx().with_timeout(Duration::from_millis(20));

    let price = store
        .weekly_price(&ctx, &apt("orchidea"), date(2025, 7, 5))
        .await;

    assert_eq!(price.source, PriceSource::Degraded);
}

#[tokio::test]
async fn offline_lookups_skip_the_store_but_keep_cached_prices() {
    let harness = harness();
    harness
        .service
        .weekly_price(&ctx(), &apt("orchidea"), date(2025, 7, 5))
        .await;
    let offline = LookupContext::offline(today());

    let cached = harness
        .service
        .weekly_price(&offline, &apt("orchidea"), date(2025, 7, 5))
        .await;
    let uncached = harness
        .service
        .weekly_price(&offline, &apt("orchidea"), date(2025, 7, 12))
        .await;

    assert_eq!(cached.source, PriceSource::Cache);
    assert_eq!(uncached.source, PriceSource::Degraded);
    assert_eq!(harness.prices.fetch_count(), 1);
}

#[tokio::test]
async fn upsert_overwrites_and_invalidates_cached_prices() {
    let harness = harness();
    let ctx = ctx();
    harness
        .service
        .weekly_price(&ctx, &apt("orchidea"), date(2025, 7, 5))
        .await;

    let period = harness
        .service
        .upsert_price(&ctx, &apt("orchidea"), date(2025, 7, 5), dec!(420), 2025)
        .await
        .expect("price stored");

    assert_eq!(period.price, dec!(420));
    assert!(harness.cache.is_empty());
    let refreshed = harness
        .service
        .weekly_price(&ctx, &apt("orchidea"), date(2025, 7, 5))
        .await;
    assert_eq!(refreshed.amount, dec!(420));
    assert_eq!(refreshed.source, PriceSource::Store);
}

#[tokio::test]
async fn upsert_rejects_misaligned_weeks_and_negative_prices() {
    let harness = harness();

    let misaligned = harness
        .service
        .upsert_price(&ctx(), &apt("orchidea"), date(2025, 7, 7), dec!(420), 2025)
        .await;
    assert!(matches!(
        misaligned,
        Err(BookingServiceError::Pricing(PricingError::MisalignedWeekStart(_)))
    ));

    let negative = harness
        .service
        .upsert_price(&ctx(), &apt("orchidea"), date(2025, 7, 5), dec!(-1), 2025)
        .await;
    assert!(matches!(
        negative,
        Err(BookingServiceError::Pricing(PricingError::NegativePrice(_)))
    ));
    assert_eq!(harness.prices.price("orchidea", date(2025, 7, 5)), Some(dec!(400)));
}

#[tokio::test]
async fn copy_year_adjusts_and_rounds_into_matching_weeks() {
    let harness = harness();
    let request = CopyYearRequest {
        source_year: 2025,
        target_year: 2026,
        percent_adjust: dec!(10),
        rounding: RoundingMode::Nearest,
        round_to_nearest: dec!(10),
        apartment_filter: None,
    };

    let summary = harness
        .service
        .copy_year(&ctx(), &request)
        .await
        .expect("year copied");

    assert_eq!(summary.copied, 4);
    assert_eq!(summary.skipped, 0);
    assert_eq!(harness.prices.price("orchidea", date(2026, 7, 4)), Some(dec!(440)));
    assert_eq!(harness.prices.price("orchidea", date(2026, 7, 11)), Some(dec!(500)));
    assert_eq!(harness.prices.price("glicine", date(2026, 7, 11)), Some(dec!(350)));
}

#[tokio::test]
async fn copy_year_honors_the_apartment_filter() {
    let harness = harness();
    let request = CopyYearRequest {
        source_year: 2025,
        target_year: 2026,
        percent_adjust: dec!(0),
        rounding: RoundingMode::None,
        round_to_nearest: dec!(1),
        apartment_filter: Some(vec![apt("glicine")]),
    };

    let summary = harness
        .service
        .copy_year(&ctx(), &request)
        .await
        .expect("year copied");

    assert_eq!(summary.copied, 2);
    assert_eq!(harness.prices.price("orchidea", date(2026, 7, 4)), None);
    assert_eq!(harness.prices.price("glicine", date(2026, 7, 4)), Some(dec!(300)));
}

#[tokio::test]
async fn copy_year_refuses_identical_years() {
    let harness = harness();
    let request = CopyYearRequest {
        source_year: 2025,
        target_year: 2025,
        percent_adjust: dec!(5),
        rounding: RoundingMode::Up,
        round_to_nearest: dec!(5),
        apartment_filter: None,
    };

    let outcome = harness.service.copy_year(&ctx(), &request).await;

    assert!(matches!(
        outcome,
        Err(BookingServiceError::Pricing(PricingError::SameYear(2025)))
    ));
}

#[tokio::test]
async fn initialize_defaults_fills_only_missing_season_weeks() {
    let harness = harness_with(
        MemoryPrices::default().with_price("orchidea", date(2026, 8, 15), dec!(1200)),
        MemoryCalendar::default(),
        MemoryReservations::default(),
        Default::default(),
    );
    let seed = PriceTableSeed::standard();

    let written = harness
        .service
        .initialize_defaults(&ctx(), 2026, &seed)
        .await
        .expect("defaults written");

    // 22 Saturdays between June 1 and October 31 2026, two apartments, one pre-set week.
    assert_eq!(written, 43);
    assert_eq!(harness.prices.count_for_year(2026), 44);
    assert_eq!(harness.prices.price("orchidea", date(2026, 8, 15)), Some(dec!(1200)));
    assert_eq!(harness.prices.price("orchidea", date(2026, 8, 22)), Some(dec!(980)));
    assert_eq!(harness.prices.price("glicine", date(2026, 6, 6)), Some(dec!(400)));
    assert_eq!(harness.prices.price("glicine", date(2026, 5, 30)), None);

    let again = harness
        .service
        .initialize_defaults(&ctx(), 2026, &seed)
        .await
        .expect("second run succeeds");
    assert_eq!(again, 0);
}

#[tokio::test]
async fn explicit_invalidation_empties_the_cache() {
    let harness = harness();
    harness
        .service
        .weekly_price(&ctx(), &apt("glicine"), date(2025, 7, 5))
        .await;
    assert!(!harness.cache.is_empty());

    harness.service.invalidate_cache();

    assert!(harness.cache.is_empty());
}
