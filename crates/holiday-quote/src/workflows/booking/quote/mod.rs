//! Quote calculator: turns a prospective stay into a priced, rounded total.

pub mod discount;
mod params;
mod result;

pub use discount::{discount_percent, occupancy_ratio, OccupancyBand};
pub use params::{allocate_beds, ChildGuest, OccupantSplit, QuoteParams};
pub use result::{ApartmentQuote, QuoteResult, Tariff};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::domain::{Apartment, ApartmentId};
use super::pricing::{billing_weeks, PriceSource, PricingPeriodStore};
use super::stay::nights_between;
use super::store::{guarded, ApartmentRepository, LookupContext};

/// An apartment with the summed price of its billing weeks.
struct PricedApartment {
    apartment: Apartment,
    base_price: Decimal,
    billing_weeks: u32,
}

pub struct QuoteCalculator {
    catalog: Arc<dyn ApartmentRepository>,
    /// Last catalog entry seen per apartment, served when the catalog is unreachable.
    known: RwLock<HashMap<ApartmentId, Apartment>>,
    pricing: Arc<PricingPeriodStore>,
    tariff: Tariff,
}

impl QuoteCalculator {
    pub fn new(
        catalog: Arc<dyn ApartmentRepository>,
        pricing: Arc<PricingPeriodStore>,
        tariff: Tariff,
    ) -> Self {
        Self {
            catalog,
            known: RwLock::new(HashMap::new()),
            pricing,
            tariff,
        }
    }

    pub fn tariff(&self) -> &Tariff {
        &self.tariff
    }

    /// Never fails: insufficient input yields a zero quote and store failures
    /// degrade to catalog prices with a warning on the result.
    pub async fn calculate(&self, ctx: &LookupContext, params: &QuoteParams) -> QuoteResult {
        let params = &params.with_distinct_apartments();
        let (Some(checkin), Some(checkout)) = (params.checkin, params.checkout) else {
            return QuoteResult::zero();
        };
        if params.apartments.is_empty() {
            return QuoteResult::zero();
        }
        let nights = nights_between(checkin, checkout);
        if nights == 0 {
            return QuoteResult::zero();
        }

        let weeks = billing_weeks(checkin, nights);
        let lookups = params
            .apartments
            .iter()
            .map(|apartment_id| self.price_apartment(ctx, apartment_id, &weeks));

        let mut warnings = Vec::new();
        let mut priced = Vec::with_capacity(params.apartments.len());
        for (outcome, notes) in join_all(lookups).await {
            warnings.extend(notes);
            priced.extend(outcome);
        }

        if priced.is_empty() {
            let mut result = QuoteResult::zero();
            result.warnings = warnings;
            return result;
        }

        let catalog: Vec<Apartment> = priced.iter().map(|entry| entry.apartment.clone()).collect();
        let beds = allocate_beds(params, &catalog);

        let apartments: Vec<ApartmentQuote> = priced
            .iter()
            .map(|entry| {
                let occupied = beds.get(&entry.apartment.id).copied().unwrap_or(0);
                quote_apartment(entry, occupied)
            })
            .collect();

        let apartments_subtotal: Decimal = apartments.iter().map(|quote| quote.final_price).sum();

        let linen_fee = if params.linen_requested {
            self.tariff.linen_fee_per_person * Decimal::from(params.linen_guests())
        } else {
            Decimal::ZERO
        };
        let pet_fee = self.tariff.pet_fee_per_apartment * Decimal::from(params.pets_charged());
        let tourist_tax = self.tariff.tourist_tax_per_person_night
            * Decimal::from(nights)
            * Decimal::from(params.tourist_tax_guests());
        let cleaning_fee: Decimal = priced
            .iter()
            .map(|entry| {
                entry
                    .apartment
                    .cleaning_fee
                    .unwrap_or(self.tariff.default_cleaning_fee)
            })
            .sum();

        let extras_total = linen_fee + pet_fee + tourist_tax + cleaning_fee;
        let total_before_discount = apartments_subtotal + extras_total;
        let final_total = self.tariff.round_down(total_before_discount);
        let deposit = self.tariff.deposit_for(final_total);

        debug!(
            nights,
            apartments = apartments.len(),
            %total_before_discount,
            %final_total,
            "quote calculated"
        );

        QuoteResult {
            nights,
            apartments,
            apartments_subtotal,
            linen_fee,
            pet_fee,
            tourist_tax,
            cleaning_fee,
            extras_total,
            total_before_discount,
            discount_total: total_before_discount - final_total,
            final_total,
            deposit,
            balance: final_total - deposit,
            warnings,
        }
    }

    async fn price_apartment(
        &self,
        ctx: &LookupContext,
        apartment_id: &ApartmentId,
        weeks: &[NaiveDate],
    ) -> (Option<PricedApartment>, Vec<String>) {
        let mut warnings = Vec::new();
        let apartment = match guarded(ctx, "apartment lookup", self.catalog.fetch(apartment_id)).await
        {
            Ok(Some(apartment)) => {
                self.remember(&apartment);
                apartment
            }
            Ok(None) => {
                warn!(apartment_id = %apartment_id, "apartment missing from catalog");
                return (
                    None,
                    vec![format!("apartment {apartment_id} is not in the catalog and was not priced")],
                );
            }
            Err(err) => match self.recall(apartment_id) {
                Some(apartment) => {
                    warn!(apartment_id = %apartment_id, error = %err, "catalog lookup degraded, using last known details");
                    warnings.push(format!(
                        "{}: catalog unreachable ({err}), last known details used",
                        apartment.name
                    ));
                    apartment
                }
                None => {
                    warn!(apartment_id = %apartment_id, error = %err, "catalog lookup degraded");
                    return (
                        None,
                        vec![format!("apartment {apartment_id} could not be loaded: {err}")],
                    );
                }
            },
        };

        let prices = join_all(
            weeks
                .iter()
                .map(|week_start| self.pricing.weekly_price(ctx, apartment_id, *week_start)),
        )
        .await;

        let mut base_price = Decimal::ZERO;
        for price in prices {
            if price.source.is_fallback() {
                let cause = match price.source {
                    PriceSource::Degraded => "price store unavailable",
                    _ => "no weekly price configured",
                };
                warnings.push(format!(
                    "{} week of {}: {cause}, catalog rate applied",
                    apartment.name, price.week_start
                ));
                base_price += apartment.base_weekly_price;
            } else {
                base_price += price.amount;
            }
        }

        let priced = PricedApartment {
            billing_weeks: weeks.len() as u32,
            apartment,
            base_price,
        };
        (Some(priced), warnings)
    }

    fn remember(&self, apartment: &Apartment) {
        if let Ok(mut known) = self.known.write() {
            known.insert(apartment.id.clone(), apartment.clone());
        }
    }

    fn recall(&self, apartment_id: &ApartmentId) -> Option<Apartment> {
        self.known
            .read()
            .ok()
            .and_then(|known| known.get(apartment_id).cloned())
    }
}

fn quote_apartment(entry: &PricedApartment, occupied: u32) -> ApartmentQuote {
    let beds = entry.apartment.beds;
    let ratio = occupancy_ratio(occupied, beds);
    let band = OccupancyBand::for_ratio(ratio);
    let discount = band.discount_percent();
    let final_price = (entry.base_price * (Decimal::ONE_HUNDRED - discount) / Decimal::ONE_HUNDRED)
        .round_dp(2);

    ApartmentQuote {
        apartment_id: entry.apartment.id.clone(),
        name: entry.apartment.name.clone(),
        billing_weeks: entry.billing_weeks,
        base_price: entry.base_price,
        beds,
        occupied_beds: occupied,
        occupancy_percent: (ratio * Decimal::ONE_HUNDRED).round_dp(0),
        occupancy_band: band.label().to_string(),
        discount_percent: discount,
        final_price,
    }
}
