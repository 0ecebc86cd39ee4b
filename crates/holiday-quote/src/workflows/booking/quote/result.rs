use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::workflows::booking::domain::ApartmentId;

/// Fees and rounding rules applied on top of apartment prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tariff {
    pub linen_fee_per_person: Decimal,
    pub pet_fee_per_apartment: Decimal,
    pub tourist_tax_per_person_night: Decimal,
    pub default_cleaning_fee: Decimal,
    /// Final totals are rounded down to a multiple of this step.
    pub rounding_step: Decimal,
    pub deposit_rate: Decimal,
}

impl Default for Tariff {
    fn default() -> Self {
        Self {
            linen_fee_per_person: dec!(15),
            pet_fee_per_apartment: dec!(50),
            tourist_tax_per_person_night: dec!(1),
            default_cleaning_fee: dec!(50),
            rounding_step: dec!(50),
            deposit_rate: dec!(0.30),
        }
    }
}

impl Tariff {
    pub fn round_down(&self, total: Decimal) -> Decimal {
        if self.rounding_step <= Decimal::ZERO {
            return total;
        }
        (total / self.rounding_step).floor() * self.rounding_step
    }

    pub fn deposit_for(&self, final_total: Decimal) -> Decimal {
        (final_total * self.deposit_rate).ceil()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApartmentQuote {
    pub apartment_id: ApartmentId,
    pub name: String,
    pub billing_weeks: u32,
    /// Sum of the weekly prices of every billing week.
    pub base_price: Decimal,
    pub beds: u32,
    pub occupied_beds: u32,
    pub occupancy_percent: Decimal,
    pub occupancy_band: String,
    pub discount_percent: Decimal,
    pub final_price: Decimal,
}

/// Priced quote. Every amount is zero when the input was insufficient.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuoteResult {
    pub nights: u32,
    pub apartments: Vec<ApartmentQuote>,
    pub apartments_subtotal: Decimal,
    pub linen_fee: Decimal,
    pub pet_fee: Decimal,
    pub tourist_tax: Decimal,
    pub cleaning_fee: Decimal,
    pub extras_total: Decimal,
    pub total_before_discount: Decimal,
    /// Amount removed by rounding the total down.
    pub discount_total: Decimal,
    pub final_total: Decimal,
    pub deposit: Decimal,
    pub balance: Decimal,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl QuoteResult {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_priced(&self) -> bool {
        self.nights > 0 && !self.apartments.is_empty()
    }
}
