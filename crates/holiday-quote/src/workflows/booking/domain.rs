use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier wrapper for catalog apartments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApartmentId(pub String);

impl ApartmentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for ApartmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static reference data for a rentable apartment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Apartment {
    pub id: ApartmentId,
    pub name: String,
    /// Maximum number of persons.
    pub capacity: u32,
    pub beds: u32,
    pub bedrooms: u32,
    /// Catalog weekly rate, charged when no price period exists for a week.
    pub base_weekly_price: Decimal,
    #[serde(default)]
    pub cleaning_fee: Option<Decimal>,
}

/// Weekly price for one apartment, keyed by the Saturday starting the billing week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePeriod {
    pub apartment_id: ApartmentId,
    pub year: i32,
    pub week_start: NaiveDate,
    pub price: Decimal,
}

/// Closed date range during which bookings are refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateBlock {
    pub id: String,
    /// `None` applies the block to every apartment.
    #[serde(default)]
    pub apartment_id: Option<ApartmentId>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub reason: String,
    pub is_active: bool,
}

impl DateBlock {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.is_active && self.start_date <= date && date <= self.end_date
    }

    /// Global blocks apply in every context; scoped blocks only to their apartment.
    pub fn applies_to(&self, apartment: Option<&ApartmentId>) -> bool {
        match (&self.apartment_id, apartment) {
            (None, _) => true,
            (Some(scoped), Some(requested)) => scoped == requested,
            (Some(_), None) => false,
        }
    }
}

/// Per-year booking window. Only one active configuration per year is honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonConfig {
    pub year: i32,
    pub start_month: u32,
    pub start_day: u32,
    pub end_month: u32,
    pub end_day: u32,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    DepositPaid,
    PaidInFull,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::DepositPaid => "deposit_paid",
            Self::PaidInFull => "paid_in_full",
        }
    }
}

/// Existing booking over the half-open night range `[start_date, end_date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub apartment_ids: Vec<ApartmentId>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub guest_name: String,
    pub payment_status: PaymentStatus,
}

impl Reservation {
    pub fn involves(&self, apartment: &ApartmentId) -> bool {
        self.apartment_ids.iter().any(|id| id == apartment)
    }

    /// Back-to-back stays share a changeover day and do not overlap.
    pub fn overlaps(&self, checkin: NaiveDate, checkout: NaiveDate) -> bool {
        self.start_date < checkout && checkin < self.end_date
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteRequestId(pub String);

impl fmt::Display for QuoteRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contact fields collected on the last wizard step.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GuestContact {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl GuestContact {
    pub fn is_reachable(&self) -> bool {
        let filled = |value: &Option<String>| {
            value
                .as_deref()
                .map(|raw| !raw.trim().is_empty())
                .unwrap_or(false)
        };
        !self.name.trim().is_empty() && (filled(&self.email) || filled(&self.phone))
    }
}

/// Persisted snapshot of a submitted quote. Only `whatsapp_sent` changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub id: QuoteRequestId,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    pub adults: u32,
    pub children: u32,
    pub selected_apartments: Vec<ApartmentId>,
    pub has_pet: bool,
    pub linen_requested: bool,
    pub base_total: Decimal,
    pub discount_total: Decimal,
    pub extras_total: Decimal,
    pub final_total: Decimal,
    pub guest_name: String,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub whatsapp_sent: bool,
    pub created_at: DateTime<Utc>,
}
