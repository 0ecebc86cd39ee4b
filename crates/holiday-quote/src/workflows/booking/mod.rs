//! Quote pricing and availability for a small portfolio of holiday apartments.
//!
//! Weekly prices, season windows, date blocks and reservations live behind the
//! repository traits in [`store`]; [`service::BookingQuoteService`] ties them
//! together for the HTTP layer and the multi-step [`wizard`].

pub mod availability;
pub mod calendar;
pub mod domain;
pub mod pricing;
pub mod quote;
pub mod router;
pub mod service;
pub mod stay;
pub mod store;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use availability::{
    AvailabilityChecker, AvailabilityOutcome, AvailabilityReport, ReservationConflict, StayWindow,
};
pub use calendar::{CalendarDay, CalendarRules, DateBlockInfo, SeasonWindow};
pub use domain::{
    Apartment, ApartmentId, DateBlock, GuestContact, PaymentStatus, PricePeriod, QuoteRequest,
    QuoteRequestId, Reservation, ReservationId, SeasonConfig,
};
pub use pricing::{
    CopyYearRequest, CopyYearSummary, PriceSource, PriceTableSeed, PricingError,
    PricingPeriodStore, RoundingMode, WeeklyPrice,
};
pub use quote::{
    ApartmentQuote, ChildGuest, OccupancyBand, OccupantSplit, QuoteCalculator, QuoteParams,
    QuoteResult, Tariff,
};
pub use router::booking_router;
pub use service::{BookingQuoteService, BookingServiceError, BookingStores};
pub use stay::{StayValidationError, TwoWeeksRequirement};
pub use store::{
    ApartmentRepository, CalendarRepository, Connectivity, InMemoryPriceCache, LookupContext,
    PriceCache, PriceRepository, QuoteRequestRepository, RepositoryError, ReservationRepository,
};
pub use wizard::{
    FunnelObserver, NoopFunnel, QuoteWizard, TaskOutcome, WizardError, WizardStep, WizardTask,
};
