use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error};

use super::calendar::is_valid_check_in_out_day;
use super::domain::{ApartmentId, Reservation, ReservationId};
use super::store::{guarded, LookupContext, RepositoryError, ReservationRepository};

pub const DEFAULT_SUGGESTION_HORIZON_DAYS: u32 = 56;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationConflict {
    pub reservation_id: ReservationId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StayWindow {
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
}

/// Per-apartment result. A failed lookup is reported apart from a real conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AvailabilityOutcome {
    Available,
    Unavailable {
        conflicts: Vec<ReservationConflict>,
    },
    LookupFailed {
        reason: String,
    },
}

impl AvailabilityOutcome {
    /// Lookup failures count as unavailable.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }

    pub fn is_lookup_failure(&self) -> bool {
        matches!(self, Self::LookupFailed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityReport {
    pub apartment_id: ApartmentId,
    pub available: bool,
    pub conflicts: Vec<ReservationConflict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<StayWindow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup_error: Option<String>,
}

/// Reservations of `apartment` overlapping `[checkin, checkout)`.
pub fn find_conflicts(
    reservations: &[Reservation],
    apartment: &ApartmentId,
    checkin: NaiveDate,
    checkout: NaiveDate,
) -> Vec<ReservationConflict> {
    if checkout <= checkin {
        return Vec::new();
    }

    reservations
        .iter()
        .filter(|reservation| reservation.involves(apartment))
        .filter(|reservation| reservation.overlaps(checkin, checkout))
        .map(|reservation| ReservationConflict {
            reservation_id: reservation.id.clone(),
            start_date: reservation.start_date,
            end_date: reservation.end_date,
        })
        .collect()
}

/// Nearest conflict-free window of the same length, starting no earlier than
/// `earliest`, with both ends on an allowed changeover day. Later windows win ties.
pub fn suggest_window(
    reservations: &[Reservation],
    apartment: &ApartmentId,
    checkin: NaiveDate,
    checkout: NaiveDate,
    earliest: NaiveDate,
    horizon_days: u32,
) -> Option<StayWindow> {
    let length = checkout - checkin;
    if length <= Duration::zero() {
        return None;
    }

    (1..=i64::from(horizon_days))
        .flat_map(|offset| [offset, -offset])
        .map(|offset| checkin + Duration::days(offset))
        .filter(|candidate| *candidate >= earliest)
        .map(|candidate| StayWindow {
            checkin: candidate,
            checkout: candidate + length,
        })
        .filter(|window| {
            is_valid_check_in_out_day(window.checkin) && is_valid_check_in_out_day(window.checkout)
        })
        .find(|window| {
            find_conflicts(reservations, apartment, window.checkin, window.checkout).is_empty()
        })
}

pub struct AvailabilityChecker {
    repository: Arc<dyn ReservationRepository>,
    suggestion_horizon_days: u32,
}

impl AvailabilityChecker {
    pub fn new(repository: Arc<dyn ReservationRepository>) -> Self {
        Self {
            repository,
            suggestion_horizon_days: DEFAULT_SUGGESTION_HORIZON_DAYS,
        }
    }

    pub fn with_suggestion_horizon(mut self, days: u32) -> Self {
        self.suggestion_horizon_days = days;
        self
    }

    pub async fn is_available(
        &self,
        ctx: &LookupContext,
        apartment_id: &ApartmentId,
        checkin: NaiveDate,
        checkout: NaiveDate,
    ) -> bool {
        self.check(ctx, apartment_id, checkin, checkout)
            .await
            .is_available()
    }

    pub async fn check_detailed(
        &self,
        ctx: &LookupContext,
        apartment_id: &ApartmentId,
        checkin: NaiveDate,
        checkout: NaiveDate,
    ) -> AvailabilityReport {
        let reservations = match self.load(ctx, apartment_id).await {
            Ok(reservations) => reservations,
            Err(err) => {
                return AvailabilityReport {
                    apartment_id: apartment_id.clone(),
                    available: false,
                    conflicts: Vec::new(),
                    suggestion: None,
                    lookup_error: Some(err.to_string()),
                }
            }
        };

        let conflicts = find_conflicts(&reservations, apartment_id, checkin, checkout);
        let suggestion = if conflicts.is_empty() {
            None
        } else {
            suggest_window(
                &reservations,
                apartment_id,
                checkin,
                checkout,
                ctx.today,
                self.suggestion_horizon_days,
            )
        };

        AvailabilityReport {
            apartment_id: apartment_id.clone(),
            available: conflicts.is_empty(),
            conflicts,
            suggestion,
            lookup_error: None,
        }
    }

    /// Checks every apartment concurrently and waits for all of them.
    pub async fn check_many(
        &self,
        ctx: &LookupContext,
        apartment_ids: &[ApartmentId],
        checkin: NaiveDate,
        checkout: NaiveDate,
    ) -> BTreeMap<ApartmentId, AvailabilityOutcome> {
        let checks = apartment_ids.iter().map(|apartment_id| async move {
            let outcome = self.check(ctx, apartment_id, checkin, checkout).await;
            (apartment_id.clone(), outcome)
        });

        join_all(checks).await.into_iter().collect()
    }

    async fn check(
        &self,
        ctx: &LookupContext,
        apartment_id: &ApartmentId,
        checkin: NaiveDate,
        checkout: NaiveDate,
    ) -> AvailabilityOutcome {
        match self.load(ctx, apartment_id).await {
            Ok(reservations) => {
                let conflicts = find_conflicts(&reservations, apartment_id, checkin, checkout);
                if conflicts.is_empty() {
                    AvailabilityOutcome::Available
                } else {
                    debug!(apartment_id = %apartment_id, conflicts = conflicts.len(), "apartment booked");
                    AvailabilityOutcome::Unavailable { conflicts }
                }
            }
            Err(err) => AvailabilityOutcome::LookupFailed {
                reason: err.to_string(),
            },
        }
    }

    async fn load(
        &self,
        ctx: &LookupContext,
        apartment_id: &ApartmentId,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        guarded(
            ctx,
            "reservation lookup",
            self.repository.for_apartment(apartment_id),
        )
        .await
        .map_err(|err| {
            error!(apartment_id = %apartment_id, error = %err, "availability lookup failed");
            err
        })
    }
}
