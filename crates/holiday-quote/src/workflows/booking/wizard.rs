//! Seven-step quote wizard.
//!
//! Picking dates starts a calendar check. Availability and pricing are only
//! recomputed when entering the apartments and summary steps. Each of these
//! hands back a [`WizardTask`] tagged with a [`RequestToken`]; the caller runs
//! it and feeds the outcome to [`QuoteWizard::apply`], which drops results
//! whose inputs changed or that a newer task of the same kind superseded.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::availability::AvailabilityOutcome;
use super::domain::{ApartmentId, GuestContact, QuoteRequestId};
use super::quote::{ChildGuest, OccupantSplit, QuoteParams, QuoteResult};
use super::service::{join_ids, BookingQuoteService, BookingServiceError};
use super::stay::{validate_stay, StayValidationError};
use super::store::LookupContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Guests,
    Dates,
    Apartments,
    Pets,
    Linen,
    Summary,
    Contact,
}

impl WizardStep {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::Guests,
            Self::Dates,
            Self::Apartments,
            Self::Pets,
            Self::Linen,
            Self::Summary,
            Self::Contact,
        ]
    }

    /// One-based position in the wizard.
    pub const fn number(self) -> u8 {
        match self {
            Self::Guests => 1,
            Self::Dates => 2,
            Self::Apartments => 3,
            Self::Pets => 4,
            Self::Linen => 5,
            Self::Summary => 6,
            Self::Contact => 7,
        }
    }

    /// Clamps out-of-range numbers to the first or last step.
    pub fn from_number(number: u8) -> Self {
        let index = usize::from(number.clamp(1, 7)) - 1;
        Self::ordered()[index]
    }

    pub fn next(self) -> Self {
        Self::from_number(self.number().saturating_add(1))
    }

    pub fn prev(self) -> Self {
        Self::from_number(self.number().saturating_sub(1))
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Guests => "Guests",
            Self::Dates => "Dates",
            Self::Apartments => "Apartments",
            Self::Pets => "Pets",
            Self::Linen => "Linen",
            Self::Summary => "Summary",
            Self::Contact => "Contact",
        }
    }
}

/// Current wizard selections, also sent with funnel notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WizardSelection {
    pub adults: u32,
    pub children: Vec<ChildGuest>,
    pub checkin: Option<NaiveDate>,
    pub checkout: Option<NaiveDate>,
    pub apartments: Vec<ApartmentId>,
    pub has_pet: bool,
    pub pet_assignment: Option<BTreeMap<ApartmentId, bool>>,
    pub linen_requested: bool,
    pub occupancy: Option<BTreeMap<ApartmentId, OccupantSplit>>,
}

impl Default for WizardSelection {
    fn default() -> Self {
        Self {
            adults: 1,
            children: Vec::new(),
            checkin: None,
            checkout: None,
            apartments: Vec::new(),
            has_pet: false,
            pet_assignment: None,
            linen_requested: false,
            occupancy: None,
        }
    }
}

impl WizardSelection {
    pub fn quote_params(&self) -> QuoteParams {
        QuoteParams {
            apartments: self.apartments.clone(),
            checkin: self.checkin,
            checkout: self.checkout,
            adults: self.adults,
            children: self.children.clone(),
            has_pet: self.has_pet,
            pet_assignment: self.pet_assignment.clone(),
            linen_requested: self.linen_requested,
            occupancy: self.occupancy.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WizardSnapshot {
    pub step: WizardStep,
    pub selection: WizardSelection,
}

/// Analytics hook notified on every forward transition.
pub trait FunnelObserver: Send + Sync {
    fn step_entered(&self, snapshot: &WizardSnapshot);
}

pub struct NoopFunnel;

impl FunnelObserver for NoopFunnel {
    fn step_entered(&self, _snapshot: &WizardSnapshot) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RequestToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
    Dates,
    Availability,
    Quote,
}

/// Hands out monotonically increasing tokens and remembers the live one per kind.
#[derive(Debug, Default)]
struct RequestGate {
    issued: u64,
    dates: Option<u64>,
    availability: Option<u64>,
    quote: Option<u64>,
}

impl RequestGate {
    fn issue(&mut self, kind: TaskKind) -> RequestToken {
        self.issued += 1;
        *self.slot(kind) = Some(self.issued);
        RequestToken(self.issued)
    }

    /// Forgets the live task of `kind`; its result will be discarded.
    fn cancel(&mut self, kind: TaskKind) {
        *self.slot(kind) = None;
    }

    fn accept(&mut self, kind: TaskKind, token: RequestToken) -> bool {
        let slot = self.slot(kind);
        if *slot == Some(token.0) {
            *slot = None;
            true
        } else {
            false
        }
    }

    fn slot(&mut self, kind: TaskKind) -> &mut Option<u64> {
        match kind {
            TaskKind::Dates => &mut self.dates,
            TaskKind::Availability => &mut self.availability,
            TaskKind::Quote => &mut self.quote,
        }
    }
}

/// Work the caller must run before the wizard can show the new step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardTask {
    CheckDates {
        token: RequestToken,
        checkin: NaiveDate,
        checkout: NaiveDate,
    },
    CheckAvailability {
        token: RequestToken,
        apartments: Vec<ApartmentId>,
        checkin: NaiveDate,
        checkout: NaiveDate,
    },
    CalculateQuote {
        token: RequestToken,
        params: QuoteParams,
    },
}

impl WizardTask {
    pub async fn run(self, service: &BookingQuoteService, ctx: &LookupContext) -> TaskOutcome {
        match self {
            WizardTask::CheckDates {
                token,
                checkin,
                checkout,
            } => TaskOutcome::Dates {
                token,
                verdict: service.check_stay_dates(ctx, checkin, checkout).await,
            },
            WizardTask::CheckAvailability {
                token,
                apartments,
                checkin,
                checkout,
            } => TaskOutcome::Availability {
                token,
                results: service
                    .check_many_availability(ctx, &apartments, checkin, checkout)
                    .await,
            },
            WizardTask::CalculateQuote { token, params } => TaskOutcome::Quote {
                token,
                result: service.calculate_quote(ctx, &params).await,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Dates {
        token: RequestToken,
        verdict: Result<u32, StayValidationError>,
    },
    Availability {
        token: RequestToken,
        results: BTreeMap<ApartmentId, AvailabilityOutcome>,
    },
    Quote {
        token: RequestToken,
        result: QuoteResult,
    },
}

/// Step-local errors shown to the guest.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Stay(#[from] StayValidationError),
    #[error("apartments unavailable for the selected dates: {}", join_ids(.apartments))]
    AvailabilityConflict { apartments: Vec<ApartmentId> },
    #[error("the quote has not been calculated yet")]
    MissingQuote,
    #[error("please enter your name and an e-mail address or phone number")]
    MissingContact,
    #[error(transparent)]
    Persistence(#[from] BookingServiceError),
}

pub struct QuoteWizard {
    step: WizardStep,
    selection: WizardSelection,
    catalog: Vec<ApartmentId>,
    dates_verdict: Option<Result<u32, StayValidationError>>,
    availability: BTreeMap<ApartmentId, AvailabilityOutcome>,
    quote: Option<QuoteResult>,
    gate: RequestGate,
    funnel: Arc<dyn FunnelObserver>,
}

impl QuoteWizard {
    /// `catalog` lists the apartments offered on the apartments step.
    pub fn new(catalog: Vec<ApartmentId>, funnel: Arc<dyn FunnelObserver>) -> Self {
        Self {
            step: WizardStep::Guests,
            selection: WizardSelection::default(),
            catalog,
            dates_verdict: None,
            availability: BTreeMap::new(),
            quote: None,
            gate: RequestGate::default(),
            funnel,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn selection(&self) -> &WizardSelection {
        &self.selection
    }

    pub fn availability(&self) -> &BTreeMap<ApartmentId, AvailabilityOutcome> {
        &self.availability
    }

    pub fn quote(&self) -> Option<&QuoteResult> {
        self.quote.as_ref()
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        WizardSnapshot {
            step: self.step,
            selection: self.selection.clone(),
        }
    }

    pub fn set_guests(&mut self, adults: u32, children: Vec<ChildGuest>) {
        self.selection.adults = adults;
        self.selection.children = children;
        self.quote_inputs_changed();
    }

    /// Stores the dates and returns the calendar check the dates step waits for.
    /// Availability loaded for earlier dates is dropped.
    #[must_use]
    pub fn set_dates(&mut self, checkin: NaiveDate, checkout: NaiveDate) -> WizardTask {
        self.selection.checkin = Some(checkin);
        self.selection.checkout = Some(checkout);
        self.dates_verdict = None;
        self.availability.clear();
        self.gate.cancel(TaskKind::Availability);
        self.quote_inputs_changed();

        WizardTask::CheckDates {
            token: self.gate.issue(TaskKind::Dates),
            checkin,
            checkout,
        }
    }

    pub fn set_apartments(&mut self, apartments: Vec<ApartmentId>) {
        self.selection.apartments = apartments;
        self.quote_inputs_changed();
    }

    pub fn set_occupancy(&mut self, occupancy: Option<BTreeMap<ApartmentId, OccupantSplit>>) {
        self.selection.occupancy = occupancy;
        self.quote_inputs_changed();
    }

    pub fn set_pet(&mut self, has_pet: bool, assignment: Option<BTreeMap<ApartmentId, bool>>) {
        self.selection.has_pet = has_pet;
        self.selection.pet_assignment = assignment;
        self.quote_inputs_changed();
    }

    pub fn set_linen(&mut self, requested: bool) {
        self.selection.linen_requested = requested;
        self.quote_inputs_changed();
    }

    /// Validates the current step and moves forward, clamping at the contact step.
    pub fn next(&mut self) -> Result<Option<WizardTask>, WizardError> {
        self.validate_step()?;

        let target = self.step.next();
        if target == self.step {
            return Ok(None);
        }
        self.step = target;
        self.funnel.step_entered(&self.snapshot());

        Ok(self.task_for_step())
    }

    pub fn prev(&mut self) {
        self.step = self.step.prev();
    }

    pub fn reset(&mut self) {
        self.step = WizardStep::Guests;
        self.selection = WizardSelection::default();
        self.dates_verdict = None;
        self.availability.clear();
        self.gate.cancel(TaskKind::Dates);
        self.gate.cancel(TaskKind::Availability);
        self.quote_inputs_changed();
    }

    /// Commits a finished task. Returns `false` when the result is stale.
    pub fn apply(&mut self, outcome: TaskOutcome) -> bool {
        match outcome {
            TaskOutcome::Dates { token, verdict } => {
                if !self.gate.accept(TaskKind::Dates, token) {
                    debug!(?token, "discarding stale calendar check");
                    return false;
                }
                self.dates_verdict = Some(verdict);
                true
            }
            TaskOutcome::Availability { token, results } => {
                if !self.gate.accept(TaskKind::Availability, token) {
                    debug!(?token, "discarding stale availability result");
                    return false;
                }
                self.availability = results;
                true
            }
            TaskOutcome::Quote { token, result } => {
                if !self.gate.accept(TaskKind::Quote, token) {
                    debug!(?token, "discarding stale quote result");
                    return false;
                }
                self.quote = Some(result);
                true
            }
        }
    }

    /// Persists the computed quote with the guest's contact details.
    pub async fn submit(
        &self,
        service: &BookingQuoteService,
        ctx: &LookupContext,
        contact: &GuestContact,
    ) -> Result<QuoteRequestId, WizardError> {
        let quote = self
            .quote
            .as_ref()
            .filter(|quote| quote.is_priced())
            .ok_or(WizardError::MissingQuote)?;
        if !contact.is_reachable() {
            return Err(WizardError::MissingContact);
        }

        let params = self.selection.quote_params();
        Ok(service
            .save_quote_request(ctx, &params, quote, contact)
            .await?)
    }

    fn quote_inputs_changed(&mut self) {
        self.quote = None;
        self.gate.cancel(TaskKind::Quote);
    }

    fn validate_step(&self) -> Result<(), WizardError> {
        match self.step {
            WizardStep::Guests => {
                if self.selection.adults == 0 {
                    return Err(WizardError::Validation(
                        "at least one adult is required".to_string(),
                    ));
                }
            }
            WizardStep::Dates => {
                let (Some(checkin), Some(checkout)) =
                    (self.selection.checkin, self.selection.checkout)
                else {
                    return Err(WizardError::Validation(
                        "select check-in and check-out dates".to_string(),
                    ));
                };
                validate_stay(checkin, checkout)?;
                match &self.dates_verdict {
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(WizardError::Stay(err.clone())),
                    None => {
                        return Err(WizardError::Validation(
                            "still checking the calendar for the selected dates".to_string(),
                        ))
                    }
                }
            }
            WizardStep::Apartments => {
                if self.selection.apartments.is_empty() {
                    return Err(WizardError::Validation(
                        "select at least one apartment".to_string(),
                    ));
                }
                if let Some(unknown) = self
                    .selection
                    .apartments
                    .iter()
                    .find(|id| !self.catalog.contains(id))
                {
                    return Err(WizardError::Validation(format!(
                        "apartment {unknown} is not offered"
                    )));
                }
                let pending: Vec<ApartmentId> = self
                    .selection
                    .apartments
                    .iter()
                    .filter(|id| !self.availability.contains_key(*id))
                    .cloned()
                    .collect();
                if !pending.is_empty() {
                    return Err(WizardError::Validation(format!(
                        "availability is still loading for: {}",
                        join_ids(&pending)
                    )));
                }
                let unavailable: Vec<ApartmentId> = self
                    .selection
                    .apartments
                    .iter()
                    .filter(|id| {
                        self.availability
                            .get(*id)
                            .is_some_and(|outcome| !outcome.is_available())
                    })
                    .cloned()
                    .collect();
                if !unavailable.is_empty() {
                    return Err(WizardError::AvailabilityConflict {
                        apartments: unavailable,
                    });
                }
            }
            WizardStep::Pets | WizardStep::Linen | WizardStep::Summary | WizardStep::Contact => {}
        }
        Ok(())
    }

    fn task_for_step(&mut self) -> Option<WizardTask> {
        match self.step {
            WizardStep::Apartments => {
                let (checkin, checkout) = (self.selection.checkin?, self.selection.checkout?);
                Some(WizardTask::CheckAvailability {
                    token: self.gate.issue(TaskKind::Availability),
                    apartments: self.catalog.clone(),
                    checkin,
                    checkout,
                })
            }
            WizardStep::Summary => Some(WizardTask::CalculateQuote {
                token: self.gate.issue(TaskKind::Quote),
                params: self.selection.quote_params(),
            }),
            _ => None,
        }
    }
}
