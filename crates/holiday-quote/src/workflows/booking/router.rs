use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AppError;

use super::availability::AvailabilityOutcome;
use super::calendar::is_valid_check_in_out_day;
use super::domain::{ApartmentId, GuestContact, QuoteRequestId};
use super::pricing::{CopyYearRequest, PriceTableSeed};
use super::quote::{QuoteParams, QuoteResult};
use super::service::{BookingQuoteService, BookingServiceError};
use super::stay::{nights_between, TwoWeeksRequirement};

/// Router exposing quoting, availability, calendar and price administration.
pub fn booking_router(service: Arc<BookingQuoteService>) -> Router {
    Router::new()
        .route("/api/v1/quotes/calculate", post(calculate_handler))
        .route("/api/v1/availability", post(availability_handler))
        .route(
            "/api/v1/availability/detailed",
            post(detailed_availability_handler),
        )
        .route("/api/v1/calendar", get(calendar_range_handler))
        .route("/api/v1/calendar/:date", get(date_info_handler))
        .route("/api/v1/stays/validate", post(stay_rules_handler))
        .route("/api/v1/quote-requests", post(submit_quote_request_handler))
        .route(
            "/api/v1/quote-requests/:quote_request_id",
            get(quote_request_handler),
        )
        .route(
            "/api/v1/quote-requests/:quote_request_id/sent",
            post(mark_sent_handler),
        )
        .route("/api/v1/admin/prices", put(upsert_price_handler))
        .route("/api/v1/admin/prices/copy", post(copy_year_handler))
        .route(
            "/api/v1/admin/prices/initialize",
            post(initialize_prices_handler),
        )
        .route(
            "/api/v1/admin/cache/invalidate",
            post(invalidate_cache_handler),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct AvailabilityRequest {
    pub apartment_ids: Vec<ApartmentId>,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
}

#[derive(Debug, Serialize)]
pub(crate) struct AvailabilityResponse {
    pub all_available: bool,
    pub results: BTreeMap<ApartmentId, AvailabilityOutcome>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DetailedAvailabilityRequest {
    pub apartment_id: ApartmentId,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApartmentQuery {
    #[serde(default)]
    pub apartment_id: Option<ApartmentId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CalendarRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    #[serde(default)]
    pub apartment_id: Option<ApartmentId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StayRulesRequest {
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
}

#[derive(Debug, Serialize)]
pub(crate) struct StayRulesResponse {
    pub nights: u32,
    pub check_in_day_allowed: bool,
    pub check_out_day_allowed: bool,
    pub two_weeks_minimum: TwoWeeksRequirement,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuoteRequestSubmission {
    pub params: QuoteParams,
    pub guest: GuestContact,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuoteRequestCreated {
    pub quote_request_id: QuoteRequestId,
    pub quote: QuoteResult,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PriceUpdate {
    pub apartment_id: ApartmentId,
    pub week_start: NaiveDate,
    pub price: Decimal,
    #[serde(default)]
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InitializePricesRequest {
    pub year: i32,
    #[serde(default)]
    pub seed: Option<PriceTableSeed>,
}

pub(crate) async fn calculate_handler(
    State(service): State<Arc<BookingQuoteService>>,
    Json(params): Json<QuoteParams>,
) -> Response {
    let ctx = service.context_for_today();
    let result = service.calculate_quote(&ctx, &params).await;
    (StatusCode::OK, Json(result)).into_response()
}

pub(crate) async fn availability_handler(
    State(service): State<Arc<BookingQuoteService>>,
    Json(request): Json<AvailabilityRequest>,
) -> Result<Response, AppError> {
    ensure_ordered(request.checkin, request.checkout)?;

    let ctx = service.context_for_today();
    let results = service
        .check_many_availability(&ctx, &request.apartment_ids, request.checkin, request.checkout)
        .await;
    let body = AvailabilityResponse {
        all_available: results.values().all(AvailabilityOutcome::is_available),
        results,
    };
    Ok((StatusCode::OK, Json(body)).into_response())
}

pub(crate) async fn detailed_availability_handler(
    State(service): State<Arc<BookingQuoteService>>,
    Json(request): Json<DetailedAvailabilityRequest>,
) -> Result<Response, AppError> {
    ensure_ordered(request.checkin, request.checkout)?;

    let ctx = service.context_for_today();
    let report = service
        .check_availability_detailed(
            &ctx,
            &request.apartment_id,
            request.checkin,
            request.checkout,
        )
        .await;
    Ok((StatusCode::OK, Json(report)).into_response())
}

pub(crate) async fn date_info_handler(
    State(service): State<Arc<BookingQuoteService>>,
    Path(date): Path<NaiveDate>,
    Query(query): Query<ApartmentQuery>,
) -> Response {
    let ctx = service.context_for_today();
    let info = service
        .date_block_info(&ctx, date, query.apartment_id.as_ref())
        .await;
    (StatusCode::OK, Json(info)).into_response()
}

pub(crate) async fn calendar_range_handler(
    State(service): State<Arc<BookingQuoteService>>,
    Query(query): Query<CalendarRangeQuery>,
) -> Result<Response, AppError> {
    if query.to < query.from {
        return Err(validation("`to` must not be before `from`"));
    }
    if (query.to - query.from).num_days() > 366 {
        return Err(validation("calendar range is limited to one year"));
    }

    let ctx = service.context_for_today();
    let days = service
        .calendar_range(&ctx, query.from, query.to, query.apartment_id.as_ref())
        .await;
    Ok((StatusCode::OK, Json(days)).into_response())
}

pub(crate) async fn stay_rules_handler(
    State(service): State<Arc<BookingQuoteService>>,
    Json(request): Json<StayRulesRequest>,
) -> Response {
    let StayRulesRequest { checkin, checkout } = request;
    let ctx = service.context_for_today();
    let verdict = service.check_stay_dates(&ctx, checkin, checkout).await;

    let body = StayRulesResponse {
        nights: nights_between(checkin, checkout),
        check_in_day_allowed: is_valid_check_in_out_day(checkin),
        check_out_day_allowed: is_valid_check_in_out_day(checkout),
        two_weeks_minimum: BookingQuoteService::requires_two_weeks_minimum(checkin, checkout),
        valid: verdict.is_ok(),
        error: verdict.err().map(|err| err.to_string()),
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// Prices the submitted parameters again so the stored totals never come from the client.
pub(crate) async fn submit_quote_request_handler(
    State(service): State<Arc<BookingQuoteService>>,
    Json(submission): Json<QuoteRequestSubmission>,
) -> Result<Response, AppError> {
    let ctx = service.context_for_today();
    let (quote_request_id, quote) = service
        .submit_quote_request(&ctx, &submission.params, &submission.guest)
        .await?;

    let body = QuoteRequestCreated {
        quote_request_id,
        quote,
    };
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

pub(crate) async fn quote_request_handler(
    State(service): State<Arc<BookingQuoteService>>,
    Path(quote_request_id): Path<String>,
) -> Result<Response, AppError> {
    let ctx = service.context_for_today();
    let request = service
        .quote_request(&ctx, &QuoteRequestId(quote_request_id))
        .await?;
    Ok((StatusCode::OK, Json(request)).into_response())
}

pub(crate) async fn mark_sent_handler(
    State(service): State<Arc<BookingQuoteService>>,
    Path(quote_request_id): Path<String>,
) -> Result<Response, AppError> {
    let ctx = service.context_for_today();
    service
        .mark_quote_request_sent(&ctx, &QuoteRequestId(quote_request_id))
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn upsert_price_handler(
    State(service): State<Arc<BookingQuoteService>>,
    Json(update): Json<PriceUpdate>,
) -> Result<Response, AppError> {
    let ctx = service.context_for_today();
    let year = update.year.unwrap_or_else(|| update.week_start.year());
    let period = service
        .upsert_price(
            &ctx,
            &update.apartment_id,
            update.week_start,
            update.price,
            year,
        )
        .await?;
    Ok((StatusCode::OK, Json(period)).into_response())
}

pub(crate) async fn copy_year_handler(
    State(service): State<Arc<BookingQuoteService>>,
    Json(request): Json<CopyYearRequest>,
) -> Result<Response, AppError> {
    let ctx = service.context_for_today();
    let summary = service.copy_year(&ctx, &request).await?;
    Ok((StatusCode::OK, Json(summary)).into_response())
}

pub(crate) async fn initialize_prices_handler(
    State(service): State<Arc<BookingQuoteService>>,
    Json(request): Json<InitializePricesRequest>,
) -> Result<Response, AppError> {
    let ctx = service.context_for_today();
    let seed = request.seed.unwrap_or_default();
    let written = service
        .initialize_defaults(&ctx, request.year, &seed)
        .await?;

    let payload = json!({
        "year": request.year,
        "seed_version": seed.version,
        "written": written,
    });
    Ok((StatusCode::OK, Json(payload)).into_response())
}

pub(crate) async fn invalidate_cache_handler(
    State(service): State<Arc<BookingQuoteService>>,
) -> Response {
    service.invalidate_cache();
    StatusCode::NO_CONTENT.into_response()
}

fn ensure_ordered(checkin: NaiveDate, checkout: NaiveDate) -> Result<(), AppError> {
    if checkout <= checkin {
        return Err(validation("check-out must be after check-in"));
    }
    Ok(())
}

fn validation(message: &str) -> AppError {
    AppError::Booking(BookingServiceError::Validation(message.to_string()))
}
