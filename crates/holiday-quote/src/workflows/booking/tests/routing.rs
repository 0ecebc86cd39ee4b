use super::common::*;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

fn json_request(method: Method, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request builds")
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

fn quote_payload() -> Value {
    json!({
        "apartments": ["orchidea"],
        "checkin": "2025-07-05",
        "checkout": "2025-07-12",
        "adults": 4
    })
}

#[tokio::test]
async fn calculate_route_returns_the_priced_quote() {
    let harness = harness();

    let response = router_for(&harness)
        .oneshot(json_request(
            Method::POST,
            "/api/v1/quotes/calculate",
            quote_payload(),
        ))
        .await
        .expect("router responds");

    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nights"], 7);
    assert_eq!(body["final_total"].as_f64(), Some(400.0));
    assert_eq!(body["deposit"].as_f64(), Some(120.0));
    assert_eq!(body["balance"].as_f64(), Some(280.0));
    assert_eq!(body["apartments"][0]["occupancy_band"], "medium");
}

#[tokio::test]
async fn availability_route_reports_each_apartment() {
    let harness = harness();

    let response = router_for(&harness)
        .oneshot(json_request(
            Method::POST,
            "/api/v1/availability",
            json!({
                "apartment_ids": ["orchidea", "glicine"],
                "checkin": "2025-07-19",
                "checkout": "2025-07-26"
            }),
        ))
        .await
        .expect("router responds");

    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["all_available"], false);
    assert_eq!(body["results"]["orchidea"]["status"], "available");
    assert_eq!(body["results"]["glicine"]["status"], "unavailable");
    assert_eq!(
        body["results"]["glicine"]["conflicts"][0]["reservation_id"],
        "res-1"
    );
}

#[tokio::test]
async fn availability_route_rejects_inverted_ranges() {
    let harness = harness();

    let response = router_for(&harness)
        .oneshot(json_request(
            Method::POST,
            "/api/v1/availability/detailed",
            json!({
                "apartment_id": "glicine",
                "checkin": "2025-07-26",
                "checkout": "2025-07-19"
            }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn detailed_availability_route_includes_a_suggestion() {
    let harness = harness();

    let response = router_for(&harness)
        .oneshot(json_request(
            Method::POST,
            "/api/v1/availability/detailed",
            json!({
                "apartment_id": "glicine",
                "checkin": "2025-07-19",
                "checkout": "2025-07-26"
            }),
        ))
        .await
        .expect("router responds");

    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], false);
    assert_eq!(body["suggestion"]["checkin"], "2025-07-26");
    assert_eq!(body["suggestion"]["checkout"], "2025-08-02");
}

#[tokio::test]
async fn calendar_routes_expose_blocks_and_ranges() {
    let harness = harness();

    let response = router_for(&harness)
        .oneshot(empty_request(Method::GET, "/api/v1/calendar/2025-05-20"))
        .await
        .expect("router responds");
    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_blocked"], true);
    assert_eq!(body["reason"], "outside season");

    let response = router_for(&harness)
        .oneshot(empty_request(
            Method::GET,
            "/api/v1/calendar?from=2025-06-01&to=2025-06-07",
        ))
        .await
        .expect("router responds");
    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);
    let days = body.as_array().expect("array of days");
    assert_eq!(days.len(), 7);
    assert_eq!(days[0]["check_in_allowed"], true);
    assert_eq!(days[2]["check_in_allowed"], false);
}

#[tokio::test]
async fn stay_rules_route_explains_the_verdict() {
    let harness = harness();

    let response = router_for(&harness)
        .oneshot(json_request(
            Method::POST,
            "/api/v1/stays/validate",
            json!({ "checkin": "2026-08-08", "checkout": "2026-08-18" }),
        ))
        .await
        .expect("router responds");

    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nights"], 10);
    assert_eq!(body["check_in_day_allowed"], true);
    assert_eq!(body["check_out_day_allowed"], false);
    assert_eq!(body["two_weeks_minimum"]["required"], true);
    assert_eq!(body["valid"], false);
}

#[tokio::test]
async fn stay_rules_route_rejects_winter_dates() {
    let harness = harness();

    let response = router_for(&harness)
        .oneshot(json_request(
            Method::POST,
            "/api/v1/stays/validate",
            json!({ "checkin": "2026-01-03", "checkout": "2026-01-10" }),
        ))
        .await
        .expect("router responds");

    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nights"], 7);
    assert_eq!(body["check_in_day_allowed"], true);
    assert_eq!(body["valid"], false);
    let error = body["error"].as_str().expect("error message");
    assert!(error.contains("outside season"), "{error}");
}

#[tokio::test]
async fn quote_requests_are_created_fetched_and_marked_sent() {
    let harness = harness();
    let router = router_for(&harness);

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/quote-requests",
            json!({
                "params": quote_payload(),
                "guest": { "name": "Marco Verdi", "phone": "+39 333 000 0000" }
            }),
        ))
        .await
        .expect("router responds");
    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["quote"]["final_total"].as_f64(), Some(400.0));
    let id = body["quote_request_id"]
        .as_str()
        .expect("id is a string")
        .to_string();

    let response = router
        .clone()
        .oneshot(empty_request(
            Method::POST,
            &format!("/api/v1/quote-requests/{id}/sent"),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = router
        .oneshot(empty_request(
            Method::GET,
            &format!("/api/v1/quote-requests/{id}"),
        ))
        .await
        .expect("router responds");
    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["whatsapp_sent"], true);
    assert_eq!(body["guest_name"], "Marco Verdi");
    assert_eq!(harness.quote_requests.stored().len(), 1);
}

#[tokio::test]
async fn quote_request_without_contact_is_unprocessable() {
    let harness = harness();

    let response = router_for(&harness)
        .oneshot(json_request(
            Method::POST,
            "/api/v1/quote-requests",
            json!({
                "params": quote_payload(),
                "guest": { "name": "Marco Verdi" }
            }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(harness.quote_requests.stored().is_empty());
}

#[tokio::test]
async fn quote_request_with_broken_stay_rules_is_unprocessable() {
    let harness = harness();

    // Wednesday to Friday in a free apartment.
    let response = router_for(&harness)
        .oneshot(json_request(
            Method::POST,
            "/api/v1/quote-requests",
            json!({
                "params": {
                    "apartments": ["orchidea"],
                    "checkin": "2025-07-09",
                    "checkout": "2025-07-11",
                    "adults": 2
                },
                "guest": { "name": "Marco Verdi", "phone": "+39 333 000 0000" }
            }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(harness.quote_requests.stored().is_empty());
}

#[tokio::test]
async fn quote_request_for_a_booked_apartment_conflicts() {
    let harness = harness();

    let response = router_for(&harness)
        .oneshot(json_request(
            Method::POST,
            "/api/v1/quote-requests",
            json!({
                "params": {
                    "apartments": ["orchidea", "glicine"],
                    "checkin": "2025-07-12",
                    "checkout": "2025-07-19",
                    "adults": 4
                },
                "guest": { "name": "Marco Verdi", "email": "marco@example.org" }
            }),
        ))
        .await
        .expect("router responds");

    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let error = body["error"].as_str().expect("error message");
    assert!(error.contains("glicine"), "{error}");
    assert!(!error.contains("orchidea"), "{error}");
    assert!(harness.quote_requests.stored().is_empty());
}

#[tokio::test]
async fn marking_an_unknown_quote_request_is_not_found() {
    let harness = harness();

    let response = router_for(&harness)
        .oneshot(empty_request(
            Method::POST,
            "/api/v1/quote-requests/missing/sent",
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_price_routes_update_the_store() {
    let harness = harness();
    let router = router_for(&harness);

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/admin/prices",
            json!({ "apartment_id": "orchidea", "week_start": "2025-07-07", "price": 420 }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/admin/prices",
            json!({ "apartment_id": "orchidea", "week_start": "2025-07-05", "price": 420 }),
        ))
        .await
        .expect("router responds");
    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["year"], 2025);
    assert_eq!(harness.prices.price("orchidea", date(2025, 7, 5)), Some(dec!(420)));

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/admin/prices/copy",
            json!({
                "source_year": 2025,
                "target_year": 2026,
                "percent_adjust": 10,
                "rounding": "nearest",
                "round_to_nearest": 10
            }),
        ))
        .await
        .expect("router responds");
    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["copied"], 4);
    assert_eq!(harness.prices.price("orchidea", date(2026, 7, 4)), Some(dec!(460)));

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/admin/prices/initialize",
            json!({ "year": 2027 }),
        ))
        .await
        .expect("router responds");
    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["seed_version"], 1);
    assert!(body["written"].as_u64().is_some_and(|written| written > 0));

    let response = router
        .oneshot(empty_request(Method::POST, "/api/v1/admin/cache/invalidate"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(harness.cache.is_empty());
}
