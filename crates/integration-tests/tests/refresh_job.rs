//! The refresh job against the HTTP-visible state.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use nimbus_integration_tests::{TestContext, current_weather_body};
use nimbus_server::jobs::RefreshOutcome;

#[tokio::test]
async fn test_refresh_updates_locations_and_warms_cache() {
    let ctx = TestContext::new().await;
    let token = ctx.login_as("alice").await;

    for city in ["Paris", "Atlantis", "Lima"] {
        let resp = ctx
            .request(Method::POST, "/locations", Some(json!({"city": city})), Some(&token))
            .await;
        assert_eq!(resp.status, StatusCode::CREATED);
    }

    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Paris"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather_body("Paris", 18.5)))
        .expect(1)
        .mount(&ctx.upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Atlantis"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&ctx.upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Lima"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather_body("Lima", 21.0)))
        .expect(1)
        .mount(&ctx.upstream)
        .await;

    let outcome = ctx.state.refresh_job().run_once().await.unwrap();
    let RefreshOutcome::Completed(summary) = outcome else {
        panic!("refresh should not be skipped");
    };
    assert_eq!(summary.total, 3);
    assert_eq!(summary.refreshed, 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].city.as_str(), "Atlantis");

    let listed = ctx.request(Method::GET, "/locations", None, Some(&token)).await;
    let locations = listed.body.as_array().unwrap();
    assert_eq!(locations[0]["weather"], current_weather_body("Paris", 18.5));
    assert!(locations[0]["weather_updated_at"].is_string());
    assert!(locations[1]["weather"].is_null());
    assert_eq!(locations[2]["weather"]["name"], "Lima");

    // Served from the entry the job wrote; the Paris mock allows one call
    let cached = ctx.request(Method::GET, "/weather/paris", None, None).await;
    assert_eq!(cached.status, StatusCode::OK);
    assert_eq!(cached.body["name"], "Paris");
}

#[tokio::test]
async fn test_refresh_with_no_locations() {
    let ctx = TestContext::new().await;

    let outcome = ctx.state.refresh_job().run_once().await.unwrap();
    assert_eq!(
        outcome,
        RefreshOutcome::Completed(nimbus_server::jobs::RunSummary::default())
    );
}
