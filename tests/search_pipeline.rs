//! End-to-end search through the public API against a scripted provider.

use std::sync::Arc;
use std::time::Duration;

use car_arbitrage::models::{Locality, Market, PipelineStatus, SearchCriteria};
use car_arbitrage::provider::JobStatus;
use car_arbitrage::testkit::{MarketScript, ScriptedProvider};
use car_arbitrage::{
    PollPolicy, RandomIds, RetryPolicy, SearchCoordinator, SearchError, SearchSettings,
};
use serde_json::{json, Value};

fn settings() -> SearchSettings {
    SearchSettings {
        item_cap: 20,
        poll: PollPolicy {
            max_wait: Duration::from_secs(120),
            interval: Duration::from_secs(3),
        },
        retry: RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(100),
        },
        import_cost: 650,
        threshold: 300,
    }
}

fn criteria() -> SearchCriteria {
    SearchCriteria {
        brand: "Renault".into(),
        model: "Kangoo".into(),
        year_min: Some(2015),
        year_max: Some(2024),
        km_max: Some(150_000),
        price_max: Some(15_000),
        locality: Some(Locality {
            city: "Paris".into(),
            radius_km: 100,
            coordinates: None,
        }),
        ..Default::default()
    }
}

fn coordinator(provider: &Arc<ScriptedProvider>) -> SearchCoordinator {
    SearchCoordinator::new(provider.clone(), settings()).with_ids(Arc::new(RandomIds::seeded(99)))
}

fn mobile_de(id: u32, price: Value, registration: &str, mileage: &str) -> Value {
    json!({
        "title": "Renault Kangoo 1.5 dCi 95",
        "price.total.amount": price,
        "url": format!("https://suchen.mobile.de/fahrzeuge/details.html?id={id}"),
        "attributes": {
            "Mileage": mileage,
            "First Registration": registration,
            "Fuel": "Diesel"
        },
        "dealerDetails": { "address": "Hauptstraße 1, DE-10115 Berlin" }
    })
}

fn leboncoin(id: &str, price: &str, year: Value, mileage: &str) -> Value {
    json!({
        "id": id,
        "title": "Renault Kangoo Express",
        "price": price,
        "year": year,
        "mileage": mileage,
        "fuel": "Diesel",
        "url": format!("https://www.leboncoin.fr/ad/voitures/{id}")
    })
}

#[tokio::test(start_paused = true)]
async fn finds_and_ranks_cross_market_savings() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .market(
                Market::A,
                MarketScript::succeeding(vec![
                    mobile_de(1, json!(3200), "06/2019", "78,000 km"),
                    mobile_de(2, json!(4100), "02/2020", "65,000 km"),
                    mobile_de(3, json!(5700), "01/2019", "80,000 km"),
                    mobile_de(4, json!(0), "01/2019", "80,000 km"),
                ])
                .with_statuses(vec![JobStatus::Pending, JobStatus::Running]),
            )
            .market(
                Market::B,
                MarketScript::succeeding(vec![
                    leboncoin("fr1", "5 900 €", json!(2019), "82 000 km"),
                    leboncoin("fr2", "6 800 €", json!("2020"), "71 000 km"),
                ])
                .with_statuses(vec![JobStatus::Running; 5]),
            ),
    );

    let result = coordinator(&provider).search(&criteria()).await.unwrap();

    assert_eq!(result.market_a.len(), 3);
    assert_eq!(result.market_b.len(), 2);
    assert!(result.market_a.iter().chain(&result.market_b).all(|l| l.price > 0));

    // de2 pairs with fr1 (first candidate within one year and 20,000 km),
    // de3 only saves 200 before import and is dropped
    let pairs: Vec<(&str, &str, i64)> = result
        .matches
        .iter()
        .map(|m| (m.market_a_listing.id.as_str(), m.market_b_listing.id.as_str(), m.savings_net))
        .collect();
    assert_eq!(pairs, vec![("1", "fr1", 2050), ("2", "fr1", 1150)]);

    let best = &result.matches[0];
    assert_eq!(best.savings_gross, 2700);
    assert_eq!(best.import_cost, 650);
    assert_eq!(best.savings_percent, 46);
    assert_eq!(best.market_a_listing.city, "Berlin");
    assert_eq!(best.market_b_listing.city, "Paris");
}

#[tokio::test(start_paused = true)]
async fn leboncoin_request_targets_searched_city() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .market(Market::A, MarketScript::succeeding(vec![]))
            .market(Market::B, MarketScript::succeeding(vec![])),
    );

    coordinator(&provider).search(&criteria()).await.unwrap();

    let request = provider
        .requests()
        .into_iter()
        .find(|r| r.market == Market::B)
        .unwrap();
    assert!(request.target_url.contains("lat=48.85660&lng=2.35220&radius=100000"));
    assert_eq!(request.item_cap, 20);
}

#[tokio::test(start_paused = true)]
async fn empty_market_b_yields_no_matches() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .market(
                Market::A,
                MarketScript::succeeding(vec![mobile_de(1, json!(3200), "2019", "78000")]),
            )
            .market(Market::B, MarketScript::succeeding(vec![])),
    );

    let result = coordinator(&provider).search(&criteria()).await.unwrap();

    assert_eq!(result.market_a.len(), 1);
    assert!(result.market_b.is_empty());
    assert!(result.matches.is_empty());
    assert_eq!(result.reports.market_b.status, PipelineStatus::Succeeded);
    assert_eq!(result.reports.market_b.raw_count, 0);
}

#[tokio::test(start_paused = true)]
async fn timed_out_market_does_not_hold_back_the_other() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .market(
                Market::A,
                MarketScript::succeeding(vec![mobile_de(1, json!(3200), "2019", "78000")]),
            )
            .market(Market::B, MarketScript::ending_with(JobStatus::Running)),
    );

    let result = coordinator(&provider).search(&criteria()).await.unwrap();

    assert_eq!(result.market_a.len(), 1);
    assert!(result.matches.is_empty());
    assert_eq!(result.reports.market_a.status, PipelineStatus::Succeeded);
    assert_eq!(result.reports.market_b.status, PipelineStatus::TimedOut);
    assert!(result.reports.market_b.detail.is_some());
}

#[tokio::test(start_paused = true)]
async fn one_rejected_submission_degrades_that_market_only() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .market(Market::A, MarketScript::rejecting(403))
            .market(
                Market::B,
                MarketScript::succeeding(vec![leboncoin("fr1", "5900", json!(2019), "82000")]),
            ),
    );

    let result = coordinator(&provider).search(&criteria()).await.unwrap();

    assert_eq!(result.reports.market_a.status, PipelineStatus::Unavailable);
    assert_eq!(provider.submissions(Market::A), 1);
    assert_eq!(result.market_b.len(), 1);
    assert!(result.matches.is_empty());
}

#[tokio::test(start_paused = true)]
async fn transient_submission_failure_is_retried() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .market(
                Market::A,
                MarketScript::succeeding(vec![mobile_de(1, json!(3200), "2019", "78000")])
                    .with_failed_submissions(1, 429),
            )
            .market(
                Market::B,
                MarketScript::succeeding(vec![leboncoin("fr1", "5900", json!(2019), "82000")]),
            ),
    );

    let result = coordinator(&provider).search(&criteria()).await.unwrap();

    assert_eq!(provider.submissions(Market::A), 2);
    assert_eq!(result.matches.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn provider_unreachable_for_both_markets_is_an_error() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .market(Market::A, MarketScript::rejecting(503))
            .market(Market::B, MarketScript::rejecting(401)),
    );

    let err = coordinator(&provider).search(&criteria()).await.unwrap_err();

    let SearchError::ProviderUnreachable { market_a, market_b } = err;
    assert!(market_a.contains("503"));
    assert!(market_b.contains("401"));
    assert_eq!(provider.submissions(Market::A), 2);
}

#[tokio::test(start_paused = true)]
async fn result_serializes_with_public_field_names() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .market(
                Market::A,
                MarketScript::succeeding(vec![mobile_de(1, json!(3200), "2019", "78000")]),
            )
            .market(
                Market::B,
                MarketScript::succeeding(vec![leboncoin("fr1", "5900", json!(2019), "82000")]),
            ),
    );

    let result = coordinator(&provider).search(&criteria()).await.unwrap();
    let value = serde_json::to_value(&result).unwrap();

    assert!(value["marketA"].is_array());
    assert!(value["marketB"].is_array());
    let listing = &value["marketA"][0];
    for field in ["id", "title", "price", "year", "km", "fuel", "url", "city"] {
        assert!(listing.get(field).is_some(), "missing listing field {field}");
    }
    let m = &value["matches"][0];
    for field in [
        "marketAListing",
        "marketBListing",
        "savingsGross",
        "importCost",
        "savingsNet",
        "savingsPercent",
    ] {
        assert!(m.get(field).is_some(), "missing match field {field}");
    }
    assert_eq!(value["reports"]["marketB"]["status"], "succeeded");
}
