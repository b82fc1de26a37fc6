// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stage runners wired over an in-memory broker, a scripted browser and a
//! mock HTTP origin.

mod common;

use anyhow::Result;
use async_trait::async_trait;
use common::{instant_navigator, BrowserLog, ScriptedLauncher, CHALLENGE_HTML, LISTING_HTML};
use pricewatch_runtime::acquisition::http_client::HttpClient;
use pricewatch_runtime::extract::ExtractorRegistry;
use pricewatch_runtime::model::{
    CanonicalRecord, DeadLetter, RawContent, ScrapeRequest, ScrapingMapping, Stage, StageState,
    StrategyConfig,
};
use pricewatch_runtime::pipeline::shutdown;
use pricewatch_runtime::pipeline::{
    LoadStage, MemoryBroker, MessageBroker, Outbound, Outcome, RunnerSettings, ScrapeStage,
    StageHandler, StageRunner, TransformStage,
};
use pricewatch_runtime::store::{RecordStore, SqliteRecordStore};
use pricewatch_runtime::strategy::{MappingRegistry, StrategySelector, StrategySet};
use pricewatch_runtime::telemetry::MemoryTelemetrySink;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REQUESTS: &str = "scraping-requests";
const RAW: &str = "scraping-data";
const RECORDS: &str = "product-scraping-data";
const DEAD: &str = "dead-letters";

fn settings(input: &str, group: &str) -> RunnerSettings {
    RunnerSettings {
        input_topic: input.to_string(),
        group: group.to_string(),
        dead_letter_topic: DEAD.to_string(),
        idle_poll: Duration::from_millis(5),
    }
}

fn scrape_runner(
    mappings: Vec<ScrapingMapping>,
    launcher: Arc<ScriptedLauncher>,
    broker: Arc<MemoryBroker>,
    telemetry: Arc<MemoryTelemetrySink>,
) -> StageRunner<ScrapeStage> {
    let navigator = Arc::new(instant_navigator(launcher));
    let http = HttpClient::new(Duration::from_secs(5)).with_retry_base(Duration::ZERO);
    let selector = StrategySelector::new(
        Arc::new(MappingRegistry::new(mappings)),
        Arc::new(StrategySet::new(http, navigator)),
    );
    StageRunner::new(
        ScrapeStage::new(Arc::new(selector), RAW),
        broker,
        telemetry,
        settings(REQUESTS, "site-scraper"),
    )
}

fn transform_runner(
    broker: Arc<MemoryBroker>,
    telemetry: Arc<MemoryTelemetrySink>,
) -> StageRunner<TransformStage> {
    StageRunner::new(
        TransformStage::new(Arc::new(ExtractorRegistry::builtin()), RECORDS),
        broker,
        telemetry,
        settings(RAW, "site-transformer"),
    )
}

fn request(site: &str, address: &str) -> String {
    serde_json::to_string(&ScrapeRequest::new(site, address, Duration::from_secs(3600))).unwrap()
}

fn dead_letters(broker: &MemoryBroker) -> Vec<DeadLetter> {
    broker
        .messages(DEAD)
        .iter()
        .map(|m| serde_json::from_str(m).unwrap())
        .collect()
}

/// Every message yields `Started` followed by exactly one terminal state.
fn assert_one_terminal_per_start(telemetry: &MemoryTelemetrySink) {
    let events = telemetry.events();
    assert_eq!(events.len() % 2, 0, "unpaired events: {events:?}");
    for pair in events.chunks(2) {
        assert_eq!(pair[0].state, StageState::Started);
        assert!(pair[1].state.is_terminal());
        assert_eq!(pair[0].site, pair[1].site);
        assert_eq!(pair[0].stage, pair[1].stage);
    }
}

#[tokio::test]
async fn test_http_failure_falls_back_to_browser() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/scooters"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mapping = ScrapingMapping {
        site_name: "Payngo".to_string(),
        strategies: vec![
            StrategyConfig::DirectHttp {
                url: Some(format!("{}/scooters", server.uri())),
                selector: Some("ol.products".to_string()),
            },
            StrategyConfig::BrowserDriven,
        ],
    };
    let launcher = Arc::new(ScriptedLauncher::new(&[], LISTING_HTML));
    let broker = Arc::new(MemoryBroker::new());
    let telemetry = Arc::new(MemoryTelemetrySink::new());
    let runner = scrape_runner(vec![mapping], launcher.clone(), broker.clone(), telemetry.clone());

    broker
        .publish(REQUESTS, &request("Payngo", "https://www.payngo.co.il/scooters"))
        .await
        .unwrap();
    let outcome = runner.process_next().await.unwrap().unwrap();
    assert_eq!(
        outcome,
        Outcome::Succeeded {
            site: "Payngo".to_string(),
            published: 1
        }
    );

    let raw: Vec<RawContent> = broker
        .messages(RAW)
        .iter()
        .map(|m| serde_json::from_str(m).unwrap())
        .collect();
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].strategy_used, "BrowserDriven");
    assert!(raw[0].html.contains("Xiaomi Electric Scooter 4"));

    // The HTTP failure was absorbed by the fallback.
    assert!(broker.messages(DEAD).is_empty());
    assert_eq!(BrowserLog::count(&launcher.log.closes), 1);
    assert_eq!(
        telemetry.states(),
        vec![
            ("Payngo".to_string(), StageState::Started),
            ("Payngo".to_string(), StageState::Success)
        ]
    );
}

#[tokio::test]
async fn test_unknown_site_uses_default_extractor() {
    let broker = Arc::new(MemoryBroker::new());
    let telemetry = Arc::new(MemoryTelemetrySink::new());
    let runner = transform_runner(broker.clone(), telemetry.clone());

    broker
        .publish(RAW, r#"{"Site":"UnknownSite","Html":"<p>x</p>"}"#)
        .await
        .unwrap();
    let outcome = runner.process_next().await.unwrap().unwrap();
    assert!(matches!(outcome, Outcome::Succeeded { published: 1, .. }));

    let records = broker.messages(RECORDS);
    assert_eq!(records.len(), 1);
    let record: CanonicalRecord = serde_json::from_str(&records[0]).unwrap();
    assert_eq!(record.description, "<p>x</p>");
    assert_eq!(record.site_name, "UnknownSite");
    assert_eq!(record.category, "Unknown");
    assert_one_terminal_per_start(&telemetry);
}

#[tokio::test]
async fn test_persistent_challenge_is_dead_lettered() {
    let mapping = ScrapingMapping {
        site_name: "Payngo".to_string(),
        strategies: vec![StrategyConfig::BrowserDriven],
    };
    let launcher = Arc::new(ScriptedLauncher::new(&[], CHALLENGE_HTML));
    let broker = Arc::new(MemoryBroker::new());
    let telemetry = Arc::new(MemoryTelemetrySink::new());
    let runner = scrape_runner(vec![mapping], launcher.clone(), broker.clone(), telemetry.clone());

    let payload = request("Payngo", "https://www.payngo.co.il/scooters");
    broker.publish(REQUESTS, &payload).await.unwrap();
    let outcome = runner.process_next().await.unwrap().unwrap();
    assert!(matches!(outcome, Outcome::DeadLettered { .. }));

    let letters = dead_letters(&broker);
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].original_message, payload);
    assert_eq!(letters[0].service_name, "SiteScraper");
    assert!(letters[0].error.contains("navigation"), "{}", letters[0].error);
    assert!(letters[0].error.contains("3 attempts"), "{}", letters[0].error);
    assert!(broker.messages(RAW).is_empty());

    // Both the original and the restarted session were released.
    assert_eq!(BrowserLog::count(&launcher.log.launches), 2);
    assert_eq!(BrowserLog::count(&launcher.log.closes), 2);
    assert_eq!(
        telemetry.states(),
        vec![
            ("Payngo".to_string(), StageState::Started),
            ("Payngo".to_string(), StageState::Failed)
        ]
    );
}

#[tokio::test]
async fn test_missing_mapping_is_dead_lettered() {
    let launcher = Arc::new(ScriptedLauncher::new(&[], LISTING_HTML));
    let broker = Arc::new(MemoryBroker::new());
    let telemetry = Arc::new(MemoryTelemetrySink::new());
    let runner = scrape_runner(Vec::new(), launcher.clone(), broker.clone(), telemetry.clone());

    broker
        .publish(REQUESTS, &request("Nowhere", "https://nowhere.example/"))
        .await
        .unwrap();
    runner.process_next().await.unwrap();

    let letters = dead_letters(&broker);
    assert_eq!(letters.len(), 1);
    assert!(letters[0].error.contains("no scraping mapping"));
    assert_eq!(BrowserLog::count(&launcher.log.launches), 0);
}

#[tokio::test]
async fn test_malformed_message_is_dead_lettered() {
    let broker = Arc::new(MemoryBroker::new());
    let telemetry = Arc::new(MemoryTelemetrySink::new());
    let runner = transform_runner(broker.clone(), telemetry.clone());

    broker.publish(RAW, r#"{"Html":"<p>orphan</p>"}"#).await.unwrap();
    broker.publish(RAW, "not json at all").await.unwrap();
    runner.process_next().await.unwrap();
    runner.process_next().await.unwrap();
    assert!(runner.process_next().await.unwrap().is_none());

    let letters = dead_letters(&broker);
    assert_eq!(letters.len(), 2);
    assert!(letters.iter().all(|l| l.service_name == "SiteTransformer"));
    assert!(letters[0].error.contains("malformed message"));
    assert_eq!(letters[1].original_message, "not json at all");

    assert_one_terminal_per_start(&telemetry);
    assert!(telemetry
        .events()
        .iter()
        .all(|e| e.site == "unknown" && e.stage == Stage::Transformer));
}

struct Panicking;

#[async_trait]
impl StageHandler for Panicking {
    type Input = CanonicalRecord;

    fn stage(&self) -> Stage {
        Stage::Loader
    }

    fn service_name(&self) -> &str {
        "Panicking"
    }

    fn site_of(&self, input: &CanonicalRecord) -> String {
        input.site_name.clone()
    }

    async fn handle(&self, _input: CanonicalRecord) -> Result<Vec<Outbound>> {
        panic!("store exploded");
    }
}

fn record_json(site: &str, description: &str, price: &str) -> String {
    serde_json::json!({
        "Category": "Scooters-Bicycles",
        "Price": price,
        "SerialNumber": "SC-1",
        "SiteName": site,
        "Description": description,
        "SubCategory": "Electric-Scooter",
        "DateTime": "2026-01-05T10:00:00Z"
    })
    .to_string()
}

#[tokio::test]
async fn test_panicking_handler_is_dead_lettered() {
    let broker = Arc::new(MemoryBroker::new());
    let telemetry = Arc::new(MemoryTelemetrySink::new());
    let runner = StageRunner::new(
        Panicking,
        broker.clone(),
        telemetry.clone(),
        settings(RECORDS, "data-loader"),
    );

    broker
        .publish(RECORDS, &record_json("Payngo", "Segway", "899"))
        .await
        .unwrap();
    let outcome = runner.process_next().await.unwrap().unwrap();
    match outcome {
        Outcome::DeadLettered { site, error } => {
            assert_eq!(site, "Payngo");
            assert!(error.contains("store exploded"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_one_terminal_per_start(&telemetry);
}

#[tokio::test]
async fn test_loader_is_idempotent() {
    let broker = Arc::new(MemoryBroker::new());
    let telemetry = Arc::new(MemoryTelemetrySink::new());
    let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
    let runner = StageRunner::new(
        LoadStage::new(store.clone()),
        broker.clone(),
        telemetry.clone(),
        settings(RECORDS, "data-loader"),
    );

    let payload = record_json("Payngo", "Segway Ninebot E2", "899");
    broker.publish(RECORDS, &payload).await.unwrap();
    broker.publish(RECORDS, &payload).await.unwrap();
    broker
        .publish(RECORDS, &record_json("Payngo", "Segway Ninebot E2", "849"))
        .await
        .unwrap();
    while runner.process_next().await.unwrap().is_some() {}

    assert_eq!(store.count().unwrap(), 2);
    assert!(broker.messages(DEAD).is_empty());
    assert_eq!(telemetry.events().len(), 6);
    assert_one_terminal_per_start(&telemetry);
}

#[tokio::test]
async fn test_end_to_end_http_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/scooters"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING_HTML))
        .mount(&server)
        .await;

    let mapping = ScrapingMapping {
        site_name: "Payngo".to_string(),
        strategies: vec![
            StrategyConfig::DirectHttp {
                url: Some(format!("{}/scooters", server.uri())),
                selector: Some("ol.products".to_string()),
            },
            StrategyConfig::BrowserDriven,
        ],
    };
    let launcher = Arc::new(ScriptedLauncher::new(&[], CHALLENGE_HTML));
    let broker = Arc::new(MemoryBroker::new());
    let telemetry = Arc::new(MemoryTelemetrySink::new());
    let store = Arc::new(SqliteRecordStore::in_memory().unwrap());

    let scraper = scrape_runner(vec![mapping], launcher.clone(), broker.clone(), telemetry.clone());
    let transformer = transform_runner(broker.clone(), telemetry.clone());
    let loader = StageRunner::new(
        LoadStage::new(store.clone()),
        broker.clone(),
        telemetry.clone(),
        settings(RECORDS, "data-loader"),
    );

    broker
        .publish(REQUESTS, &request("Payngo", "https://www.payngo.co.il/scooters"))
        .await
        .unwrap();
    scraper.process_next().await.unwrap().unwrap();
    transformer.process_next().await.unwrap().unwrap();
    while loader.process_next().await.unwrap().is_some() {}

    // The HTTP strategy succeeded, so no browser was launched.
    assert_eq!(BrowserLog::count(&launcher.log.launches), 0);
    assert!(broker.messages(DEAD).is_empty());

    let stored = store.list(Some("Payngo"), 10).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].description, "Segway Ninebot E2");
    assert_eq!(stored[0].price, "899");
    assert_eq!(stored[0].serial_number, "SC-200");
    assert_eq!(stored[1].description, "Xiaomi Electric Scooter 4");
    assert_eq!(stored[1].category, "Scooters-Bicycles");

    // Scraper, transformer, and two loader messages.
    assert_eq!(telemetry.events().len(), 8);
    assert_one_terminal_per_start(&telemetry);
    let stages: Vec<Stage> = telemetry.events().iter().map(|e| e.stage).collect();
    assert_eq!(stages[0], Stage::Scraper);
    assert_eq!(stages[2], Stage::Transformer);
    assert_eq!(stages[4], Stage::Loader);
}

#[tokio::test]
async fn test_oversized_output_is_dead_lettered_and_loop_continues() {
    let broker = Arc::new(MemoryBroker::new().with_max_message_bytes(256));
    let telemetry = Arc::new(MemoryTelemetrySink::new());
    let runner = transform_runner(broker.clone(), telemetry.clone());

    // Fits on the input topic, but the record built from it does not.
    let oversized = format!(r#"{{"Site":"UnknownSite","Html":"{}"}}"#, "x".repeat(200));
    assert!(oversized.len() <= 256);
    broker.publish(RAW, &oversized).await.unwrap();
    broker
        .publish(RAW, r#"{"Site":"UnknownSite","Html":"<p>x</p>"}"#)
        .await
        .unwrap();

    let first = runner.process_next().await.unwrap().unwrap();
    match first {
        Outcome::DeadLettered { site, error } => {
            assert_eq!(site, "UnknownSite");
            assert!(error.contains("byte limit"), "{error}");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    let second = runner.process_next().await.unwrap().unwrap();
    assert!(matches!(second, Outcome::Succeeded { published: 1, .. }));
    assert!(runner.process_next().await.unwrap().is_none());

    // The dead letter was cut down to fit, keeping a prefix of the input.
    let raw_letters = broker.messages(DEAD);
    assert_eq!(raw_letters.len(), 1);
    assert!(raw_letters[0].len() <= 256);
    let letter: DeadLetter = serde_json::from_str(&raw_letters[0]).unwrap();
    assert!(oversized.starts_with(&letter.original_message));
    assert_eq!(letter.service_name, "SiteTransformer");

    assert_eq!(broker.messages(RECORDS).len(), 1);
    assert_one_terminal_per_start(&telemetry);
}

#[tokio::test]
async fn test_run_survives_failures_and_stops_on_shutdown() {
    let broker = Arc::new(MemoryBroker::new());
    let telemetry = Arc::new(MemoryTelemetrySink::new());
    let runner = transform_runner(broker.clone(), telemetry.clone());

    broker.publish(RAW, "{not json").await.unwrap();
    broker
        .publish(RAW, r#"{"Site":"UnknownSite","Html":"<p>x</p>"}"#)
        .await
        .unwrap();

    let (trigger, shutdown) = shutdown::channel();
    let task = tokio::spawn(async move { runner.run(shutdown).await });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while broker.messages(DEAD).len() < 1 || broker.messages(RECORDS).len() < 1 {
        assert!(tokio::time::Instant::now() < deadline, "runner stalled");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    trigger.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("runner did not stop after shutdown")
        .unwrap();
    assert!(result.is_ok());

    assert_eq!(broker.messages(DEAD).len(), 1);
    assert_eq!(broker.messages(RECORDS).len(), 1);
    assert_eq!(telemetry.events().len(), 4);
    assert_one_terminal_per_start(&telemetry);
}
