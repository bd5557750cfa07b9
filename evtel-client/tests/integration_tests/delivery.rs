// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use evtel::log::{test_logger, Level};
use evtel_client::{Client, TargetBuilder, TargetState};
use evtel_sampling::Criteria;
use hyper::StatusCode;

use crate::TestCollector;

fn target_for(collector: &TestCollector) -> TargetBuilder {
    let mut builder = TargetBuilder::new(collector.url());
    builder
        .add_header("x-api-key", "secret")
        .set_flush_period(Duration::from_secs(3600))
        .set_sampler_seed(11)
        .add_rate_class(1_000_000.0, Criteria::new());
    builder
}

#[test]
fn test_batch_on_the_wire() {
    let collector = TestCollector::start(StatusCode::OK);
    let client = Client::new();
    client.add_hook(evtel::build_info_hook!());
    client.add_target(target_for(&collector)).unwrap();

    client.write("request", [("path", "/"), ("method", "GET")]);
    client.write("request", [("path", "/about"), ("method", "POST")]);
    client.close().unwrap();

    let received = collector.received();
    assert_eq!(received.len(), 1);
    let batch = &received[0];
    assert_eq!(batch.path, "/v1/events");
    assert_eq!(batch.headers["content-type"], "application/json");
    assert_eq!(batch.headers["content-encoding"], "gzip");
    assert_eq!(batch.headers["x-api-key"], "secret");

    assert_eq!(batch.events.len(), 2);
    for event in &batch.events {
        assert_eq!(event["samplerate"], 1);
        assert_eq!(event["data"]["type"], "request");
        assert_eq!(event["data"]["packageName"], env!("CARGO_PKG_NAME"));
        assert!(event["data"]["durationMS"].is_u64());

        let time = event["time"].as_str().unwrap();
        chrono::DateTime::parse_from_rfc3339(time).unwrap();
    }
    assert_eq!(batch.events[0]["data"]["path"], "/");
    assert_eq!(batch.events[1]["data"]["method"], "POST");
}

#[test]
fn test_force_flush_delivers_pending_events() {
    let collector = TestCollector::start(StatusCode::ACCEPTED);
    let client = Client::new();
    let target = client.add_target(target_for(&collector)).unwrap();

    client.write("job", [("queue", "mail")]);
    target.force_flush();
    // the flush is asynchronous, wait for the collector to see it
    for _ in 0..500 {
        if !collector.received().is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(collector.received().len(), 1);
    assert_eq!(target.pending_events(), 0);

    client.close().unwrap();
    assert_eq!(target.state(), TargetState::Stopped);
    assert_eq!(collector.received().len(), 1);
}

#[test]
fn test_sampled_events_carry_weight() {
    let collector = TestCollector::start(StatusCode::OK);
    let client = Client::new();
    let mut builder = TargetBuilder::new(collector.url());
    builder
        .set_flush_period(Duration::from_secs(3600))
        .set_sampler_seed(5)
        .add_rate_class(0.01, Criteria::new());
    client.add_target(builder).unwrap();

    for _ in 0..1000 {
        client.write("request", [("path", "/")]);
    }
    client.close().unwrap();

    let events: Vec<_> = collector
        .received()
        .into_iter()
        .flat_map(|batch| batch.events)
        .collect();
    assert!(!events.is_empty());
    assert!(events.len() < 1000);
    assert!(events
        .iter()
        .all(|event| event["samplerate"].as_u64().unwrap() >= 1));
}

#[test]
fn test_delivery_failure_is_logged() {
    let _guard = test_logger::activate_test_logger();
    let collector = TestCollector::start(StatusCode::INTERNAL_SERVER_ERROR);
    let client = Client::new();
    client.add_target(target_for(&collector)).unwrap();

    client.write("request", [("path", "/")]);
    client.close().unwrap();

    assert_eq!(collector.received().len(), 1);
    let logs = test_logger::take_test_logs().unwrap();
    let errors: Vec<_> = logs
        .iter()
        .filter(|(lvl, _)| *lvl == Level::Error)
        .map(|(_, msg)| msg.as_str())
        .collect();
    assert_eq!(errors.len(), 1, "{logs:?}");
    assert!(errors[0].contains("returned status 500"), "{}", errors[0]);
    assert!(errors[0].contains("collector says no"), "{}", errors[0]);
}

#[test]
fn test_unreachable_collector_is_logged() {
    let _guard = test_logger::activate_test_logger();
    let client = Client::new();
    let mut builder = TargetBuilder::new("http://127.0.0.1:9/v1/events");
    builder.add_rate_class(1_000_000.0, Criteria::new());
    client.add_target(builder).unwrap();

    client.write("request", [("path", "/")]);
    client.close().unwrap();

    let logs = test_logger::take_test_logs().unwrap();
    assert!(logs
        .iter()
        .any(|(lvl, msg)| *lvl == Level::Error && msg.contains("network error")));
}
