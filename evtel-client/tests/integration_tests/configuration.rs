// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use evtel::{Config, Error};
use evtel_client::Client;
use hyper::StatusCode;

use crate::TestCollector;

#[test]
fn test_configured_target_delivers() {
    let collector = TestCollector::start(StatusCode::OK);
    let mut config = Config::builder();
    config
        .set_target_url(collector.url())
        .set_headers("x-api-key=secret|x-team=core".to_string())
        .set_rate_classes("status=500=1000".to_string())
        .set_total_per_second(0.0);
    let client = Client::from_config(&config.build()).unwrap();

    client.write("request", [("status", "500")]);
    // matched by no class with a positive rate
    client.write("request", [("status", "200")]);
    client.close().unwrap();

    let received = collector.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].headers["x-team"], "core");
    assert_eq!(received[0].events.len(), 1);
    assert_eq!(received[0].events[0]["data"]["status"], "500");
}

#[test]
fn test_invalid_rate_classes_register_nothing() {
    let mut config = Config::builder();
    config
        .set_target_url("http://127.0.0.1:9/v1/events".to_string())
        .set_rate_classes("status=500".to_string());
    let client = Client::new();

    assert_eq!(
        client.configure(&config.build()).unwrap_err(),
        Error::InvalidRateClass("status=500".to_string())
    );
    assert!(client.targets().is_empty());
}
