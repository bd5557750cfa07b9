// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sends a burst of events to the collector configured through the environment.
//!
//! ```bash
//! EVTEL_TARGET_URL=http://localhost:8080/v1/events \
//! EVTEL_RATE_CLASSES="status=500=10" \
//! EVTEL_LOG_LEVEL=debug \
//!     cargo run -p evtel-client --example send_events
//! ```

use std::time::Duration;

use evtel_client::Client;

fn main() {
    let config = evtel::Config::builder().build();
    let client = match Client::from_config(&config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    if client.targets().is_empty() {
        eprintln!("EVTEL_TARGET_URL is not set, events are only run through the hooks");
    }
    client.add_hook(evtel::build_info_hook!());
    client.add_hook(evtel::hooks::hook_rusage);
    client.add_hook(evtel::hooks::hook_process_metrics);

    for i in 0..1000u32 {
        let status = if i % 50 == 0 { "500" } else { "200" };
        client.write("request", [("status", status), ("path", "/")]);
        std::thread::sleep(Duration::from_millis(2));
    }
    client.log([("msg", "burst sent"), ("count", "1000")]);

    if let Err(e) = client.close() {
        eprintln!("failed to close client: {e}");
    }
}
