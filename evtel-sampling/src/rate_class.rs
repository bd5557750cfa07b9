// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use evtel::Event;
use serde_json::Value;

/// Field values an event must carry to match a [`RateClass`]
pub type Criteria = HashMap<String, Value>;

/// A filter on event fields paired with a decaying estimate of how often matching events arrive.
///
/// The estimate is an exponentially decaying counter: every matching arrival adds one, then the
/// whole accumulator is scaled by the decay computed from the time since the previous arrival at
/// the target. A long enough idle period drives the decay to zero or below, resetting the
/// counter, and the counter may go negative when several long-idle arrivals come back to back.
#[derive(Debug, Clone, PartialEq)]
pub struct RateClass {
    /// Admitted events per window
    grant_rate: f64,
    criteria: Criteria,
    /// Matching arrivals per window
    observed_rate: f64,
}

impl RateClass {
    /// Creates a class admitting `rate_per_second` matching events over a `window_seconds`
    /// decay window.
    pub fn new(rate_per_second: f64, window_seconds: f64, criteria: Criteria) -> Self {
        RateClass {
            grant_rate: rate_per_second * window_seconds,
            criteria,
            observed_rate: 0.0,
        }
    }

    /// Returns true if every criterion is present in the event with an equal value.
    ///
    /// Equality is on JSON values, so the string `"500"` does not match the number `500`.
    pub fn matches(&self, event: &Event) -> bool {
        self.criteria
            .iter()
            .all(|(key, expected)| event.get(key) == Some(expected))
    }

    /// Records one matching arrival and returns the probability this class grants it.
    ///
    /// The result may exceed 1, be infinite when the estimate collapsed to exactly zero, or be
    /// negative after long idle periods.
    pub fn observe(&mut self, decay: f64) -> f64 {
        self.observed_rate = (self.observed_rate + 1.0) * decay;
        self.grant_rate / self.observed_rate
    }

    pub fn grant_rate(&self) -> f64 {
        self.grant_rate
    }

    pub fn observed_rate(&self) -> f64 {
        self.observed_rate
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }
}

/// Scaling applied to the rate estimators after `elapsed_seconds` without events.
pub fn decay(window_seconds: f64, elapsed_seconds: f64) -> f64 {
    (window_seconds - elapsed_seconds) / window_seconds
}
