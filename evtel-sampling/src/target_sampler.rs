// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::time::Instant;

use evtel::Event;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::RateClassConfig;
use crate::constants::rate;
use crate::rate_class::{decay, Criteria, RateClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingDecision {
    /// Keep the event, each kept event stands for `weight` events
    Keep { weight: u64 },
    Drop,
}

impl SamplingDecision {
    pub fn is_keep(&self) -> bool {
        matches!(self, SamplingDecision::Keep { .. })
    }

    pub fn weight(&self) -> Option<u64> {
        match self {
            SamplingDecision::Keep { weight } => Some(*weight),
            SamplingDecision::Drop => None,
        }
    }
}

/// Sampling state of one delivery target.
///
/// Not synchronized: the owner serializes calls to [`TargetSampler::evaluate`].
pub struct TargetSampler {
    window_seconds: f64,
    rate_classes: Vec<RateClass>,
    /// Instant of the most recently evaluated event, matched or not
    last_event_time: Instant,
    rng: SmallRng,
}

impl fmt::Debug for TargetSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetSampler")
            .field("window_seconds", &self.window_seconds)
            .field("rate_classes", &self.rate_classes)
            .field("last_event_time", &self.last_event_time)
            .finish()
    }
}

impl Default for TargetSampler {
    fn default() -> Self {
        TargetSampler::new(rate::DEFAULT_WINDOW_SECONDS)
    }
}

impl TargetSampler {
    pub fn new(window_seconds: f64) -> Self {
        Self::with_rng(window_seconds, SmallRng::from_entropy())
    }

    /// Creates a sampler with a deterministic random source
    pub fn with_seed(window_seconds: f64, seed: u64) -> Self {
        Self::with_rng(window_seconds, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(window_seconds: f64, rng: SmallRng) -> Self {
        TargetSampler {
            window_seconds,
            rate_classes: Vec::new(),
            last_event_time: Instant::now(),
            rng,
        }
    }

    pub fn window_seconds(&self) -> f64 {
        self.window_seconds
    }

    pub fn rate_classes(&self) -> &[RateClass] {
        &self.rate_classes
    }

    /// Registers a class admitting about `rate_per_second` events matching `criteria`.
    pub fn add_rate_class(&mut self, rate_per_second: f64, criteria: Criteria) -> &mut Self {
        self.rate_classes
            .push(RateClass::new(rate_per_second, self.window_seconds, criteria));
        self
    }

    pub fn add_rate_class_config(&mut self, config: &RateClassConfig) -> &mut Self {
        self.add_rate_class(config.rate, config.criteria.clone())
    }

    /// Restarts the idle clock, as if an event had been evaluated at `now`
    pub fn set_last_event_time(&mut self, now: Instant) {
        self.last_event_time = now;
    }

    pub fn evaluate(&mut self, event: &Event) -> SamplingDecision {
        self.evaluate_at(event, Instant::now())
    }

    /// Decides whether to keep `event`, arriving at `now`, and with which weight.
    ///
    /// Every matching class observes the arrival; the event is kept with the highest probability
    /// any of them grants. Events matching no class, or only classes granting a non-positive
    /// probability, are dropped.
    pub fn evaluate_at(&mut self, event: &Event, now: Instant) -> SamplingDecision {
        let elapsed = now
            .saturating_duration_since(self.last_event_time)
            .as_secs_f64();
        self.last_event_time = now;
        let decay = decay(self.window_seconds, elapsed);

        let mut max_prob: f64 = 0.0;
        for class in self.rate_classes.iter_mut() {
            if class.matches(event) {
                // f64::max ignores the NaN of a zero grant over a collapsed estimate
                max_prob = max_prob.max(class.observe(decay));
            }
        }

        if max_prob <= 0.0 {
            return SamplingDecision::Drop;
        }
        let r: f64 = self.rng.gen();
        if r > max_prob {
            return SamplingDecision::Drop;
        }
        SamplingDecision::Keep {
            weight: sample_weight(max_prob),
        }
    }
}

fn sample_weight(probability: f64) -> u64 {
    ((1.0 / probability).round() as u64).max(rate::MIN_SAMPLE_WEIGHT)
}
