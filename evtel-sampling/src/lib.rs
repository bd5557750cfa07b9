// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Adaptive sampling of telemetry events.
//!
//! A [`TargetSampler`] owns a set of [`RateClass`]es. Each class matches events on exact field
//! values and keeps a decaying estimate of how often matching events arrive. The sampler keeps
//! an event with the highest probability granted by a matching class and weights it by the
//! inverse of that probability, so the sum of weights estimates the number of events seen.

pub mod config;
pub mod constants;
pub mod rate_class;
pub mod target_sampler;

// Re-exports for convenient usage
pub use config::RateClassConfig;
pub use rate_class::{Criteria, RateClass};
pub use target_sampler::{SamplingDecision, TargetSampler};
