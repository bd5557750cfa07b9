// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared constants for the evtel-sampling crate

/// Rate estimation parameters
pub mod rate {
    /// Default decay horizon of the rate estimators, in seconds
    pub const DEFAULT_WINDOW_SECONDS: f64 = 100.0;
    /// Smallest weight an accepted event can carry
    pub const MIN_SAMPLE_WEIGHT: u64 = 1;
}

/// Rate class specification syntax
pub mod syntax {
    /// Separates classes (and headers) in a specification string
    pub const LIST_SEPARATOR: char = '|';
    /// Separates the key, value and rate of a class
    pub const FIELD_SEPARATOR: char = '=';
}
