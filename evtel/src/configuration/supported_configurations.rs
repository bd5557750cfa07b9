// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Every configuration key read from the environment
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportedConfigurations {
    EVTEL_TARGET_URL,
    EVTEL_HEADERS,
    EVTEL_SECONDS_PER_WRITE,
    EVTEL_RATE_CLASSES,
    EVTEL_TOTAL_PER_SECOND,
    EVTEL_WINDOW_SECONDS,
    EVTEL_LOG_LEVEL,
}

impl SupportedConfigurations {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportedConfigurations::EVTEL_TARGET_URL => "EVTEL_TARGET_URL",
            SupportedConfigurations::EVTEL_HEADERS => "EVTEL_HEADERS",
            SupportedConfigurations::EVTEL_SECONDS_PER_WRITE => "EVTEL_SECONDS_PER_WRITE",
            SupportedConfigurations::EVTEL_RATE_CLASSES => "EVTEL_RATE_CLASSES",
            SupportedConfigurations::EVTEL_TOTAL_PER_SECOND => "EVTEL_TOTAL_PER_SECOND",
            SupportedConfigurations::EVTEL_WINDOW_SECONDS => "EVTEL_WINDOW_SECONDS",
            SupportedConfigurations::EVTEL_LOG_LEVEL => "EVTEL_LOG_LEVEL",
        }
    }
}
