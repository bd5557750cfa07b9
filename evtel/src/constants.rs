// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

pub const EVTEL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Field carrying the event discriminator, present on every event
pub const TYPE_FIELD: &str = "type";
/// Milliseconds between event creation and submission
pub const DURATION_MS_FIELD: &str = "durationMS";

pub const LOG_EVENT_TYPE: &str = "log";

pub mod build_info {
    pub const PACKAGE_NAME: &str = "packageName";
    pub const PACKAGE_VERSION: &str = "packageVersion";
    pub const TARGET_OS: &str = "targetOs";
    pub const TARGET_ARCH: &str = "targetArch";
    pub const EVTEL_VERSION: &str = "evtelVersion";
}

pub mod rusage {
    pub const USER_TIME: &str = "rUsageUTime";
    pub const SYSTEM_TIME: &str = "rUsageSTime";
}

pub mod process {
    /// Peak resident set size, in bytes
    pub const MAX_RSS_BYTES: &str = "processMaxRssBytes";
    pub const MINOR_FAULTS: &str = "processMinorFaults";
    pub const MAJOR_FAULTS: &str = "processMajorFaults";
    pub const VOLUNTARY_SWITCHES: &str = "processVoluntarySwitches";
    pub const INVOLUNTARY_SWITCHES: &str = "processInvoluntarySwitches";
}
