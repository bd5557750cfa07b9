// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid header specification {0:?}, expected key=value")]
    InvalidHeader(String),
    #[error("invalid header name {0:?}")]
    InvalidHeaderName(String),
    #[error("invalid value for header {0:?}")]
    InvalidHeaderValue(String),
    #[error("invalid rate class specification {0:?}, expected key=value=rate")]
    InvalidRateClass(String),
    #[error("invalid rate {value:?}: {reason}")]
    InvalidRate { value: String, reason: String },
    #[error("invalid flush period {0}s, expected a positive number of seconds")]
    InvalidFlushPeriod(f64),
    #[error("invalid target url {url:?}: {reason}")]
    InvalidTargetUrl { url: String, reason: String },
    #[error("key/value list has an odd number of elements ({0})")]
    OddKeyValueCount(usize),
    #[error("key at position {0} is not a string")]
    NonStringKey(usize),
    #[error("failed to spawn flush worker: {0}")]
    WorkerSpawn(String),
    #[error("flush worker panicked: {0}")]
    WorkerPanicked(String),
}
