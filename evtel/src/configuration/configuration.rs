// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::configuration::sources::{Lookup, SourceChain};
use crate::configuration::supported_configurations::SupportedConfigurations;
use crate::log::LevelFilter;
use crate::{Error, Result};

const DEFAULT_SECONDS_PER_WRITE: f64 = 5.0;
const DEFAULT_TOTAL_PER_SECOND: f64 = 0.2;
const DEFAULT_WINDOW_SECONDS: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
/// Configuration of the telemetry client
///
/// Values are read from the process environment by [`Config::builder`] and can be overridden
/// in code before calling [`ConfigBuilder::build`]. Header and rate class specifications are
/// kept as written and validated when the client is configured, so a malformed value is
/// reported instead of silently ignored.
pub struct Config {
    /// Collector url, no target is started when unset
    target_url: Option<String>,
    /// `key=value|key=value` static headers
    headers: String,
    seconds_per_write: f64,
    /// `key=value=rate|key=value=rate` per-field rate classes
    rate_classes: String,
    /// Rate of the catch-all class, registered after the per-field classes
    total_per_second: f64,
    window_seconds: f64,
    log_level: LevelFilter,
}

impl Config {
    fn from_sources(sources: &SourceChain) -> Self {
        let default = Config::default();

        /// Values that failed to parse are logged, the next source or the default is used
        fn to_val<T>(lookup: Lookup<T>) -> Option<T> {
            for rejected in &lookup.rejected {
                crate::evtel_debug!(
                    "Config: ignoring {} from {}, {:?} is not a valid {}: {}",
                    lookup.key.as_str(),
                    rejected.source,
                    rejected.raw,
                    rejected.expected,
                    rejected.reason
                );
            }
            lookup.value()
        }

        fn positive(value: f64) -> bool {
            value.is_finite() && value > 0.0
        }

        Self {
            target_url: to_val(sources.lookup_str(SupportedConfigurations::EVTEL_TARGET_URL))
                .filter(|url| !url.is_empty())
                .or(default.target_url),
            headers: to_val(sources.lookup_str(SupportedConfigurations::EVTEL_HEADERS))
                .unwrap_or(default.headers),
            seconds_per_write: to_val(
                sources.lookup::<f64>(SupportedConfigurations::EVTEL_SECONDS_PER_WRITE),
            )
            .filter(|v| positive(*v))
            .unwrap_or(default.seconds_per_write),
            rate_classes: to_val(sources.lookup_str(SupportedConfigurations::EVTEL_RATE_CLASSES))
                .unwrap_or(default.rate_classes),
            total_per_second: to_val(
                sources.lookup::<f64>(SupportedConfigurations::EVTEL_TOTAL_PER_SECOND),
            )
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(default.total_per_second),
            window_seconds: to_val(
                sources.lookup::<f64>(SupportedConfigurations::EVTEL_WINDOW_SECONDS),
            )
            .filter(|v| positive(*v))
            .unwrap_or(default.window_seconds),
            log_level: to_val(sources.lookup(SupportedConfigurations::EVTEL_LOG_LEVEL))
                .unwrap_or(default.log_level),
        }
    }

    fn builder_with_sources(sources: &SourceChain) -> ConfigBuilder {
        ConfigBuilder {
            config: Config::from_sources(sources),
        }
    }

    /// Creates a new builder to set overrides detected configuration
    pub fn builder() -> ConfigBuilder {
        Self::builder_with_sources(&SourceChain::from_env())
    }

    pub fn target_url(&self) -> Option<&str> {
        self.target_url.as_deref()
    }

    pub fn headers_spec(&self) -> &str {
        &self.headers
    }

    /// Parses the static headers specification
    pub fn headers(&self) -> Result<Vec<(String, String)>> {
        parse_headers(&self.headers)
    }

    pub fn seconds_per_write(&self) -> f64 {
        self.seconds_per_write
    }

    pub fn rate_classes_spec(&self) -> &str {
        &self.rate_classes
    }

    pub fn total_per_second(&self) -> f64 {
        self.total_per_second
    }

    pub fn window_seconds(&self) -> f64 {
        self.window_seconds
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target_url: None,
            headers: String::new(),
            seconds_per_write: DEFAULT_SECONDS_PER_WRITE,
            rate_classes: String::new(),
            total_per_second: DEFAULT_TOTAL_PER_SECOND,
            window_seconds: DEFAULT_WINDOW_SECONDS,
            log_level: LevelFilter::default(),
        }
    }
}

/// Parses a `key=value|key=value` header list.
///
/// Values may contain `=`, empty segments are skipped.
pub fn parse_headers(spec: &str) -> Result<Vec<(String, String)>> {
    spec.split('|')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(Error::InvalidHeader(pair.to_string())),
        })
        .collect()
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Finalizes the builder and returns the configuration
    pub fn build(self) -> Config {
        self.config
    }

    pub fn set_target_url(&mut self, url: String) -> &mut Self {
        self.config.target_url = Some(url);
        self
    }

    pub fn set_headers(&mut self, headers: String) -> &mut Self {
        self.config.headers = headers;
        self
    }

    pub fn set_seconds_per_write(&mut self, seconds: f64) -> &mut Self {
        self.config.seconds_per_write = seconds;
        self
    }

    pub fn set_rate_classes(&mut self, rate_classes: String) -> &mut Self {
        self.config.rate_classes = rate_classes;
        self
    }

    pub fn set_total_per_second(&mut self, rate: f64) -> &mut Self {
        self.config.total_per_second = rate;
        self
    }

    pub fn set_window_seconds(&mut self, seconds: f64) -> &mut Self {
        self.config.window_seconds = seconds;
        self
    }

    pub fn set_log_level(&mut self, log_level: LevelFilter) -> &mut Self {
        self.config.log_level = log_level;
        self
    }
}
