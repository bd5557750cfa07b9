// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use evtel::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::syntax::{FIELD_SEPARATOR, LIST_SEPARATOR};
use crate::rate_class::Criteria;

/// Configuration for a single rate class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateClassConfig {
    /// Desired admitted events per second
    pub rate: f64,

    /// Field values an event must carry, empty to match every event
    #[serde(default)]
    pub criteria: Criteria,
}

impl RateClassConfig {
    pub fn new(rate: f64, criteria: Criteria) -> Self {
        RateClassConfig { rate, criteria }
    }

    /// A class matching every event
    pub fn catch_all(rate: f64) -> Self {
        RateClassConfig {
            rate,
            criteria: Criteria::new(),
        }
    }

    /// Fails with [`Error::InvalidRate`] unless the rate is a finite non-negative number
    pub fn validate(&self) -> Result<()> {
        check_rate(self.rate, &self.rate.to_string())
    }

    /// Parse a JSON array of classes
    pub fn from_json(json: &str) -> std::result::Result<Vec<Self>, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize a list of classes to a JSON string
    pub fn to_json(classes: &[Self]) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(classes)
    }

    /// Parses a rate class list.
    ///
    /// Accepts either `key=value=rate|key=value=rate`, each class matching one field against a
    /// string value, or a JSON array of `{"rate": .., "criteria": {..}}` objects.
    pub fn parse_list(spec: &str) -> Result<Vec<Self>> {
        let spec = spec.trim();
        let classes = if spec.starts_with('[') {
            Self::from_json(spec).map_err(|e| {
                evtel::evtel_debug!("RateClassConfig: invalid JSON rate classes: {}", e);
                Error::InvalidRateClass(spec.to_string())
            })?
        } else {
            spec.split(LIST_SEPARATOR)
                .map(str::trim)
                .filter(|class| !class.is_empty())
                .map(Self::parse_class)
                .collect::<Result<Vec<_>>>()?
        };
        for class in &classes {
            class.validate()?;
        }
        Ok(classes)
    }

    fn parse_class(class: &str) -> Result<Self> {
        let parts: Vec<&str> = class.splitn(3, FIELD_SEPARATOR).collect();
        let [key, value, rate] = parts[..] else {
            return Err(Error::InvalidRateClass(class.to_string()));
        };
        if key.is_empty() {
            return Err(Error::InvalidRateClass(class.to_string()));
        }
        let rate = rate.trim().parse::<f64>().map_err(|e| Error::InvalidRate {
            value: rate.to_string(),
            reason: e.to_string(),
        })?;
        Ok(RateClassConfig {
            rate,
            criteria: [(key.to_string(), Value::String(value.to_string()))]
                .into_iter()
                .collect(),
        })
    }
}

fn check_rate(rate: f64, raw: &str) -> Result<()> {
    if rate.is_finite() && rate >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidRate {
            value: raw.to_string(),
            reason: "rate must be a non-negative number of events per second".to_string(),
        })
    }
}
