// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{fmt::Display, str::FromStr};

use crate::configuration::supported_configurations::SupportedConfigurations;

/// Provides raw string values for configuration keys
pub(crate) trait ConfigurationSource {
    /// Shown in diagnostics about values read from this source
    fn name(&self) -> &'static str;

    fn raw(&self, key: SupportedConfigurations) -> Option<String>;
}

/// Reads `EVTEL_*` variables from the process environment
pub(crate) struct EnvSource;

impl ConfigurationSource for EnvSource {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn raw(&self, key: SupportedConfigurations) -> Option<String> {
        std::env::var(key.as_str()).ok()
    }
}

/// A value that was present in a source but could not be used
#[derive(Debug, PartialEq)]
pub(crate) struct RejectedValue {
    pub source: &'static str,
    pub raw: String,
    pub expected: &'static str,
    pub reason: String,
}

/// Outcome of looking a key up in a [`SourceChain`]
#[derive(Debug, PartialEq)]
pub(crate) struct Lookup<T> {
    pub key: SupportedConfigurations,
    /// First value that parsed, with the name of the source it came from
    pub found: Option<(T, &'static str)>,
    /// Values from higher precedence sources that failed to parse
    pub rejected: Vec<RejectedValue>,
}

impl<T> Lookup<T> {
    pub fn value(self) -> Option<T> {
        self.found.map(|(value, _)| value)
    }
}

/// Sources queried in order, the first one holding a parsable value wins
pub(crate) struct SourceChain {
    sources: Vec<Box<dyn ConfigurationSource>>,
}

impl SourceChain {
    pub fn empty() -> Self {
        SourceChain {
            sources: Vec::new(),
        }
    }

    pub fn from_env() -> Self {
        let mut chain = Self::empty();
        chain.push(EnvSource);
        chain
    }

    /// Appends a source with lower precedence than the ones already added
    pub fn push<S: ConfigurationSource + 'static>(&mut self, source: S) -> &mut Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn lookup_str(&self, key: SupportedConfigurations) -> Lookup<String> {
        self.lookup(key)
    }

    pub fn lookup<T>(&self, key: SupportedConfigurations) -> Lookup<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let mut rejected = Vec::new();
        for source in &self.sources {
            let Some(raw) = source.raw(key) else {
                continue;
            };
            match raw.trim().parse::<T>() {
                Ok(value) => {
                    return Lookup {
                        key,
                        found: Some((value, source.name())),
                        rejected,
                    }
                }
                Err(e) => rejected.push(RejectedValue {
                    source: source.name(),
                    raw,
                    expected: std::any::type_name::<T>(),
                    reason: e.to_string(),
                }),
            }
        }
        Lookup {
            key,
            found: None,
            rejected,
        }
    }
}

/// Fixed values, used to stand in for the environment
#[cfg(test)]
pub(crate) struct MapSource {
    name: &'static str,
    values: std::collections::HashMap<SupportedConfigurations, String>,
}

#[cfg(test)]
impl MapSource {
    pub fn new<V: ToString>(
        name: &'static str,
        values: impl IntoIterator<Item = (SupportedConfigurations, V)>,
    ) -> Self {
        MapSource {
            name,
            values: values
                .into_iter()
                .map(|(k, v)| (k, v.to_string()))
                .collect(),
        }
    }
}

#[cfg(test)]
impl ConfigurationSource for MapSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn raw(&self, key: SupportedConfigurations) -> Option<String> {
        self.values.get(&key).cloned()
    }
}
