// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::constants::TYPE_FIELD;
use crate::{Error, Result};

/// A structured telemetry record.
///
/// The wire shape is `{"time": <rfc3339 nanos>, "samplerate": <weight>, "data": {...}}`.
/// The weight stays at 0 until a target accepts the event, at which point the target stores
/// its own weighted copy (see [`Event::with_sample_weight`]).
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(skip)]
    start: Instant,
    time: String,
    #[serde(rename = "samplerate")]
    sample_weight: u64,
    data: Map<String, Value>,
}

impl Event {
    pub fn new(event_type: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert(TYPE_FIELD.to_string(), Value::String(event_type.into()));
        Event {
            start: Instant::now(),
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
            sample_weight: 0,
            data,
        }
    }

    /// Creates an event and sets the given fields in order.
    ///
    /// A `type` entry in `fields` overrides the discriminator.
    pub fn with_fields<I, K, V>(event_type: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut event = Event::new(event_type);
        for (key, value) in fields {
            event.set(key, value);
        }
        event
    }

    /// Creates an event from an alternating `key, value, key, value...` list.
    pub fn from_pairs(event_type: impl Into<String>, pairs: &[Value]) -> Result<Self> {
        let mut event = Event::new(event_type);
        event.set_pairs(pairs)?;
        Ok(event)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Sets fields from an alternating key/value list.
    ///
    /// The whole list is validated before any field is written, so a malformed list leaves the
    /// event untouched.
    pub fn set_pairs(&mut self, pairs: &[Value]) -> Result<&mut Self> {
        let fields = pairs_to_fields(pairs)?;
        for (key, value) in fields {
            self.data.insert(key.to_string(), value.clone());
        }
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn event_type(&self) -> Option<&str> {
        self.data.get(TYPE_FIELD).and_then(Value::as_str)
    }

    /// RFC-3339 creation timestamp, UTC with nanoseconds
    pub fn time(&self) -> &str {
        &self.time
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// The statistical weight, or `None` if the event has not been accepted by a target yet
    pub fn sample_weight(&self) -> Option<u64> {
        (self.sample_weight != 0).then_some(self.sample_weight)
    }

    /// Returns a copy of this event carrying `weight`, clamped to at least 1.
    pub fn with_sample_weight(&self, weight: u64) -> Event {
        Event {
            sample_weight: weight.max(1),
            ..self.clone()
        }
    }
}

/// Splits an alternating key/value list into `(key, value)` pairs.
pub fn pairs_to_fields(pairs: &[Value]) -> Result<Vec<(&str, &Value)>> {
    if pairs.len() % 2 != 0 {
        return Err(Error::OddKeyValueCount(pairs.len()));
    }
    pairs
        .chunks_exact(2)
        .enumerate()
        .map(|(i, pair)| match &pair[0] {
            Value::String(key) => Ok((key.as_str(), &pair[1])),
            _ => Err(Error::NonStringKey(i * 2)),
        })
        .collect()
}
