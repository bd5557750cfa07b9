// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Event-telemetry client.
//!
//! Producers submit [`evtel::Event`]s to a [`Client`]. The client runs its hooks on each event
//! and hands it to every registered [`Target`]. Each target samples events with its own
//! [`evtel_sampling::TargetSampler`], buffers the kept ones with their sample weight, and a
//! dedicated worker thread periodically POSTs the buffer as a gzip compressed JSON array.
//!
//! # Usage
//! ```no_run
//! // Picks up EVTEL_* environment variables
//! let config = evtel::Config::builder().build();
//! let client = evtel_client::Client::from_config(&config).unwrap();
//!
//! client.write("request", [("path", "/"), ("status", "200")]);
//!
//! client.close().unwrap();
//! ```

mod client;
mod encoding;
mod target;
mod transport;

pub use client::Client;
pub use encoding::{encode_batch, EncodeError};
pub use target::{Target, TargetBuilder, TargetState};
pub use transport::{DeliveryError, HttpTransport, Transport};
