// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Core types of the evtel telemetry client: events, configuration, logging and the hooks run
//! on every event before delivery.

pub mod configuration;
pub mod constants;
pub use configuration::Config;

mod error;
pub use error::{Error, Result};

pub mod event;
pub use event::Event;

pub mod hooks;
pub use hooks::Hook;

pub mod log;
