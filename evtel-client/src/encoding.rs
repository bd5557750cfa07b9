// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io::Write;

use evtel::Event;
use flate2::{write::GzEncoder, Compression};

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to serialize events: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to compress events: {0}")]
    Compression(#[from] std::io::Error),
}

/// Serializes `events` as a JSON array and gzips it
pub fn encode_batch(events: &[Event]) -> Result<Vec<u8>, EncodeError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    serde_json::to_writer(&mut encoder, events)?;
    encoder.write_all(b"\n")?;
    Ok(encoder.finish()?)
}
