// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use evtel::{Error, Result};
use http_body_util::{BodyExt, Full};
use hyper::{
    body::Bytes,
    header::{HeaderName, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE},
    Method, Request,
};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

/// Timeout for establishing the connection to the collector
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Error delivering one batch. The batch is dropped.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("failed to start delivery runtime: {0}")]
    Runtime(std::io::Error),
    #[error("failed to build request: {0}")]
    Request(String),
    #[error("failed to send request: {0}")]
    Network(String),
    #[error("collector returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Ships one encoded batch to a collector.
///
/// `body` is a gzip compressed JSON array of events. Called from the target's flush worker
/// thread, never with a lock held.
pub trait Transport: Send + 'static {
    fn send(&mut self, body: Vec<u8>) -> std::result::Result<(), DeliveryError>;
}

impl<F> Transport for F
where
    F: FnMut(Vec<u8>) -> std::result::Result<(), DeliveryError> + Send + 'static,
{
    fn send(&mut self, body: Vec<u8>) -> std::result::Result<(), DeliveryError> {
        self(body)
    }
}

/// POSTs batches over plain HTTP/1
pub struct HttpTransport {
    uri: hyper::Uri,
    headers: Vec<(HeaderName, HeaderValue)>,
    connect_timeout: Duration,
    /// Created on first delivery, on the flush worker thread
    runtime: Option<tokio::runtime::Runtime>,
}

impl HttpTransport {
    pub fn new(url: &str, headers: &[(String, String)]) -> Result<Self> {
        let invalid_url = |reason: String| Error::InvalidTargetUrl {
            url: url.to_string(),
            reason,
        };
        let uri = hyper::Uri::from_maybe_shared(url.to_string())
            .map_err(|e| invalid_url(e.to_string()))?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(invalid_url("missing scheme or host".to_string()));
        }

        let headers = headers
            .iter()
            .map(|(name, value)| -> Result<(HeaderName, HeaderValue)> {
                let name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| Error::InvalidHeaderName(name.clone()))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|_| Error::InvalidHeaderValue(name.to_string()))?;
                Ok((name, value))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(HttpTransport {
            uri,
            headers,
            connect_timeout: CONNECT_TIMEOUT,
            runtime: None,
        })
    }

    pub fn uri(&self) -> &hyper::Uri {
        &self.uri
    }

    fn build_request(
        &self,
        body: Vec<u8>,
    ) -> std::result::Result<Request<Full<Bytes>>, DeliveryError> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(self.uri.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_ENCODING, "gzip");
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        builder
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| DeliveryError::Request(e.to_string()))
    }

    fn runtime(&mut self) -> std::result::Result<&tokio::runtime::Runtime, DeliveryError> {
        if self.runtime.is_none() {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(DeliveryError::Runtime)?;
            self.runtime = Some(runtime);
        }
        self.runtime.as_ref().ok_or_else(|| {
            DeliveryError::Runtime(std::io::Error::other("delivery runtime unavailable"))
        })
    }
}

impl Transport for HttpTransport {
    fn send(&mut self, body: Vec<u8>) -> std::result::Result<(), DeliveryError> {
        let request = self.build_request(body)?;
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(self.connect_timeout));

        self.runtime()?.block_on(async move {
            let client = Client::builder(TokioExecutor::new()).build(connector);
            let response = client
                .request(request)
                .await
                .map_err(|e| DeliveryError::Network(e.to_string()))?;

            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| DeliveryError::Body(e.to_string()))?
                .to_bytes();
            if !status.is_success() {
                return Err(DeliveryError::Status {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
            }
            Ok(())
        })
    }
}
