// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{
    convert::Infallible,
    io::Read,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use http_body_util::{BodyExt, Full};
use hyper::{
    body::{Bytes, Incoming},
    service::service_fn,
    HeaderMap, Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use serde_json::Value;

mod integration_tests;

/// A request received by the [`TestCollector`], body already decompressed
#[derive(Debug, Clone)]
pub struct ReceivedBatch {
    pub path: String,
    pub headers: HeaderMap,
    pub events: Vec<Value>,
}

/// Local HTTP collector answering every request with a fixed status
pub struct TestCollector {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<ReceivedBatch>>>,
    _runtime: tokio::runtime::Runtime,
}

impl TestCollector {
    pub fn start(status: StatusCode) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("failed to build collector runtime");
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind(SocketAddr::from((
                [127, 0, 0, 1],
                0,
            ))))
            .expect("failed to bind collector");
        let addr = listener.local_addr().expect("no collector address");
        let received = Arc::new(Mutex::new(Vec::new()));

        let batches = received.clone();
        runtime.spawn(async move {
            while let Ok((stream, _addr)) = listener.accept().await {
                let batches = batches.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let batches = batches.clone();
                        async move {
                            let batch = read_batch(req).await;
                            batches.lock().unwrap().push(batch);
                            let response = Response::builder()
                                .status(status)
                                .body(Full::new(Bytes::from_static(b"collector says no")))
                                .unwrap();
                            Ok::<_, Infallible>(response)
                        }
                    });
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        TestCollector {
            addr,
            received,
            _runtime: runtime,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/v1/events", self.addr)
    }

    pub fn received(&self) -> Vec<ReceivedBatch> {
        self.received.lock().unwrap().clone()
    }
}

async fn read_batch(req: Request<Incoming>) -> ReceivedBatch {
    let path = req.uri().path().to_string();
    let headers = req.headers().clone();
    let body = req.into_body().collect().await.unwrap().to_bytes();

    let mut json = String::new();
    flate2::read::GzDecoder::new(&body[..])
        .read_to_string(&mut json)
        .unwrap();
    let Value::Array(events) = serde_json::from_str(&json).unwrap() else {
        panic!("batch is not a JSON array: {json}");
    };
    ReceivedBatch {
        path,
        headers,
        events,
    }
}
