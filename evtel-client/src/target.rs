// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{
    fmt, mem,
    sync::{Arc, Condvar, Mutex, MutexGuard},
    thread,
    time::{Duration, Instant},
};

use evtel::{Config, Error, Event, Result};
use evtel_sampling::{
    constants::rate::DEFAULT_WINDOW_SECONDS, Criteria, RateClassConfig, SamplingDecision,
    TargetSampler,
};

use crate::encoding;
use crate::transport::{DeliveryError, HttpTransport, Transport};

const DEFAULT_FLUSH_PERIOD: Duration = Duration::from_secs(5);

/// Error that can occur when the mutex was poisoned.
///
/// The only way to handle it is to log and try to exit cleanly
struct MutexPoisonedError;

#[derive(Debug, PartialEq, Eq)]
enum SenderError {
    AlreadyShutdown,
    MutexPoisoned,
}

/// Lifecycle of a target's flush worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// Accepting events and flushing periodically
    Running,
    /// Shutdown was requested, the last batch is being delivered
    Draining,
    /// The worker has exited
    Stopped,
}

/// Configures a [`Target`] before registering it on a [`crate::Client`].
///
/// ```no_run
/// use std::time::Duration;
/// use evtel_client::{Client, TargetBuilder};
///
/// let client = Client::new();
/// let mut builder = TargetBuilder::new("http://localhost:8080/events");
/// builder
///     .add_header("x-api-key", "secret")
///     .set_flush_period(Duration::from_secs(10))
///     .add_rate_class(
///         1.0,
///         [("status".to_string(), serde_json::Value::from("500"))]
///             .into_iter()
///             .collect(),
///     )
///     .add_rate_class(0.2, Default::default());
/// let target = client.add_target(builder).unwrap();
/// ```
pub struct TargetBuilder {
    url: String,
    headers: Vec<(String, String)>,
    flush_period: Duration,
    window_seconds: f64,
    rate_classes: Vec<RateClassConfig>,
    transport: Option<Box<dyn Transport>>,
    sampler_seed: Option<u64>,
}

impl TargetBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        TargetBuilder {
            url: url.into(),
            headers: Vec::new(),
            flush_period: DEFAULT_FLUSH_PERIOD,
            window_seconds: DEFAULT_WINDOW_SECONDS,
            rate_classes: Vec::new(),
            transport: None,
            sampler_seed: None,
        }
    }

    /// Builds the target described by `config`: its per-field rate classes followed by the
    /// catch-all class.
    ///
    /// Returns `None` when no target url is configured. Every specification is validated
    /// before anything is started.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let Some(url) = config.target_url() else {
            return Ok(None);
        };
        let headers = config.headers()?;
        let mut rate_classes = RateClassConfig::parse_list(config.rate_classes_spec())?;
        rate_classes.push(RateClassConfig::catch_all(config.total_per_second()));
        let flush_period = Duration::try_from_secs_f64(config.seconds_per_write())
            .map_err(|_| Error::InvalidFlushPeriod(config.seconds_per_write()))?;

        let mut builder = TargetBuilder::new(url);
        builder
            .set_headers(headers)
            .set_flush_period(flush_period)
            .set_window_seconds(config.window_seconds());
        builder.rate_classes = rate_classes;
        Ok(Some(builder))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn set_headers(&mut self, headers: Vec<(String, String)>) -> &mut Self {
        self.headers = headers;
        self
    }

    pub fn set_flush_period(&mut self, flush_period: Duration) -> &mut Self {
        self.flush_period = flush_period;
        self
    }

    pub fn set_window_seconds(&mut self, window_seconds: f64) -> &mut Self {
        self.window_seconds = window_seconds;
        self
    }

    /// Admit about `rate_per_second` events matching `criteria`
    pub fn add_rate_class(&mut self, rate_per_second: f64, criteria: Criteria) -> &mut Self {
        self.rate_classes
            .push(RateClassConfig::new(rate_per_second, criteria));
        self
    }

    pub fn add_rate_class_config(&mut self, class: RateClassConfig) -> &mut Self {
        self.rate_classes.push(class);
        self
    }

    /// Deliver batches through `transport` instead of HTTP
    pub fn set_transport<T: Transport>(&mut self, transport: T) -> &mut Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Seed the sampler's random source, for reproducible sampling
    pub fn set_sampler_seed(&mut self, seed: u64) -> &mut Self {
        self.sampler_seed = Some(seed);
        self
    }

    /// Validates the configuration and starts the flush worker
    pub(crate) fn build(self) -> Result<Target> {
        if self.flush_period.is_zero() {
            return Err(Error::InvalidFlushPeriod(0.0));
        }
        if !(self.window_seconds.is_finite() && self.window_seconds > 0.0) {
            return Err(Error::InvalidRate {
                value: self.window_seconds.to_string(),
                reason: "window must be a positive number of seconds".to_string(),
            });
        }
        for class in &self.rate_classes {
            class.validate()?;
        }
        let transport = match self.transport {
            Some(transport) => transport,
            None => Box::new(HttpTransport::new(&self.url, &self.headers)?),
        };

        let mut sampler = match self.sampler_seed {
            Some(seed) => TargetSampler::with_seed(self.window_seconds, seed),
            None => TargetSampler::new(self.window_seconds),
        };
        for class in &self.rate_classes {
            sampler.add_rate_class_config(class);
        }

        let (tx, rx) = channel(sampler);
        let worker = FlushWorker {
            url: self.url.clone(),
            transport,
            rx,
            flush_period: self.flush_period,
        };
        let handle = worker.spawn()?;
        evtel::evtel_debug!(
            "Target: started flush worker for {} with {} rate classes",
            self.url,
            self.rate_classes.len()
        );
        Ok(Target {
            url: self.url,
            tx,
            handle: Mutex::new(Some(handle)),
        })
    }
}

impl fmt::Debug for TargetBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetBuilder")
            .field("url", &self.url)
            .field("flush_period", &self.flush_period)
            .field("window_seconds", &self.window_seconds)
            .field("rate_classes", &self.rate_classes)
            .finish()
    }
}

/// One delivery destination.
///
/// Owns the sampling state and the pending buffer for the destination. A dedicated worker
/// thread swaps the buffer out every flush period, on [`Target::force_flush`], and one last
/// time on shutdown, then encodes and delivers it with no lock held.
///
/// Dropping the last handle to a target requests its shutdown without waiting for it.
pub struct Target {
    url: String,
    tx: Sender,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Target {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Samples the event and buffers a weighted copy if it is kept.
    ///
    /// Events written once shutdown was requested are dropped.
    pub fn write_event(&self, event: &Event) -> SamplingDecision {
        match self.tx.write_event(event) {
            Ok(decision) => decision,
            Err(SenderError::AlreadyShutdown) => {
                evtel::evtel_debug!("Target: dropping event for {}, target is shut down", self.url);
                SamplingDecision::Drop
            }
            Err(SenderError::MutexPoisoned) => {
                evtel::evtel_error!("Target: dropping event for {}, state mutex poisoned", self.url);
                SamplingDecision::Drop
            }
        }
    }

    /// Registers a rate class on the running target.
    ///
    /// Fails with [`Error::InvalidRate`] if the rate is negative or not finite. A target that
    /// is shutting down ignores the class.
    pub fn add_rate_class(&self, rate_per_second: f64, criteria: Criteria) -> Result<()> {
        let class = RateClassConfig::new(rate_per_second, criteria);
        class.validate()?;
        if let Err(e) = self.tx.add_rate_class(class.rate, class.criteria) {
            evtel::evtel_debug!("Target: failed to add rate class to {}: {:?}", self.url, e);
        }
        Ok(())
    }

    /// Asks the worker to deliver the pending events now
    pub fn force_flush(&self) {
        if let Err(e) = self.tx.trigger_flush() {
            evtel::evtel_debug!("Target: failed to trigger flush of {}: {:?}", self.url, e);
        }
    }

    /// Number of kept events waiting for the next flush
    pub fn pending_events(&self) -> usize {
        self.tx.pending_events().unwrap_or(0)
    }

    pub fn state(&self) -> TargetState {
        self.tx.target_state().unwrap_or(TargetState::Stopped)
    }

    /// Asks the worker to deliver the pending events and exit
    pub fn trigger_shutdown(&self) {
        use SenderError::*;
        match self.tx.trigger_shutdown() {
            Err(AlreadyShutdown) | Ok(()) => {}
            Err(MutexPoisoned) => {
                evtel::evtel_error!(
                    "Target.trigger_shutdown: state mutex poisoned, flush worker for {} may not stop",
                    self.url
                );
            }
        }
    }

    /// Blocks until the worker delivered its last batch and exited.
    ///
    /// Only returns once [`Target::trigger_shutdown`] was called.
    pub fn wait_for_shutdown(&self) -> Result<()> {
        match self.tx.wait_shutdown_done() {
            Ok(()) | Err(SenderError::MutexPoisoned) => self.join(),
            Err(SenderError::AlreadyShutdown) => Ok(()),
        }
    }

    /// Triggers the shutdown and waits for it
    pub fn shutdown(&self) -> Result<()> {
        self.trigger_shutdown();
        self.wait_for_shutdown()
    }

    fn join(&self) -> Result<()> {
        let handle = match self.handle.lock() {
            Ok(mut handle) => handle.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return Ok(());
        };
        handle.join().map_err(|p| {
            let panic = p
                .downcast_ref::<String>()
                .map(String::as_str)
                .or_else(|| p.downcast_ref::<&str>().copied())
                .unwrap_or("error message unknown");
            evtel::evtel_error!(
                "Target.join: flush worker for {} panicked: {}",
                self.url,
                panic
            );
            Error::WorkerPanicked(panic.to_string())
        })
    }
}

impl Drop for Target {
    fn drop(&mut self) {
        let _ = self.tx.trigger_shutdown();
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("url", &self.url)
            .field("state", &self.state())
            .finish()
    }
}

fn channel(sampler: TargetSampler) -> (Sender, Receiver) {
    let waiter = Arc::new(Waiter {
        state: Mutex::new(SharedState {
            flush_needed: false,
            shutdown_needed: false,
            has_shutdown: false,
            sampler,
            pending: Vec::new(),
        }),
        notifier: Condvar::new(),
    });
    (
        Sender {
            waiter: waiter.clone(),
        },
        Receiver { waiter },
    )
}

struct Sender {
    waiter: Arc<Waiter>,
}

impl Sender {
    fn get_state(&self) -> std::result::Result<MutexGuard<'_, SharedState>, SenderError> {
        self.waiter
            .state
            .lock()
            .map_err(|_| SenderError::MutexPoisoned)
    }

    fn get_running_state(&self) -> std::result::Result<MutexGuard<'_, SharedState>, SenderError> {
        let state = self.get_state()?;
        if state.shutdown_needed || state.has_shutdown {
            return Err(SenderError::AlreadyShutdown);
        }
        Ok(state)
    }

    fn write_event(&self, event: &Event) -> std::result::Result<SamplingDecision, SenderError> {
        let mut state = self.get_running_state()?;
        let decision = state.sampler.evaluate(event);
        if let SamplingDecision::Keep { weight } = decision {
            state.pending.push(event.with_sample_weight(weight));
        }
        Ok(decision)
    }

    fn add_rate_class(
        &self,
        rate_per_second: f64,
        criteria: Criteria,
    ) -> std::result::Result<(), SenderError> {
        let mut state = self.get_running_state()?;
        state.sampler.add_rate_class(rate_per_second, criteria);
        Ok(())
    }

    fn pending_events(&self) -> std::result::Result<usize, SenderError> {
        Ok(self.get_state()?.pending.len())
    }

    fn target_state(&self) -> std::result::Result<TargetState, SenderError> {
        let state = self.get_state()?;
        Ok(if state.has_shutdown {
            TargetState::Stopped
        } else if state.shutdown_needed {
            TargetState::Draining
        } else {
            TargetState::Running
        })
    }

    fn trigger_flush(&self) -> std::result::Result<(), SenderError> {
        let mut state = self.get_running_state()?;
        state.flush_needed = true;
        self.waiter.notifier.notify_all();
        Ok(())
    }

    fn trigger_shutdown(&self) -> std::result::Result<(), SenderError> {
        let mut state = self.get_running_state()?;
        state.shutdown_needed = true;
        self.waiter.notifier.notify_all();
        Ok(())
    }

    fn wait_shutdown_done(&self) -> std::result::Result<(), SenderError> {
        let mut state = self.get_state()?;
        while !state.has_shutdown {
            state = self
                .waiter
                .notifier
                .wait(state)
                .map_err(|_| SenderError::MutexPoisoned)?;
        }
        Ok(())
    }
}

struct Receiver {
    waiter: Arc<Waiter>,
}

impl Drop for Receiver {
    fn drop(&mut self) {
        let _ = self.shutdown_done();
    }
}

impl Receiver {
    fn shutdown_done(&self) -> std::result::Result<(), MutexPoisonedError> {
        let mut state = self.waiter.state.lock().map_err(|_| MutexPoisonedError)?;
        state.has_shutdown = true;
        self.waiter.notifier.notify_all();
        Ok(())
    }

    /// Waits until a flush is requested, shutdown is requested or `deadline` is reached, and
    /// takes the pending events. Without a deadline only requests wake the worker.
    fn receive(
        &self,
        deadline: Option<Instant>,
    ) -> std::result::Result<(FlushMessage, Vec<Event>), MutexPoisonedError> {
        let mut state = self.waiter.state.lock().map_err(|_| MutexPoisonedError)?;
        loop {
            // If shutdown was asked, grab the batch and shutdown
            if state.shutdown_needed {
                return Ok((FlushMessage::Shutdown, mem::take(&mut state.pending)));
            }
            // If we need to flush, grab the batch and reset the flag
            if state.flush_needed {
                state.flush_needed = false;
                return Ok((FlushMessage::Flush, mem::take(&mut state.pending)));
            }
            let Some(deadline) = deadline else {
                state = self
                    .waiter
                    .notifier
                    .wait(state)
                    .map_err(|_| MutexPoisonedError)?;
                continue;
            };
            let leftover = deadline.saturating_duration_since(Instant::now());
            let timeout_result;
            (state, timeout_result) = self
                .waiter
                .notifier
                .wait_timeout(state, leftover)
                .map_err(|_| MutexPoisonedError)?;
            if timeout_result.timed_out() {
                return Ok((
                    FlushMessage::FlushWithTimeout,
                    mem::take(&mut state.pending),
                ));
            }
        }
    }
}

struct SharedState {
    flush_needed: bool,
    shutdown_needed: bool,
    has_shutdown: bool,
    sampler: TargetSampler,
    pending: Vec<Event>,
}

struct Waiter {
    state: Mutex<SharedState>,
    notifier: Condvar,
}

#[derive(Debug, PartialEq)]
enum FlushMessage {
    Flush,
    FlushWithTimeout,
    Shutdown,
}

struct FlushWorker {
    url: String,
    transport: Box<dyn Transport>,
    rx: Receiver,
    flush_period: Duration,
}

impl FlushWorker {
    /// Spawn a new thread to run the flush loop.
    /// The thread will run until either
    /// * A shutdown flag is set
    /// * The state mutex is poisoned
    fn spawn(self) -> Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("evtel-flush".to_string())
            .spawn(evtel::log::with_local_logger(move || self.run()))
            .map_err(|e| Error::WorkerSpawn(e.to_string()))
    }

    fn run(mut self) {
        // a period too long to be represented as an instant never elapses
        let mut next_flush = Instant::now().checked_add(self.flush_period);
        loop {
            let Ok((message, events)) = self.rx.receive(next_flush) else {
                evtel::evtel_error!(
                    "Target: state mutex poisoned, stopping flush worker for {}",
                    self.url
                );
                return;
            };
            if message == FlushMessage::FlushWithTimeout {
                let now = Instant::now();
                next_flush = next_flush
                    .and_then(|deadline| deadline.checked_add(self.flush_period))
                    .filter(|deadline| *deadline > now)
                    .or_else(|| now.checked_add(self.flush_period));
            }
            if !events.is_empty() {
                self.deliver(events);
            }
            if message == FlushMessage::Shutdown {
                evtel::evtel_debug!("Target: flush worker for {} stopped", self.url);
                return;
            }
        }
    }

    fn deliver(&mut self, events: Vec<Event>) {
        let body = match encoding::encode_batch(&events) {
            Ok(body) => body,
            Err(e) => {
                evtel::evtel_error!(
                    "Target: failed to encode {} events for {}: {}",
                    events.len(),
                    self.url,
                    e
                );
                std::process::abort();
            }
        };
        match self.transport.send(body) {
            Ok(()) => {
                evtel::evtel_debug!("Target: delivered {} events to {}", events.len(), self.url);
            }
            Err(e) => log_delivery_error(&self.url, events.len(), &e),
        }
    }
}

#[track_caller]
fn log_delivery_error(url: &str, count: usize, e: &DeliveryError) {
    match e {
        DeliveryError::Status { status, body } => {
            evtel::evtel_error!(
                "Target: dropped {} events, {} returned status {}: {}",
                count,
                url,
                status,
                body
            );
        }
        DeliveryError::Network(e) => {
            evtel::evtel_error!(
                "Target: dropped {} events, network error sending to {}: {}",
                count,
                url,
                e
            );
        }
        DeliveryError::Request(e) | DeliveryError::Body(e) => {
            evtel::evtel_error!("Target: dropped {} events for {}: {}", count, url, e);
        }
        DeliveryError::Runtime(e) => {
            evtel::evtel_error!(
                "Target: dropped {} events for {}, delivery runtime error: {}",
                count,
                url,
                e
            );
        }
    }
}
