// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use evtel::{
    constants::{DURATION_MS_FIELD, LOG_EVENT_TYPE},
    event::pairs_to_fields,
    Config, Event, Hook, Result,
};
use serde_json::Value;

use crate::target::{Target, TargetBuilder};

#[derive(Default)]
struct ClientState {
    targets: Vec<Arc<Target>>,
    hooks: Vec<Box<dyn Hook>>,
}

/// Entry point for producers.
///
/// Runs the registered hooks on every event, then hands it to every registered [`Target`].
/// Submission, hook registration and target registration are serialized by one lock; network
/// delivery happens on each target's own worker thread.
///
/// # Usage
/// ```no_run
/// use evtel_client::{Client, TargetBuilder};
///
/// let client = Client::new();
/// client.add_hook(evtel::build_info_hook!());
/// client.add_target(TargetBuilder::new("http://localhost:8080/events")).unwrap();
///
/// client.write("request", [("path", "/"), ("method", "GET")]);
/// client.log([("msg", "listening"), ("port", "8080")]);
///
/// client.close().unwrap();
/// ```
#[derive(Default)]
pub struct Client {
    state: Mutex<ClientState>,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client and registers the target described by `config`, if any
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::new();
        client.configure(config)?;
        Ok(client)
    }

    /// Applies the log level of `config` and registers its target.
    ///
    /// Returns `None` when `config` has no target url.
    pub fn configure(&self, config: &Config) -> Result<Option<Arc<Target>>> {
        evtel::log::set_max_level(config.log_level());
        match TargetBuilder::from_config(config)? {
            Some(builder) => self.add_target(builder).map(Some),
            None => {
                evtel::evtel_debug!("Client: no target url configured");
                Ok(None)
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ClientState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Starts the target's flush worker and adds it to the fan-out list
    pub fn add_target(&self, builder: TargetBuilder) -> Result<Arc<Target>> {
        let target = Arc::new(builder.build()?);
        self.lock_state().targets.push(target.clone());
        Ok(target)
    }

    /// Appends a hook, run after the hooks already registered
    pub fn add_hook<H: Hook + 'static>(&self, hook: H) {
        self.lock_state().hooks.push(Box::new(hook));
    }

    pub fn targets(&self) -> Vec<Arc<Target>> {
        self.lock_state().targets.clone()
    }

    /// Attaches `durationMS`, runs the hooks and hands the event to every target
    pub fn write_event(&self, mut event: Event) {
        let duration_ms = u64::try_from(event.elapsed().as_millis()).unwrap_or(u64::MAX);
        event.set(DURATION_MS_FIELD, duration_ms);

        let state = self.lock_state();
        for hook in &state.hooks {
            hook.on_event(&mut event);
        }
        for target in &state.targets {
            target.write_event(&event);
        }
    }

    /// Writes an event of type `event_type` carrying `fields`
    pub fn write<I, K, V>(&self, event_type: &str, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.write_event(Event::with_fields(event_type, fields));
    }

    /// Writes an event from an alternating `key, value, key, value` list.
    ///
    /// Nothing is written if the list has an odd length or a key is not a string.
    pub fn write_pairs(&self, event_type: &str, pairs: &[Value]) -> Result<()> {
        let event = Event::from_pairs(event_type, pairs)?;
        self.write_event(event);
        Ok(())
    }

    /// Writes a `log` event and prints its fields as one `key=value` line
    pub fn log<I, K, V>(&self, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let fields: Vec<(String, Value)> = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let line = format_line(fields.iter().map(|(k, v)| (k.as_str(), v)));
        self.write_event(Event::with_fields(LOG_EVENT_TYPE, fields));
        evtel::log::print_event_line(&line);
    }

    /// [`Client::log`] over an alternating `key, value` list
    pub fn log_pairs(&self, pairs: &[Value]) -> Result<()> {
        let line = format_line(pairs_to_fields(pairs)?);
        self.write_event(Event::from_pairs(LOG_EVENT_TYPE, pairs)?);
        evtel::log::print_event_line(&line);
        Ok(())
    }

    /// Shuts every target down and waits until each delivered its last batch.
    ///
    /// Targets are removed from the client, later events are only run through the hooks.
    /// Returns the first worker failure, after waiting for all of them.
    pub fn close(&self) -> Result<()> {
        let targets = {
            let mut state = self.lock_state();
            for target in &state.targets {
                target.trigger_shutdown();
            }
            std::mem::take(&mut state.targets)
        };

        let mut res = Ok(());
        for target in targets {
            if let Err(e) = target.wait_for_shutdown() {
                if res.is_ok() {
                    res = Err(e);
                }
            }
        }
        res
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("Client")
            .field("targets", &state.targets)
            .field("hooks", &state.hooks.len())
            .finish()
    }
}

fn format_line<'a, I>(fields: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a Value)>,
{
    fields
        .into_iter()
        .map(|(k, v)| match v {
            Value::String(s) => format!("{k}={s}"),
            v => format!("{k}={v}"),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use std::{
        io::Read,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use evtel::{log::Level, Error, Event};
    use evtel_sampling::Criteria;
    use serde_json::{json, Value};

    use super::{format_line, Client};
    use crate::{target::TargetBuilder, transport::DeliveryError};

    type Deliveries = Arc<Mutex<Vec<Value>>>;

    fn recording_target() -> (TargetBuilder, Deliveries) {
        let deliveries = Deliveries::default();
        let mut builder = TargetBuilder::new("http://collector.test/events");
        builder
            .set_flush_period(Duration::from_secs(3600))
            .set_sampler_seed(3)
            .add_rate_class(1_000_000.0, Criteria::new())
            .set_transport({
                let deliveries = deliveries.clone();
                move |body: Vec<u8>| -> Result<(), DeliveryError> {
                    let mut json = String::new();
                    flate2::read::GzDecoder::new(body.as_slice())
                        .read_to_string(&mut json)
                        .unwrap();
                    let Value::Array(events) = serde_json::from_str(&json).unwrap() else {
                        panic!("batch is not an array");
                    };
                    deliveries.lock().unwrap().extend(events);
                    Ok(())
                }
            });
        (builder, deliveries)
    }

    #[test]
    fn test_close_waits_for_delivery() {
        let client = Client::new();
        let (builder, deliveries) = recording_target();
        client.add_target(builder).unwrap();

        client.write("request", [("path", "/")]);
        client.write("request", [("path", "/about")]);
        client.close().unwrap();

        let deliveries = deliveries.lock().unwrap();
        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[0]["data"]["path"], "/");
        assert_eq!(deliveries[1]["data"]["path"], "/about");
        assert_eq!(deliveries[0]["samplerate"], 1);
        assert!(client.targets().is_empty());
    }

    #[test]
    fn test_fan_out_to_every_target() {
        let client = Client::new();
        let (first, first_deliveries) = recording_target();
        let (second, second_deliveries) = recording_target();
        let first = client.add_target(first).unwrap();
        client.add_target(second).unwrap();
        assert_eq!(client.targets().len(), 2);

        client.write("request", [("status", 200)]);
        assert_eq!(first.pending_events(), 1);
        client.close().unwrap();

        assert_eq!(first_deliveries.lock().unwrap().len(), 1);
        assert_eq!(second_deliveries.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_hooks_run_in_order() {
        let client = Client::new();
        let (builder, deliveries) = recording_target();
        client.add_target(builder).unwrap();
        client.add_hook(|event: &mut Event| {
            event.set("region", "eu");
        });
        client.add_hook(|event: &mut Event| {
            let region = event.get("region").cloned().unwrap_or(Value::Null);
            event.set("seen_region", region);
        });

        client.write("request", [("path", "/")]);
        client.close().unwrap();

        let deliveries = deliveries.lock().unwrap();
        assert_eq!(deliveries[0]["data"]["region"], "eu");
        assert_eq!(deliveries[0]["data"]["seen_region"], "eu");
    }

    #[test]
    fn test_concurrent_events_are_serialized() {
        const THREADS: u64 = 4;
        const EVENTS_PER_THREAD: u64 = 50;

        let client = Client::new();
        let (builder, deliveries) = recording_target();
        client.add_target(builder).unwrap();
        let calls: Arc<Mutex<Vec<(u64, usize)>>> = Arc::default();
        for index in 0..2 {
            let calls = calls.clone();
            client.add_hook(move |event: &mut Event| {
                let id = event.get("id").and_then(Value::as_u64).unwrap();
                calls.lock().unwrap().push((id, index));
                std::thread::yield_now();
            });
        }

        std::thread::scope(|s| {
            for worker in 0..THREADS {
                let client = &client;
                s.spawn(move || {
                    for i in 0..EVENTS_PER_THREAD {
                        client.write("request", [("id", worker * EVENTS_PER_THREAD + i)]);
                    }
                });
            }
        });
        client.close().unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len() as u64, 2 * THREADS * EVENTS_PER_THREAD);
        for pair in calls.chunks(2) {
            assert_eq!(pair[0].1, 0, "{pair:?}");
            assert_eq!(pair[1], (pair[0].0, 1), "{pair:?}");
        }
        // targets see the events in the order the hooks ran
        let hook_order: Vec<u64> = calls.iter().step_by(2).map(|(id, _)| *id).collect();
        let delivered: Vec<u64> = deliveries
            .lock()
            .unwrap()
            .iter()
            .map(|event| event["data"]["id"].as_u64().unwrap())
            .collect();
        assert_eq!(delivered, hook_order);
    }

    #[test]
    fn test_duration_is_attached_before_hooks() {
        let client = Client::new();
        let seen = Arc::new(Mutex::new(None));
        client.add_hook({
            let seen = seen.clone();
            move |event: &mut Event| {
                *seen.lock().unwrap() = event.get("durationMS").cloned();
            }
        });

        client.write("request", [("path", "/")]);

        let duration = seen.lock().unwrap().clone().unwrap();
        assert!(duration.is_u64());
    }

    #[test]
    fn test_write_pairs() {
        let client = Client::new();
        let (builder, deliveries) = recording_target();
        client.add_target(builder).unwrap();

        client
            .write_pairs("job", &[json!("queue"), json!("mail"), json!("retries"), json!(2)])
            .unwrap();
        assert_eq!(
            client.write_pairs("job", &[json!("queue")]),
            Err(Error::OddKeyValueCount(1))
        );
        assert_eq!(
            client.write_pairs("job", &[json!(1), json!("mail")]),
            Err(Error::NonStringKey(0))
        );
        client.close().unwrap();

        let deliveries = deliveries.lock().unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0]["data"]["type"], "job");
        assert_eq!(deliveries[0]["data"]["retries"], 2);
    }

    #[test]
    fn test_log_prints_line() {
        let _guard = evtel::log::test_logger::activate_test_logger();
        let client = Client::new();
        let (builder, deliveries) = recording_target();
        client.add_target(builder).unwrap();

        client.log([("msg", json!("listening")), ("port", json!(8080))]);
        client.close().unwrap();

        let logs = evtel::log::test_logger::take_test_logs().unwrap();
        assert!(logs.contains(&(Level::Info, "msg=listening port=8080".to_string())));
        let deliveries = deliveries.lock().unwrap();
        assert_eq!(deliveries[0]["data"]["type"], "log");
        assert_eq!(deliveries[0]["data"]["msg"], "listening");
    }

    #[test]
    fn test_log_pairs_rejects_odd_list() {
        let client = Client::new();
        assert_eq!(
            client.log_pairs(&[json!("msg"), json!("a"), json!("b")]),
            Err(Error::OddKeyValueCount(3))
        );
        client.log_pairs(&[json!("msg"), json!("ok")]).unwrap();
    }

    #[test]
    fn test_format_line() {
        let fields = [("a", json!("x y")), ("b", json!(1.5)), ("c", json!(true))];
        assert_eq!(
            format_line(fields.iter().map(|(k, v)| (*k, v))),
            "a=x y b=1.5 c=true"
        );
    }

    #[test]
    fn test_configure_without_url() {
        let client = Client::new();
        let config = evtel::Config::default();
        assert!(client.configure(&config).unwrap().is_none());
        assert!(client.targets().is_empty());
    }

    #[test]
    fn test_configure_rejects_bad_headers() {
        let client = Client::new();
        let mut config = evtel::Config::builder();
        config
            .set_target_url("http://collector.test/events".to_string())
            .set_headers("no-equals-sign".to_string());
        assert_eq!(
            client.configure(&config.build()).unwrap_err(),
            Error::InvalidHeader("no-equals-sign".to_string())
        );
        assert!(client.targets().is_empty());
    }

    #[test]
    fn test_configure_registers_target() {
        let client = Client::new();
        let mut config = evtel::Config::builder();
        config
            .set_target_url("http://collector.test/events".to_string())
            .set_log_level(evtel::log::LevelFilter::Error);
        let target = client.configure(&config.build()).unwrap().unwrap();
        assert_eq!(target.url(), "http://collector.test/events");
        assert_eq!(client.targets().len(), 1);
        client.close().unwrap();
    }

    #[test]
    fn test_write_after_close() {
        let client = Client::new();
        let (builder, deliveries) = recording_target();
        let target = client.add_target(builder).unwrap();
        client.close().unwrap();

        client.write("request", [("path", "/")]);
        assert_eq!(target.pending_events(), 0);
        assert!(deliveries.lock().unwrap().is_empty());
    }
}
