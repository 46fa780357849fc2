use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use serde::Serialize;
use serde_json::json;
use tokio::sync::oneshot;

use crate::event::error::EventSystemError;
use crate::event::types::{EventEnvelope, StandardEvent};
use crate::event::{EventData, EventOptions, Listener, ListenerFuture, ListenerOutcome, SubscriptionId};
use crate::kernel::constants::DEFAULT_WAIT_TIMEOUT_MS;
use crate::kernel::error::Result;

/// A registered listener.
struct Subscription {
    id: SubscriptionId,
    callback: Listener,
    options: EventOptions,
}

/// Both listener partitions, keyed by event name. An event name never maps
/// to an empty list: the entry is dropped with its last listener.
#[derive(Default)]
struct ListenerTable {
    durable: HashMap<String, Vec<Arc<Subscription>>>,
    once: HashMap<String, Vec<Arc<Subscription>>>,
}

impl ListenerTable {
    fn remove(&mut self, id: &SubscriptionId) -> bool {
        remove_from(&mut self.durable, id) || remove_from(&mut self.once, id)
    }
}

fn remove_from(partition: &mut HashMap<String, Vec<Arc<Subscription>>>, id: &SubscriptionId) -> bool {
    let mut emptied = None;
    let mut found = false;
    for (event_name, subscriptions) in partition.iter_mut() {
        if let Some(index) = subscriptions.iter().position(|s| &s.id == id) {
            subscriptions.remove(index);
            found = true;
            if subscriptions.is_empty() {
                emptied = Some(event_name.clone());
            }
            break;
        }
    }
    if let Some(event_name) = emptied {
        partition.remove(&event_name);
    }
    found
}

/// A listener invocation that raised an error or panicked.
struct FailedDelivery {
    listener_id: SubscriptionId,
    message: String,
}

/// Per-event listener summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDebugInfo {
    pub listeners: usize,
    pub has_durable: bool,
    pub has_once: bool,
}

/// Snapshot of the bus for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusDebugInfo {
    pub total_listeners: usize,
    pub event_names: BTreeSet<String>,
    pub events: BTreeMap<String, EventDebugInfo>,
}

/// In-process asynchronous publish/subscribe bus.
///
/// The listener table is guarded by a mutex that is only held between
/// suspension points, never while a listener runs, so listeners may freely
/// subscribe, unsubscribe or publish from inside their callbacks.
pub struct EventBus {
    table: Mutex<ListenerTable>,
    next_subscription: AtomicU64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.lock_table();
        let durable: usize = table.durable.values().map(Vec::len).sum();
        let once: usize = table.once.values().map(Vec::len).sum();
        f.debug_struct("EventBus")
            .field("durable_listeners", &durable)
            .field("once_listeners", &once)
            .field("next_subscription", &self.next_subscription.load(Ordering::Relaxed))
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(ListenerTable::default()),
            next_subscription: AtomicU64::new(1),
        }
    }

    // Listeners never run under the lock, so a poisoned table is still consistent.
    fn lock_table(&self) -> MutexGuard<'_, ListenerTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_seq(&self) -> u64 {
        self.next_subscription.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a durable listener for `event_name`.
    pub fn subscribe<F>(&self, event_name: &str, callback: F, options: EventOptions) -> Result<SubscriptionId>
    where
        F: Fn(Arc<EventEnvelope>) -> ListenerFuture + Send + Sync + 'static,
    {
        if event_name.is_empty() {
            return Err(EventSystemError::empty_event_name().into());
        }
        let id = SubscriptionId::durable(self.next_seq());
        let subscription = Subscription {
            id: id.clone(),
            callback: Arc::new(callback),
            options,
        };
        self.lock_table()
            .durable
            .entry(event_name.to_string())
            .or_default()
            .push(Arc::new(subscription));
        log::debug!("Subscribed {} to '{}'", id, event_name);
        Ok(id)
    }

    /// Register a listener that is removed before its first invocation runs.
    pub fn once<F>(&self, event_name: &str, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(Arc<EventEnvelope>) -> ListenerFuture + Send + Sync + 'static,
    {
        if event_name.is_empty() {
            return Err(EventSystemError::empty_event_name().into());
        }
        let id = SubscriptionId::one_shot(self.next_seq());
        let subscription = Subscription {
            id: id.clone(),
            callback: Arc::new(callback),
            options: EventOptions::new(),
        };
        self.lock_table()
            .once
            .entry(event_name.to_string())
            .or_default()
            .push(Arc::new(subscription));
        log::debug!("Subscribed {} once to '{}'", id, event_name);
        Ok(id)
    }

    /// Remove a subscription from whichever partition holds it.
    ///
    /// Unknown ids are a no-op. Returns whether a listener was removed.
    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        let removed = self.lock_table().remove(id);
        if removed {
            log::debug!("Unsubscribed {}", id);
        }
        removed
    }

    /// Options the subscription was registered with.
    pub fn subscription_options(&self, id: &SubscriptionId) -> Option<EventOptions> {
        let table = self.lock_table();
        table
            .durable
            .values()
            .chain(table.once.values())
            .flatten()
            .find(|s| &s.id == id)
            .map(|s| s.options.clone())
    }

    /// Publish an event and wait for every captured listener to settle.
    ///
    /// Durable listeners are snapshotted and one-shot listeners are taken out
    /// of the table before anything runs, so changes made by listeners only
    /// affect later publishes. Listener errors and panics are logged and
    /// reported through `error:listener`; they never fail the publish.
    pub async fn publish(&self, event_name: &str, data: EventData, options: EventOptions) -> Result<()> {
        if event_name.is_empty() {
            return Err(EventSystemError::empty_event_name().into());
        }
        let envelope = Arc::new(EventEnvelope::new(event_name, data, options));
        self.deliver(envelope).await;
        Ok(())
    }

    /// Publish a standard event with a payload and no options.
    pub async fn emit(&self, event: StandardEvent, data: EventData) -> Result<()> {
        self.publish(event.name(), data, EventOptions::new()).await
    }

    fn deliver(&self, envelope: Arc<EventEnvelope>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let (durable, once) = {
                let mut table = self.lock_table();
                let durable = table.durable.get(envelope.name()).cloned().unwrap_or_default();
                let once = table.once.remove(envelope.name()).unwrap_or_default();
                (durable, once)
            };
            if durable.is_empty() && once.is_empty() {
                return;
            }

            let invocations = durable
                .iter()
                .chain(once.iter())
                .map(|subscription| self.invoke(subscription, envelope.clone()));
            let failures: Vec<FailedDelivery> = join_all(invocations).await.into_iter().flatten().collect();

            let listener_error = StandardEvent::ListenerError.name();
            for failure in failures {
                if envelope.name() == listener_error {
                    // Already logged; re-publishing would recurse.
                    continue;
                }
                let report = EventEnvelope::new(
                    listener_error,
                    json!({
                        "eventName": envelope.name(),
                        "error": failure.message,
                        "listenerId": failure.listener_id,
                    }),
                    EventOptions::new(),
                );
                self.deliver(Arc::new(report)).await;
            }
        })
    }

    async fn invoke(&self, subscription: &Subscription, envelope: Arc<EventEnvelope>) -> Option<FailedDelivery> {
        let callback = subscription.callback.clone();
        let outcome = match std::panic::catch_unwind(AssertUnwindSafe(|| callback(envelope.clone()))) {
            Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
            Err(panic) => Err(panic),
        };

        let message = match outcome {
            Ok(Ok(ListenerOutcome::Continue)) => return None,
            Ok(Ok(ListenerOutcome::Unsubscribe)) => {
                self.unsubscribe(&subscription.id);
                return None;
            }
            Ok(Err(error)) => error.to_string(),
            Err(panic) => panic_message(panic.as_ref()),
        };

        log::error!(
            "{}",
            EventSystemError::ListenerFailure {
                event_name: envelope.name().to_string(),
                listener_id: subscription.id.to_string(),
                message: message.clone(),
            }
        );
        Some(FailedDelivery {
            listener_id: subscription.id.clone(),
            message,
        })
    }

    /// Resolve with the data of the next `event_name` publish.
    ///
    /// Fails with `Timeout` if nothing is published within `timeout`; the
    /// transient subscription is removed in that case.
    pub async fn wait_for(&self, event_name: &str, timeout: Duration) -> Result<EventData> {
        let (tx, rx) = oneshot::channel::<EventData>();
        let slot = Arc::new(Mutex::new(Some(tx)));
        let id = self.once(event_name, move |envelope: Arc<EventEnvelope>| -> ListenerFuture {
            let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            Box::pin(async move {
                if let Some(sender) = sender {
                    let _ = sender.send(envelope.data().clone());
                }
                Ok(ListenerOutcome::Continue)
            })
        })?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(_)) => {
                self.unsubscribe(&id);
                Err(EventSystemError::SubscriptionCancelled {
                    event_name: event_name.to_string(),
                }
                .into())
            }
            Err(_) => {
                self.unsubscribe(&id);
                log::debug!("wait_for('{}') timed out after {:?}", event_name, timeout);
                Err(EventSystemError::Timeout {
                    event_name: event_name.to_string(),
                    timeout_ms: timeout.as_millis(),
                }
                .into())
            }
        }
    }

    /// `wait_for` with the default 5000 ms timeout.
    pub async fn wait_for_default(&self, event_name: &str) -> Result<EventData> {
        self.wait_for(event_name, Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS))
            .await
    }

    /// Listeners across both partitions, for one event or for all of them.
    pub fn listener_count(&self, event_name: Option<&str>) -> usize {
        let table = self.lock_table();
        match event_name {
            Some(name) => {
                table.durable.get(name).map_or(0, Vec::len) + table.once.get(name).map_or(0, Vec::len)
            }
            None => table
                .durable
                .values()
                .chain(table.once.values())
                .map(Vec::len)
                .sum(),
        }
    }

    /// Remove every listener for one event, or for all events.
    pub fn clear(&self, event_name: Option<&str>) {
        let mut table = self.lock_table();
        match event_name {
            Some(name) => {
                table.durable.remove(name);
                table.once.remove(name);
            }
            None => {
                table.durable.clear();
                table.once.clear();
            }
        }
    }

    /// Names with at least one listener in either partition.
    pub fn event_names(&self) -> BTreeSet<String> {
        let table = self.lock_table();
        table
            .durable
            .keys()
            .chain(table.once.keys())
            .cloned()
            .collect()
    }

    pub fn debug_info(&self) -> BusDebugInfo {
        let table = self.lock_table();
        let event_names: BTreeSet<String> = table
            .durable
            .keys()
            .chain(table.once.keys())
            .cloned()
            .collect();
        let events = event_names
            .iter()
            .map(|name| {
                let durable = table.durable.get(name).map_or(0, Vec::len);
                let once = table.once.get(name).map_or(0, Vec::len);
                let info = EventDebugInfo {
                    listeners: durable + once,
                    has_durable: durable > 0,
                    has_once: once > 0,
                };
                (name.clone(), info)
            })
            .collect::<BTreeMap<_, _>>();
        BusDebugInfo {
            total_listeners: events.values().map(|info| info.listeners).sum(),
            event_names,
            events,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("listener panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("listener panicked: {}", message)
    } else {
        "listener panicked".to_string()
    }
}
