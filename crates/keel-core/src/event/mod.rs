//! # Keel Core Event System
//!
//! In-process asynchronous publish/subscribe. Producers publish named events
//! carrying a JSON payload; every listener captured at publish time runs
//! concurrently and `publish` resolves once all of them have settled.
//!
//! - [`bus`]: the [`EventBus`] itself (durable and one-shot partitions, `wait_for`).
//! - [`types`]: [`EventEnvelope`] and the [`StandardEvent`] vocabulary.
//! - [`error`]: [`EventSystemError`](error::EventSystemError).
pub mod bus;
pub mod error;
pub mod types;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// Payload carried by an event.
pub type EventData = serde_json::Value;

/// Free-form options: stored on subscriptions, merged into envelopes on publish.
pub type EventOptions = serde_json::Map<String, serde_json::Value>;

/// Error a listener may return to signal a failed delivery.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// What a listener invocation produced.
pub type ListenerResult = Result<ListenerOutcome, ListenerError>;

/// Owned future returned by a listener callback.
pub type ListenerFuture = BoxFuture<'static, ListenerResult>;

/// Stored listener callback.
pub type Listener = Arc<dyn Fn(Arc<EventEnvelope>) -> ListenerFuture + Send + Sync>;

/// Explicit return convention for listeners.
///
/// `Unsubscribe` asks the bus to drop this subscription after the current
/// invocation. It does not affect the publish call already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerOutcome {
    /// Keep receiving events.
    #[default]
    Continue,
    /// Remove this subscription after this call.
    Unsubscribe,
}

/// Unique identifier of a subscription for the lifetime of one bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub(crate) fn durable(seq: u64) -> Self {
        SubscriptionId(format!("sub_{}", seq))
    }

    pub(crate) fn one_shot(seq: u64) -> Self {
        SubscriptionId(format!("once_{}", seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wrap an async closure into a listener callback.
pub fn listener<F, Fut>(f: F) -> impl Fn(Arc<EventEnvelope>) -> ListenerFuture + Send + Sync + 'static
where
    F: Fn(Arc<EventEnvelope>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ListenerResult> + Send + 'static,
{
    move |envelope: Arc<EventEnvelope>| -> ListenerFuture { Box::pin(f(envelope)) }
}

/// Wrap a synchronous closure into a listener callback.
pub fn sync_listener<F>(f: F) -> impl Fn(Arc<EventEnvelope>) -> ListenerFuture + Send + Sync + 'static
where
    F: Fn(&EventEnvelope) -> ListenerResult + Send + Sync + 'static,
{
    move |envelope: Arc<EventEnvelope>| -> ListenerFuture {
        let result = f(&envelope);
        Box::pin(async move { result })
    }
}

/// Re-export important types
pub use bus::{BusDebugInfo, EventBus, EventDebugInfo};
pub use error::EventSystemError;
pub use types::{EventEnvelope, StandardEvent};

// Test module declaration
#[cfg(test)]
mod tests;
