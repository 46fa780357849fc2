//! # Keel Core Event System Errors
//!
//! Defines error types specific to the Keel Event System.
//!
//! [`EventSystemError`] covers malformed calls (empty event names),
//! `wait_for` expiry and cancellation, and listener failures. Listener
//! failures are never returned from `publish`; the variant exists so the
//! failure can be described uniformly when it is logged and re-published.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventSystemError {
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Event '{event_name}' timeout after {timeout_ms}ms")]
    Timeout { event_name: String, timeout_ms: u128 },

    #[error("Subscription waiting for event '{event_name}' was removed before the event fired")]
    SubscriptionCancelled { event_name: String },

    #[error("Listener '{listener_id}' failed while handling '{event_name}': {message}")]
    ListenerFailure {
        event_name: String,
        listener_id: String,
        message: String,
    },
}

impl EventSystemError {
    pub(crate) fn empty_event_name() -> Self {
        EventSystemError::InvalidArgument {
            reason: "Event name is required".to_string(),
        }
    }
}
