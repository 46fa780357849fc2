use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::event::{EventData, EventOptions};

/// Keys owned by the envelope itself; options cannot override them.
const RESERVED_KEYS: [&str; 3] = ["name", "data", "timestamp"];

/// Immutable payload handed to every listener of one publish call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEnvelope {
    name: String,
    data: EventData,
    /// Milliseconds since the Unix epoch.
    timestamp: i64,
    #[serde(flatten)]
    extra: EventOptions,
}

impl EventEnvelope {
    /// Build an envelope stamped with the current time.
    pub fn new(name: &str, data: EventData, options: EventOptions) -> Self {
        Self::with_timestamp(name, data, options, now_millis())
    }

    pub fn with_timestamp(name: &str, data: EventData, mut options: EventOptions, timestamp: i64) -> Self {
        for key in RESERVED_KEYS {
            if options.remove(key).is_some() {
                log::debug!("Ignoring reserved option '{}' on event '{}'", key, name);
            }
        }
        Self {
            name: name.to_string(),
            data,
            timestamp,
            extra: options,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &EventData {
        &self.data
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Options merged in by the publisher.
    pub fn extra(&self) -> &EventOptions {
        &self.extra
    }

    /// Look up a single merged option.
    pub fn option(&self, key: &str) -> Option<&serde_json::Value> {
        self.extra.get(key)
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// The fixed event vocabulary shared by the kernel and its collaborators.
///
/// Any consumer may subscribe to any of these; producers are not required to
/// have a live subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardEvent {
    SystemInit,
    SystemReady,
    SystemShutdown,
    StorageConnected,
    StorageDisconnected,
    StorageDataChanged,
    FeedAdded,
    FeedRemoved,
    FeedUpdated,
    FeedsRefreshed,
    ArticleAdded,
    ArticleUpdated,
    ArticleDeleted,
    ArticleRead,
    ArticleUnread,
    ArticleSelected,
    UiLayoutChanged,
    UiThemeChanged,
    UiSidebarToggled,
    UiModalOpened,
    UiModalClosed,
    SearchPerformed,
    SearchCleared,
    BookmarkAdded,
    BookmarkRemoved,
    PluginLoaded,
    PluginUnloaded,
    PluginError,
    /// Emitted by the bus when a listener fails.
    ListenerError,
}

impl StandardEvent {
    pub const ALL: [StandardEvent; 29] = [
        StandardEvent::SystemInit,
        StandardEvent::SystemReady,
        StandardEvent::SystemShutdown,
        StandardEvent::StorageConnected,
        StandardEvent::StorageDisconnected,
        StandardEvent::StorageDataChanged,
        StandardEvent::FeedAdded,
        StandardEvent::FeedRemoved,
        StandardEvent::FeedUpdated,
        StandardEvent::FeedsRefreshed,
        StandardEvent::ArticleAdded,
        StandardEvent::ArticleUpdated,
        StandardEvent::ArticleDeleted,
        StandardEvent::ArticleRead,
        StandardEvent::ArticleUnread,
        StandardEvent::ArticleSelected,
        StandardEvent::UiLayoutChanged,
        StandardEvent::UiThemeChanged,
        StandardEvent::UiSidebarToggled,
        StandardEvent::UiModalOpened,
        StandardEvent::UiModalClosed,
        StandardEvent::SearchPerformed,
        StandardEvent::SearchCleared,
        StandardEvent::BookmarkAdded,
        StandardEvent::BookmarkRemoved,
        StandardEvent::PluginLoaded,
        StandardEvent::PluginUnloaded,
        StandardEvent::PluginError,
        StandardEvent::ListenerError,
    ];

    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            StandardEvent::SystemInit => "system:init",
            StandardEvent::SystemReady => "system:ready",
            StandardEvent::SystemShutdown => "system:shutdown",
            StandardEvent::StorageConnected => "storage:connected",
            StandardEvent::StorageDisconnected => "storage:disconnected",
            StandardEvent::StorageDataChanged => "storage:data_changed",
            StandardEvent::FeedAdded => "feed:added",
            StandardEvent::FeedRemoved => "feed:removed",
            StandardEvent::FeedUpdated => "feed:updated",
            StandardEvent::FeedsRefreshed => "feeds:refreshed",
            StandardEvent::ArticleAdded => "article:added",
            StandardEvent::ArticleUpdated => "article:updated",
            StandardEvent::ArticleDeleted => "article:deleted",
            StandardEvent::ArticleRead => "article:read",
            StandardEvent::ArticleUnread => "article:unread",
            StandardEvent::ArticleSelected => "article:selected",
            StandardEvent::UiLayoutChanged => "ui:layout_changed",
            StandardEvent::UiThemeChanged => "ui:theme_changed",
            StandardEvent::UiSidebarToggled => "ui:sidebar_toggled",
            StandardEvent::UiModalOpened => "ui:modal_opened",
            StandardEvent::UiModalClosed => "ui:modal_closed",
            StandardEvent::SearchPerformed => "search:performed",
            StandardEvent::SearchCleared => "search:cleared",
            StandardEvent::BookmarkAdded => "bookmark:added",
            StandardEvent::BookmarkRemoved => "bookmark:removed",
            StandardEvent::PluginLoaded => "plugin:loaded",
            StandardEvent::PluginUnloaded => "plugin:unloaded",
            StandardEvent::PluginError => "plugin:error",
            StandardEvent::ListenerError => "error:listener",
        }
    }

    /// Domain prefix ("system", "storage", "feed", ...).
    pub fn domain(&self) -> &'static str {
        match self {
            StandardEvent::FeedsRefreshed => "feed",
            StandardEvent::ListenerError => "error",
            other => other
                .name()
                .split_once(':')
                .map(|(domain, _)| domain)
                .unwrap_or_default(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|event| event.name() == name)
    }
}

impl fmt::Display for StandardEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl AsRef<str> for StandardEvent {
    fn as_ref(&self) -> &str {
        self.name()
    }
}
