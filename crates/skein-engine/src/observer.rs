//! Collaborators notified of session changes or handed events live.

use std::sync::Arc;

use skein_core::EventRecord;

/// Notified when capture starts or stops.
///
/// Called outside the log's locks. Capture calls made from inside these
/// methods are dropped.
pub trait EnabledStateObserver: Send + Sync {
    /// Capture went from disabled to enabled.
    fn on_enabled(&self);
    /// Capture went from enabled to disabled.
    fn on_disabled(&self);
}

/// Receives every event whose category matches the exporter's filter,
/// as it is added.
pub trait EventExporter: Send + Sync {
    /// Export one event recorded under the category group `category`.
    fn export(&self, event: &EventRecord, category: &str);
}

/// Callback invoked with each matching event and its category name.
pub type EventCallback = Arc<dyn Fn(&EventRecord, &str) + Send + Sync>;

/// Decides, by `(category, event name)`, whether an event keeps its
/// arguments when argument filtering is active.
pub type ArgumentPredicate = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;
