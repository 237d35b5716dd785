use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tracing::trace;

use propwire_common::ApiError;

use crate::{manager::ChannelManager, protocol::Channel};

/// Callback invoked with the decoded event payload.
pub type EventHandler = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

/// Event-name → handler mapping for one channel binding.
#[derive(Default, Clone)]
pub struct EventHandlers {
    map: HashMap<String, EventHandler>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        mut self,
        event: impl Into<String>,
        handler: impl Fn(serde_json::Value) + Send + Sync + 'static,
    ) -> Self {
        self.map.insert(event.into(), Arc::new(handler));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Live channel binding. Dropping it without calling [`unsubscribe`]
/// leaves the binding active (and the handlers firing), hence `must_use`.
///
/// [`unsubscribe`]: Subscription::unsubscribe
#[must_use = "an unreleased subscription keeps its handlers bound"]
pub struct Subscription {
    channel: Channel,
    manager: ChannelManager,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    pub(crate) fn new(channel: Channel, manager: ChannelManager) -> Self {
        Self { channel, manager }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Unbind this channel. Idempotent with respect to an unbind that
    /// already happened through the manager.
    pub async fn unsubscribe(self) -> Result<(), ApiError> {
        self.manager.unsubscribe(&self.channel).await
    }
}

/// Wire-name → handlers map shared between subscribers and the reader
/// task. Binding an already-bound name replaces the old handlers, so a
/// channel never has more than one active binding.
#[derive(Default)]
pub(crate) struct Registry {
    inner: Mutex<HashMap<String, HashMap<String, EventHandler>>>,
}

impl Registry {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, HashMap<String, EventHandler>>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Bind handlers for a wire name. Returns true when this replaced an
    /// existing binding.
    pub(crate) fn bind(&self, wire_name: &str, handlers: EventHandlers) -> bool {
        self.lock()
            .insert(wire_name.to_string(), handlers.map)
            .is_some()
    }

    /// Remove a binding. Returns false when the name was not bound.
    pub(crate) fn unbind(&self, wire_name: &str) -> bool {
        self.lock().remove(wire_name).is_some()
    }

    pub(crate) fn is_bound(&self, wire_name: &str) -> bool {
        self.lock().contains_key(wire_name)
    }

    pub(crate) fn bound_names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Deliver an event to the handler bound for this channel+event pair.
    /// The handler is cloned out of the lock and invoked outside it, so a
    /// handler may itself subscribe or unsubscribe.
    pub(crate) fn dispatch(&self, wire_name: &str, event: &str, payload: serde_json::Value) {
        let handler = self
            .lock()
            .get(wire_name)
            .and_then(|handlers| handlers.get(event))
            .cloned();
        match handler {
            Some(handler) => handler(payload),
            None => trace!(channel = wire_name, event, "no handler bound, dropping event"),
        }
    }
}
