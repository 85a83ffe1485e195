use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use log::trace;

use crate::picker::{DateTimeRequest, PickerRequest};
use crate::value::FieldValue;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SubscriptionId(pub u64);

/// Everything broadcast between forms, fields and the picker singletons.
#[derive(Clone, Debug)]
pub enum BusEvent {
    PickerOpen(PickerRequest),
    DateTimeOpen(DateTimeRequest),
    PickerChange { name: String, value: FieldValue },
    PickerClose { name: String },
    KeyboardDismiss,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum EventKind {
    PickerOpen,
    DateTimeOpen,
    PickerChange,
    PickerClose,
    KeyboardDismiss,
}

impl BusEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BusEvent::PickerOpen(_) => EventKind::PickerOpen,
            BusEvent::DateTimeOpen(_) => EventKind::DateTimeOpen,
            BusEvent::PickerChange { .. } => EventKind::PickerChange,
            BusEvent::PickerClose { .. } => EventKind::PickerClose,
            BusEvent::KeyboardDismiss => EventKind::KeyboardDismiss,
        }
    }

    /// The field the event targets, when it targets one.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            BusEvent::PickerOpen(request) => Some(&request.name),
            BusEvent::DateTimeOpen(request) => Some(&request.name),
            BusEvent::PickerChange { name, .. } => Some(name),
            BusEvent::PickerClose { name } => Some(name),
            BusEvent::KeyboardDismiss => None,
        }
    }
}

type Handler = Arc<dyn Fn(&BusEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    handler: Handler,
}

type Topic = (EventKind, Option<String>);

#[derive(Default)]
struct BusState {
    topics: BTreeMap<Topic, Vec<Subscription>>,
}

/// Explicitly injected broadcast channel. A named event is delivered first to
/// subscribers of its `(kind, name)` topic in registration order, then to the
/// unnamespaced `(kind, None)` subscribers, synchronously per publish.
#[derive(Clone, Default)]
pub struct Dispatcher {
    next_id: Arc<AtomicU64>,
    state: Arc<RwLock<BusState>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        kind: EventKind,
        name: Option<&str>,
        handler: impl Fn(&BusEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state
            .topics
            .entry((kind, name.map(str::to_string)))
            .or_default()
            .push(Subscription {
                id,
                handler: Arc::new(handler),
            });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for subscriptions in state.topics.values_mut() {
            if let Some(index) = subscriptions
                .iter()
                .position(|subscription| subscription.id == id)
            {
                subscriptions.remove(index);
                return true;
            }
        }
        false
    }

    pub fn publish(&self, event: BusEvent) {
        let kind = event.kind();
        // Handlers may publish or (un)subscribe re-entrantly, so the listener
        // list is snapshotted before any handler runs.
        let handlers = {
            let state = match self.state.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let mut handlers = Vec::new();
            if let Some(name) = event.field_name() {
                if let Some(subscriptions) = state.topics.get(&(kind, Some(name.to_string()))) {
                    handlers.extend(
                        subscriptions
                            .iter()
                            .map(|subscription| subscription.handler.clone()),
                    );
                }
            }
            if let Some(subscriptions) = state.topics.get(&(kind, None)) {
                handlers.extend(
                    subscriptions
                        .iter()
                        .map(|subscription| subscription.handler.clone()),
                );
            }
            handlers
        };

        trace!(
            "dispatching {kind:?} for {:?} to {} listener(s)",
            event.field_name(),
            handlers.len()
        );

        for handler in handlers {
            handler(&event);
        }
    }

    #[cfg(test)]
    pub(crate) fn subscription_count(&self) -> usize {
        let state = match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.topics.values().map(Vec::len).sum()
    }
}
