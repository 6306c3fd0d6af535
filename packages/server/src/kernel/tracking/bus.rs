//! Typed pub/sub bus with a bounded replay buffer.
//!
//! Live delivery and replay are deliberately decoupled: `emit` appends to the
//! ring buffer whether or not anyone is subscribed, so a dashboard that
//! connects after a burst of activity can still replay the recent backlog,
//! while already-connected dashboards receive the same events live with no
//! duplicates (replay happens once, before the live subscription begins).

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::events::{BusRecord, EventKind, TrackingEvent};

/// Default replay-buffer capacity.
const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// Handler invoked synchronously on emit. Handlers must not block; stream
/// connections push into a per-connection channel and return.
pub type EventHandler = Arc<dyn Fn(&BusRecord) + Send + Sync>;

/// Token returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct BusInner {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<(HandlerId, EventHandler)>>,
    buffer: VecDeque<BusRecord>,
}

/// Thread-safe, cloneable event bus.
///
/// Emission is serialized through the mutex, so handlers for one bus
/// instance observe events in publish order.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                next_id: 0,
                handlers: HashMap::new(),
                buffer: VecDeque::with_capacity(capacity),
            })),
            capacity,
        }
    }

    /// Register a handler for one event kind. Handlers for a kind are
    /// invoked in registration order.
    pub fn on(&self, kind: EventKind, handler: EventHandler) -> HandlerId {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = HandlerId(inner.next_id);
        inner.next_id += 1;
        inner.handlers.entry(kind).or_default().push((id, handler));
        id
    }

    /// Unregister a handler. Unknown ids are ignored.
    pub fn off(&self, kind: EventKind, id: HandlerId) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handlers) = inner.handlers.get_mut(&kind) {
            handlers.retain(|(handler_id, _)| *handler_id != id);
        }
    }

    /// Publish an event: synchronously notify current handlers for its kind
    /// and append it to the replay buffer (oldest entry evicted at capacity),
    /// whether or not any handler is registered. A zero capacity disables
    /// replay buffering; live delivery is unaffected.
    pub fn emit(&self, event: TrackingEvent) {
        let record = BusRecord::new(event);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if self.capacity > 0 {
            if inner.buffer.len() >= self.capacity {
                inner.buffer.pop_front();
            }
            inner.buffer.push_back(record.clone());
        }

        // Delivered under the lock: publish order is the delivery order.
        if let Some(handlers) = inner.handlers.get(&record.event.kind()) {
            for (_, handler) in handlers {
                handler(&record);
            }
        }
    }

    /// Replay the buffered backlog, oldest first, without clearing it, so
    /// every late subscriber can replay the full history independently.
    pub fn flush_buffer(&self, mut f: impl FnMut(&BusRecord)) {
        let snapshot: Vec<BusRecord> = {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.buffer.iter().cloned().collect()
        };
        for record in &snapshot {
            f(record);
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .handlers
            .get(&kind)
            .map_or(0, |handlers| handlers.len())
    }

    /// Atomically snapshot the buffer and subscribe the handler to every
    /// event kind.
    ///
    /// Both happen under one lock acquisition, so an event emitted after the
    /// snapshot is guaranteed to reach the live handler and never lands in
    /// both the replay slice and the live feed.
    pub fn subscribe_all(&self, handler: EventHandler) -> (Vec<BusRecord>, BusSubscription) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let replay: Vec<BusRecord> = inner.buffer.iter().cloned().collect();

        let mut ids = Vec::with_capacity(EventKind::ALL.len());
        for kind in EventKind::ALL {
            let id = HandlerId(inner.next_id);
            inner.next_id += 1;
            inner
                .handlers
                .entry(kind)
                .or_default()
                .push((id, handler.clone()));
            ids.push((kind, id));
        }

        (
            replay,
            BusSubscription {
                bus: self.clone(),
                ids,
            },
        )
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for a connection's handler registrations.
///
/// Dropping it unregisters every handler, which is what ties handler cleanup
/// to the transport's cancellation signal: when the connection's stream is
/// dropped, so is the guard.
pub struct BusSubscription {
    bus: EventBus,
    ids: Vec<(EventKind, HandlerId)>,
}

impl Drop for BusSubscription {
    fn drop(&mut self) {
        for (kind, id) in self.ids.drain(..) {
            self.bus.off(kind, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn log_event(line: &str) -> TrackingEvent {
        TrackingEvent::LogUpdate {
            job_id: Uuid::new_v4(),
            line: line.to_string(),
        }
    }

    fn line_of(record: &BusRecord) -> String {
        match &record.event {
            TrackingEvent::LogUpdate { line, .. } => line.clone(),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn emit_notifies_handlers_in_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = seen.clone();
            bus.on(
                EventKind::LogUpdate,
                Arc::new(move |_: &BusRecord| seen.lock().unwrap().push(tag)),
            );
        }

        bus.emit(log_event("x"));
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn emit_buffers_even_without_handlers() {
        let bus = EventBus::new();
        bus.emit(log_event("unheard"));

        let mut replayed = Vec::new();
        bus.flush_buffer(|r| replayed.push(line_of(r)));
        assert_eq!(replayed, vec!["unheard"]);
    }

    #[test]
    fn flush_buffer_is_non_destructive() {
        let bus = EventBus::new();
        bus.emit(log_event("a"));
        bus.emit(log_event("b"));

        let mut first = Vec::new();
        bus.flush_buffer(|r| first.push(line_of(r)));
        let mut second = Vec::new();
        bus.flush_buffer(|r| second.push(line_of(r)));

        assert_eq!(first, vec!["a", "b"]);
        assert_eq!(first, second);
    }

    #[test]
    fn ring_buffer_keeps_most_recent_events_oldest_first() {
        let bus = EventBus::with_capacity(3);
        for i in 0..5 {
            bus.emit(log_event(&format!("e{}", i)));
        }

        let mut replayed = Vec::new();
        bus.flush_buffer(|r| replayed.push(line_of(r)));
        assert_eq!(replayed, vec!["e2", "e3", "e4"]);
    }

    #[test]
    fn zero_capacity_disables_replay_but_not_live_delivery() {
        let bus = EventBus::with_capacity(0);
        let delivered = Arc::new(AtomicUsize::new(0));

        let sink = delivered.clone();
        bus.on(
            EventKind::LogUpdate,
            Arc::new(move |_: &BusRecord| {
                sink.fetch_add(1, Ordering::SeqCst);
            }),
        );

        for i in 0..50 {
            bus.emit(log_event(&format!("e{}", i)));
        }

        let mut replayed = 0;
        bus.flush_buffer(|_| replayed += 1);
        assert_eq!(replayed, 0);
        assert_eq!(delivered.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn off_removes_only_the_given_handler() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_a = count.clone();
        let a = bus.on(
            EventKind::LogUpdate,
            Arc::new(move |_: &BusRecord| {
                count_a.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let count_b = count.clone();
        let _b = bus.on(
            EventKind::LogUpdate,
            Arc::new(move |_: &BusRecord| {
                count_b.fetch_add(10, Ordering::SeqCst);
            }),
        );

        bus.off(EventKind::LogUpdate, a);
        bus.emit(log_event("x"));

        assert_eq!(count.load(Ordering::SeqCst), 10);
        assert_eq!(bus.listener_count(EventKind::LogUpdate), 1);
    }

    #[test]
    fn subscription_drop_restores_listener_counts() {
        let bus = EventBus::new();
        let before: Vec<usize> = EventKind::ALL
            .iter()
            .map(|k| bus.listener_count(*k))
            .collect();

        let (_, subscription) = bus.subscribe_all(Arc::new(|_: &BusRecord| {}));
        for kind in EventKind::ALL {
            assert_eq!(bus.listener_count(kind), 1);
        }

        drop(subscription);
        let after: Vec<usize> = EventKind::ALL
            .iter()
            .map(|k| bus.listener_count(*k))
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn subscribe_all_replays_backlog_and_receives_live_events() {
        let bus = EventBus::new();
        bus.emit(log_event("old"));

        let live = Arc::new(Mutex::new(Vec::new()));
        let live_sink = live.clone();
        let (replay, _subscription) = bus.subscribe_all(Arc::new(move |r: &BusRecord| {
            live_sink.lock().unwrap().push(line_of(r));
        }));

        bus.emit(log_event("new"));

        let replayed: Vec<String> = replay.iter().map(line_of).collect();
        assert_eq!(replayed, vec!["old"]);
        assert_eq!(*live.lock().unwrap(), vec!["new"]);
    }
}
