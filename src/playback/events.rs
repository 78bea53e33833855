//! Typed publish/subscribe for transport notifications
//!
//! Each event kind is a marker type implementing [`EventKind`], which fixes the
//! payload type at compile time. Handlers run synchronously, in registration
//! order, on the thread that emits.
//!
//! Dispatch works on a snapshot of the listener list, so handlers may
//! subscribe, unsubscribe, or call back into the transport while an event is
//! being delivered. A listener removed during dispatch is not called for the
//! rest of that dispatch. A panicking listener is logged and skipped; the
//! remaining listeners still run.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use serde::Serialize;

use crate::error::PlayerError;
use crate::midi::ParsedMidi;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone)]
pub struct MidiLoadedEvent {
    pub midi: Rc<ParsedMidi>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayEvent {
    pub current_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseEvent {
    pub current_time: f64,
}

/// Always carries a time of 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopEvent {
    pub current_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeUpdateEvent {
    pub current_time: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateChangeEvent {
    pub playback_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EndedEvent;

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEvent {
    pub message: String,
    pub cause: PlayerError,
}

type Handler<P> = Rc<RefCell<dyn FnMut(&P)>>;

/// Listener list for one event kind.
pub struct Listeners<P> {
    entries: RefCell<Vec<(ListenerId, Handler<P>)>>,
}

impl<P> Default for Listeners<P> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }
}

impl<P> Listeners<P> {
    fn contains(&self, id: ListenerId) -> bool {
        self.entries.borrow().iter().any(|(i, _)| *i == id)
    }

    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// A closed set of event kinds, each tied to one payload type.
pub trait EventKind: 'static {
    type Payload: 'static;
    const NAME: &'static str;

    fn listeners(bus: &EventBus) -> &Listeners<Self::Payload>;
}

macro_rules! event_kind {
    ($kind:ident, $payload:ty, $name:literal, $field:ident) => {
        #[derive(Debug, Clone, Copy)]
        pub struct $kind;

        impl EventKind for $kind {
            type Payload = $payload;
            const NAME: &'static str = $name;

            fn listeners(bus: &EventBus) -> &Listeners<Self::Payload> {
                &bus.$field
            }
        }
    };
}

event_kind!(MidiLoaded, MidiLoadedEvent, "midiLoaded", midi_loaded);
event_kind!(Play, PlayEvent, "play", play);
event_kind!(Pause, PauseEvent, "pause", pause);
event_kind!(Stop, StopEvent, "stop", stop);
event_kind!(TimeUpdate, TimeUpdateEvent, "timeUpdate", time_update);
event_kind!(RateChange, RateChangeEvent, "rateChange", rate_change);
event_kind!(Ended, EndedEvent, "ended", ended);
event_kind!(ErrorRaised, ErrorEvent, "error", error);

#[derive(Default)]
pub struct EventBus {
    next_id: Cell<u64>,
    midi_loaded: Listeners<MidiLoadedEvent>,
    play: Listeners<PlayEvent>,
    pause: Listeners<PauseEvent>,
    stop: Listeners<StopEvent>,
    time_update: Listeners<TimeUpdateEvent>,
    rate_change: Listeners<RateChangeEvent>,
    ended: Listeners<EndedEvent>,
    error: Listeners<ErrorEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `E`. Handlers run in registration order.
    ///
    /// # Example
    /// ```
    /// use std::cell::Cell;
    /// use std::rc::Rc;
    /// use kplay::playback::{EventBus, RateChange, RateChangeEvent};
    ///
    /// let bus = EventBus::new();
    /// let seen = Rc::new(Cell::new(0.0));
    /// let sink = seen.clone();
    /// bus.subscribe::<RateChange>(move |e| sink.set(e.playback_rate));
    ///
    /// bus.emit::<RateChange>(&RateChangeEvent { playback_rate: 1.5 });
    /// assert_eq!(seen.get(), 1.5);
    /// ```
    pub fn subscribe<E: EventKind>(&self, handler: impl FnMut(&E::Payload) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let handler: Handler<E::Payload> = Rc::new(RefCell::new(handler));
        E::listeners(self).entries.borrow_mut().push((id, handler));
        id
    }

    /// Remove a handler. Returns `false` if it was not registered for `E`.
    pub fn unsubscribe<E: EventKind>(&self, id: ListenerId) -> bool {
        let mut entries = E::listeners(self).entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(i, _)| *i != id);
        entries.len() != before
    }

    pub fn listener_count<E: EventKind>(&self) -> usize {
        E::listeners(self).len()
    }

    /// Deliver `payload` to every handler registered for `E`.
    pub fn emit<E: EventKind>(&self, payload: &E::Payload) {
        let listeners = E::listeners(self);
        let snapshot: Vec<(ListenerId, Handler<E::Payload>)> = listeners.entries.borrow().clone();

        for (id, handler) in snapshot {
            if !listeners.contains(id) {
                continue;
            }
            let Ok(mut callback) = handler.try_borrow_mut() else {
                log::warn!("Skipping re-entrant '{}' listener {:?}", E::NAME, id);
                continue;
            };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (*callback)(payload)));
            if let Err(cause) = outcome {
                log::error!("'{}' listener {:?} panicked: {}", E::NAME, id, panic_message(&*cause));
            }
        }
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> &str {
    if let Some(message) = cause.downcast_ref::<&str>() {
        message
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
