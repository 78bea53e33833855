//! # Synchronizers
//!
//! Followers of the transport's `timeUpdate` and `stop` events that keep the
//! lyric, chord and keyboard displays in step with the song position.
//!
//! ## Key Types
//! - [`LyricSync`] - active lyric line, by range or by line start
//! - [`ChordSync`] - active chord name
//! - [`KeyboardSync`] - keys of the active chord on a [`Keyboard`]
//! - [`ControlsSync`] - enabled state of the play/pause/stop controls
//!
//! Displays are reached through small view traits, so the same followers drive
//! a terminal, a test recorder, or a GUI. A view is only touched when the
//! active item actually changes.
//!
//! ## Example
//! ```rust
//! use kplay::playback::TimeUpdateEvent;
//! use kplay::sync::{ChordSync, ChordView, Synchronizer};
//! use kplay::timeline::{Interval, Timeline};
//!
//! #[derive(Default)]
//! struct Shown(Vec<Option<String>>);
//!
//! impl ChordView for Shown {
//!     fn show_chord(&mut self, _index: Option<usize>, name: Option<&str>) {
//!         self.0.push(name.map(str::to_string));
//!     }
//! }
//!
//! let chords = Timeline::new(vec![
//!     Interval::new("C".to_string(), 0.0, 4.0),
//!     Interval::new("G".to_string(), 4.0, 8.0),
//! ]);
//! let mut sync = ChordSync::new(chords, Shown::default());
//!
//! for t in [0.5, 1.0, 4.5] {
//!     sync.on_time_update(&TimeUpdateEvent { current_time: t, duration: 8.0 });
//! }
//! assert_eq!(sync.view().0, vec![Some("C".to_string()), Some("G".to_string())]);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use crate::chord::Pitch;
use crate::keyboard::Keyboard;
use crate::playback::{
    Ended, EventBus, EventKind, MidiLoaded, Pause, Play, Stop, TimeUpdate, TimeUpdateEvent, TransportStatus,
};
use crate::timeline::{LookupPolicy, Timeline, Tracker};

pub trait LyricView {
    /// Mark line `index` active and bring it into view. `None` clears the highlight.
    fn highlight_line(&mut self, index: Option<usize>, text: Option<&str>);

    fn scroll_to_origin(&mut self) {}
}

pub trait ChordView {
    fn show_chord(&mut self, index: Option<usize>, name: Option<&str>);
}

pub trait KeyboardView {
    /// Replace the set of highlighted keys. Empty clears the keyboard.
    fn highlight_keys(&mut self, keys: &[Pitch]);
}

pub trait ControlsView {
    fn set_controls(&mut self, controls: Controls);
}

impl<T: LyricView + ?Sized> LyricView for Box<T> {
    fn highlight_line(&mut self, index: Option<usize>, text: Option<&str>) {
        (**self).highlight_line(index, text)
    }

    fn scroll_to_origin(&mut self) {
        (**self).scroll_to_origin()
    }
}

impl<T: ChordView + ?Sized> ChordView for Box<T> {
    fn show_chord(&mut self, index: Option<usize>, name: Option<&str>) {
        (**self).show_chord(index, name)
    }
}

impl<T: KeyboardView + ?Sized> KeyboardView for Box<T> {
    fn highlight_keys(&mut self, keys: &[Pitch]) {
        (**self).highlight_keys(keys)
    }
}

impl<T: ControlsView + ?Sized> ControlsView for Box<T> {
    fn set_controls(&mut self, controls: Controls) {
        (**self).set_controls(controls)
    }
}

/// A follower of the song position.
pub trait Synchronizer {
    fn on_time_update(&mut self, event: &TimeUpdateEvent);

    /// Back to "nothing active".
    fn on_stop(&mut self);
}

/// Listener registrations that can be removed together.
#[derive(Default)]
pub struct Subscription {
    removers: Vec<Box<dyn Fn(&EventBus) -> bool>>,
}

impl Subscription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<E: EventKind>(&mut self, bus: &EventBus, handler: impl FnMut(&E::Payload) + 'static) {
        let id = bus.subscribe::<E>(handler);
        self.removers.push(Box::new(move |bus: &EventBus| bus.unsubscribe::<E>(id)));
    }

    pub fn len(&self) -> usize {
        self.removers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.removers.is_empty()
    }

    /// Remove every listener from `bus`.
    pub fn detach(self, bus: &EventBus) {
        for remove in self.removers {
            remove(bus);
        }
    }
}

/// Route `timeUpdate` and `stop` from `bus` to `sync`.
pub fn attach<S: Synchronizer + 'static>(bus: &EventBus, sync: Rc<RefCell<S>>) -> Subscription {
    let mut subscription = Subscription::new();

    let target = sync.clone();
    subscription.add::<TimeUpdate>(bus, move |event| match target.try_borrow_mut() {
        Ok(mut sync) => sync.on_time_update(event),
        Err(_) => log::warn!("Synchronizer busy, dropping time update at {:.3}s", event.current_time),
    });

    subscription.add::<Stop>(bus, move |_| match sync.try_borrow_mut() {
        Ok(mut sync) => sync.on_stop(),
        Err(_) => log::warn!("Synchronizer busy, dropping stop"),
    });

    subscription
}

/// Highlights the active lyric line.
pub struct LyricSync<V> {
    lyrics: Timeline<String>,
    policy: LookupPolicy,
    tracker: Tracker,
    view: V,
}

impl<V: LyricView> LyricSync<V> {
    /// `policy` is [`LookupPolicy::Monotonic`] for lyrics that only carry line
    /// start times, [`LookupPolicy::Bounded`] when each line has an end.
    pub fn new(lyrics: Timeline<String>, policy: LookupPolicy, view: V) -> Self {
        Self {
            lyrics,
            policy,
            tracker: Tracker::default(),
            view,
        }
    }

    /// Swap in the lyrics of a new song and clear the highlight.
    pub fn set_lyrics(&mut self, lyrics: Timeline<String>) {
        self.lyrics = lyrics;
        self.on_stop();
    }

    pub fn active(&self) -> Option<usize> {
        self.tracker.current()
    }

    pub fn view(&self) -> &V {
        &self.view
    }
}

impl<V: LyricView> Synchronizer for LyricSync<V> {
    fn on_time_update(&mut self, event: &TimeUpdateEvent) {
        let index = self.lyrics.active_index(event.current_time, self.policy);
        if self.tracker.update(index).is_some() {
            let text = index.and_then(|i| self.lyrics.get(i)).map(|line| line.payload.as_str());
            self.view.highlight_line(index, text);
        }
    }

    fn on_stop(&mut self) {
        if self.tracker.reset().is_some() {
            self.view.highlight_line(None, None);
        }
        self.view.scroll_to_origin();
    }
}

/// Shows the name of the active chord.
pub struct ChordSync<V> {
    chords: Timeline<String>,
    tracker: Tracker,
    view: V,
}

impl<V: ChordView> ChordSync<V> {
    pub fn new(chords: Timeline<String>, view: V) -> Self {
        Self {
            chords,
            tracker: Tracker::default(),
            view,
        }
    }

    pub fn set_chords(&mut self, chords: Timeline<String>) {
        self.chords = chords;
        self.on_stop();
    }

    pub fn active(&self) -> Option<usize> {
        self.tracker.current()
    }

    pub fn view(&self) -> &V {
        &self.view
    }
}

impl<V: ChordView> Synchronizer for ChordSync<V> {
    fn on_time_update(&mut self, event: &TimeUpdateEvent) {
        let index = self.chords.active_index(event.current_time, LookupPolicy::Bounded);
        if self.tracker.update(index).is_some() {
            let name = index.and_then(|i| self.chords.get(i)).map(|c| c.payload.as_str());
            self.view.show_chord(index, name);
        }
    }

    fn on_stop(&mut self) {
        if self.tracker.reset().is_some() {
            self.view.show_chord(None, None);
        }
    }
}

/// Lights the keys of the active chord.
pub struct KeyboardSync<V> {
    chords: Timeline<String>,
    keyboard: Keyboard,
    tracker: Tracker,
    view: V,
}

impl<V: KeyboardView> KeyboardSync<V> {
    pub fn new(chords: Timeline<String>, keyboard: Keyboard, view: V) -> Self {
        Self {
            chords,
            keyboard,
            tracker: Tracker::default(),
            view,
        }
    }

    pub fn set_chords(&mut self, chords: Timeline<String>) {
        self.chords = chords;
        self.on_stop();
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    pub fn view(&self) -> &V {
        &self.view
    }
}

impl<V: KeyboardView> Synchronizer for KeyboardSync<V> {
    fn on_time_update(&mut self, event: &TimeUpdateEvent) {
        let index = self.chords.active_index(event.current_time, LookupPolicy::Bounded);
        if self.tracker.update(index).is_some() {
            let keys = index
                .and_then(|i| self.chords.get(i))
                .map(|c| self.keyboard.highlighted(&c.payload))
                .unwrap_or_default();
            self.view.highlight_keys(&keys);
        }
    }

    fn on_stop(&mut self) {
        if self.tracker.reset().is_some() {
            self.view.highlight_keys(&[]);
        }
    }
}

/// Which transport controls are usable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Controls {
    pub play_enabled: bool,
    pub pause_enabled: bool,
    pub stop_enabled: bool,
}

impl Controls {
    pub fn for_status(status: TransportStatus) -> Self {
        match status {
            TransportStatus::Idle => Controls::default(),
            TransportStatus::Loaded => Controls {
                play_enabled: true,
                pause_enabled: false,
                stop_enabled: false,
            },
            TransportStatus::Playing => Controls {
                play_enabled: false,
                pause_enabled: true,
                stop_enabled: true,
            },
            TransportStatus::Paused => Controls {
                play_enabled: true,
                pause_enabled: false,
                stop_enabled: true,
            },
        }
    }
}

/// Keeps play/pause/stop enablement in line with transport transitions.
pub struct ControlsSync<V> {
    controls: Controls,
    view: V,
}

impl<V: ControlsView> ControlsSync<V> {
    pub fn new(mut view: V) -> Self {
        let controls = Controls::for_status(TransportStatus::Idle);
        view.set_controls(controls);
        Self { controls, view }
    }

    pub fn controls(&self) -> Controls {
        self.controls
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn apply(&mut self, status: TransportStatus) {
        let controls = Controls::for_status(status);
        if controls != self.controls {
            self.controls = controls;
            self.view.set_controls(controls);
        }
    }
}

/// Route transport transitions from `bus` to `controls`.
pub fn attach_controls<V: ControlsView + 'static>(bus: &EventBus, controls: Rc<RefCell<ControlsSync<V>>>) -> Subscription {
    let mut subscription = Subscription::new();
    on_transition::<MidiLoaded, V>(&mut subscription, bus, &controls, TransportStatus::Loaded);
    on_transition::<Play, V>(&mut subscription, bus, &controls, TransportStatus::Playing);
    on_transition::<Pause, V>(&mut subscription, bus, &controls, TransportStatus::Paused);
    on_transition::<Stop, V>(&mut subscription, bus, &controls, TransportStatus::Loaded);
    on_transition::<Ended, V>(&mut subscription, bus, &controls, TransportStatus::Loaded);
    subscription
}

fn on_transition<E: EventKind, V: ControlsView + 'static>(
    subscription: &mut Subscription,
    bus: &EventBus,
    controls: &Rc<RefCell<ControlsSync<V>>>,
    status: TransportStatus,
) {
    let target = controls.clone();
    subscription.add::<E>(bus, move |_| {
        if let Ok(mut controls) = target.try_borrow_mut() {
            controls.apply(status);
        }
    });
}

/// `MM:SS`, rounding down. Negative and non-finite input shows `00:00`.
///
/// # Example
/// ```
/// use kplay::sync::format_time;
///
/// assert_eq!(format_time(83.9), "01:23");
/// ```
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}
