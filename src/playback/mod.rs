//! # Playback Module
//!
//! Turn a [`ParsedMidi`](crate::midi::ParsedMidi) into timed note triggers and
//! drive everything that follows the song position.
//!
//! ## Purpose
//! The [`Transport`] owns the loaded song and a playback clock, and exposes:
//! 1. **Transport control** - play, pause, stop, seek, playback rate
//! 2. **Audio scheduling** - one note-on/note-off trigger per note, against the audio clock
//! 3. **Notifications** - typed events on an [`EventBus`] for lyric, chord and UI followers
//!
//! ## Sub-modules
//! - `events` - EventBus and the closed set of event kinds with their payloads
//! - `clock` - AudioClock and Timer capabilities, with real and manual implementations
//! - `synth` - VoiceGroup/SynthBackend seam, VoiceBank ownership, logging and recording backends
//! - `transport` - Transport state machine and scheduler
//!
//! ## Example
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use kplay::midi::{Note, ParsedMidi, Track};
//! use kplay::playback::{Ended, IntervalTimer, ManualClock, RecordingSynth, Transport};
//!
//! let clock = Rc::new(ManualClock::new());
//! let transport = Transport::new(clock.clone(), Rc::new(IntervalTimer::new()), Box::new(RecordingSynth::new()));
//! transport
//!     .load_parsed(ParsedMidi::new(vec![Track::new(None, vec![Note::new("A4", 0.0, 2.0, 0.7)])]).unwrap())
//!     .unwrap();
//!
//! let ended = Rc::new(Cell::new(false));
//! let flag = ended.clone();
//! transport.add_event_listener::<Ended>(move |_| flag.set(true));
//!
//! transport.play();
//! clock.advance(2.0);
//! transport.tick();
//!
//! assert!(ended.get());
//! assert_eq!(transport.current_time(), 0.0);
//! ```
//!
//! ## Timing
//!
//! While playing, the position is derived from the audio clock:
//! `position = (now - anchor) * rate`, with `anchor = now - position / rate`
//! taken whenever playback (re)starts. A note at offset `s` is scheduled at
//! `anchor + s / rate` and lasts `duration / rate`. Only notes with
//! `s >= position` are scheduled, so a note already under way when playback
//! resumes or seeks stays silent.
//!
//! Pause, stop, seek and rate changes cancel pending triggers and the timer
//! before anything is rescheduled.

mod clock;
mod events;
mod synth;
mod transport;

#[cfg(test)]
mod tests;

pub use clock::{AudioClock, IntervalTimer, ManualClock, SystemClock, Timer};
pub use events::{
    Ended, EndedEvent, ErrorEvent, ErrorRaised, EventBus, EventKind, ListenerId, Listeners, MidiLoaded,
    MidiLoadedEvent, Pause, PauseEvent, Play, PlayEvent, RateChange, RateChangeEvent, Stop, StopEvent, TimeUpdate,
    TimeUpdateEvent,
};
pub use synth::{LoggingSynth, RecordingSynth, ScheduledNote, SynthBackend, SynthEvent, VoiceBank, VoiceGroup};
pub use transport::{Transport, TransportStatus, DEFAULT_TICK_INTERVAL, MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE};
