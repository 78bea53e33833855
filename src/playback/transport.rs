//! The transport: owns the loaded song, the playback clock and the voice bank
//!
//! All methods take `&self`. State lives in a `RefCell` that is never borrowed
//! across an event emission, so listeners may call back into the transport
//! (for example `stop()` from an `ended` handler).

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;

use super::clock::{AudioClock, Timer};
use super::events::{
    Ended, EndedEvent, ErrorEvent, ErrorRaised, EventBus, EventKind, ListenerId, MidiLoaded, MidiLoadedEvent, Pause,
    PauseEvent, Play, PlayEvent, RateChange, RateChangeEvent, Stop, StopEvent, TimeUpdate, TimeUpdateEvent,
};
use super::synth::{SynthBackend, VoiceBank};
use crate::error::PlayerError;
use crate::midi::{MidiParser, MidiSource, ParsedMidi, SmfParser};

pub const MIN_PLAYBACK_RATE: f64 = 0.5;
pub const MAX_PLAYBACK_RATE: f64 = 2.0;

/// Period of `timeUpdate` emission unless configured otherwise.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Observable transport state.
///
/// `Idle → Loaded → Playing ⇄ Paused → Loaded` (on stop). Any state returns
/// to `Loaded` through a fresh load, or to `Idle` through `dispose` or a failed
/// voice allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TransportStatus {
    Idle,
    Loaded,
    Playing,
    Paused,
}

struct TransportState {
    midi: Option<Rc<ParsedMidi>>,
    voices: Option<VoiceBank>,
    is_playing: bool,
    paused: bool,
    /// Authoritative while not playing.
    current_time: f64,
    playback_rate: f64,
    /// Audio clock time at which position 0 would occur at the current rate.
    clock_anchor: f64,
    /// Bumped every time playback is (re)anchored.
    run: u64,
}

impl TransportState {
    fn duration(&self) -> f64 {
        self.midi.as_ref().map_or(0.0, |m| m.duration())
    }

    /// Position at audio time `now`, clamped to the song.
    fn position_at(&self, now: f64) -> f64 {
        if !self.is_playing {
            return self.current_time;
        }
        ((now - self.clock_anchor) * self.playback_rate).clamp(0.0, self.duration())
    }
}

/// MIDI scheduler and playback transport.
///
/// # Example
/// ```
/// use std::rc::Rc;
/// use kplay::midi::{Note, ParsedMidi, Track};
/// use kplay::playback::{IntervalTimer, ManualClock, RecordingSynth, Transport};
///
/// let clock = Rc::new(ManualClock::new());
/// let synth = RecordingSynth::new();
/// let transport = Transport::new(clock.clone(), Rc::new(IntervalTimer::new()), Box::new(synth.clone()));
///
/// let song = ParsedMidi::new(vec![Track::new(None, vec![Note::new("C4", 1.0, 0.5, 0.8)])]).unwrap();
/// transport.load_parsed(song).unwrap();
/// transport.play();
///
/// clock.advance(0.75);
/// transport.tick();
/// assert_eq!(transport.current_time(), 0.75);
/// assert_eq!(synth.triggers()[0].start, 1.0);
/// ```
pub struct Transport {
    state: RefCell<TransportState>,
    events: EventBus,
    clock: Rc<dyn AudioClock>,
    timer: Rc<dyn Timer>,
    backend: RefCell<Box<dyn SynthBackend>>,
    parser: Box<dyn MidiParser>,
    tick_interval: Duration,
}

impl Transport {
    pub fn new(clock: Rc<dyn AudioClock>, timer: Rc<dyn Timer>, backend: Box<dyn SynthBackend>) -> Self {
        Self {
            state: RefCell::new(TransportState {
                midi: None,
                voices: None,
                is_playing: false,
                paused: false,
                current_time: 0.0,
                playback_rate: 1.0,
                clock_anchor: 0.0,
                run: 0,
            }),
            events: EventBus::new(),
            clock,
            timer,
            backend: RefCell::new(backend),
            parser: Box::new(SmfParser),
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Replace the MIDI decoder used by [`Transport::load_midi`].
    pub fn with_parser(mut self, parser: impl MidiParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Read and decode `source`, then load it.
    ///
    /// # Errors
    /// [`PlayerError::LoadError`] if the source cannot be read or parsed. The
    /// previously loaded song, its voices and the playback position are left
    /// untouched in that case.
    pub fn load_midi(&self, source: impl Into<MidiSource>) -> Result<Rc<ParsedMidi>, PlayerError> {
        let source = source.into();
        let bytes = source.read()?;
        let midi = self.parser.parse(&bytes)?;
        self.load_parsed(midi)
    }

    /// Load an already decoded song.
    ///
    /// Stops playback, releases the previous song's voice groups, then
    /// allocates one group per track and emits `midiLoaded`.
    ///
    /// # Errors
    /// [`PlayerError::AudioDeviceError`] if the backend cannot allocate voices.
    /// The transport is left `Idle`.
    pub fn load_parsed(&self, midi: ParsedMidi) -> Result<Rc<ParsedMidi>, PlayerError> {
        self.stop();

        // A stop listener may have restarted the old song
        let previous = {
            let mut state = self.state.borrow_mut();
            state.midi = None;
            state.is_playing = false;
            state.paused = false;
            state.current_time = 0.0;
            state.voices.take()
        };
        self.timer.cancel();
        // Old voices go before new ones are requested
        drop(previous);

        let midi = Rc::new(midi);
        let bank = {
            let mut backend = self.backend.borrow_mut();
            VoiceBank::allocate(&mut **backend, &midi)
        };
        let bank = bank.map_err(|e| {
            log::error!("Voice allocation failed: {}", e);
            e
        })?;

        {
            let mut state = self.state.borrow_mut();
            state.midi = Some(midi.clone());
            state.voices = Some(bank);
        }
        log::info!(
            "Loaded song: {} tracks, {:.2}s",
            midi.tracks().len(),
            midi.duration()
        );
        self.events.emit::<MidiLoaded>(&MidiLoadedEvent { midi: midi.clone() });
        Ok(midi)
    }

    /// Start or resume playback from the current position.
    ///
    /// No-op while playing or with nothing loaded. Notes that start before the
    /// current position are not scheduled.
    pub fn play(&self) {
        {
            let state = self.state.borrow();
            if state.is_playing || state.midi.is_none() {
                return;
            }
        }
        if let Err(e) = self.clock.resume() {
            self.fail(e);
            return;
        }

        let position = self.state.borrow().current_time;
        if !self.start_from(position) {
            return;
        }
        log::debug!("Playing from {:.3}s", position);
        self.events.emit::<Play>(&PlayEvent { current_time: position });
    }

    /// Freeze the position and silence everything. No-op unless playing.
    pub fn pause(&self) {
        let position = {
            let mut state = self.state.borrow_mut();
            if !state.is_playing {
                return;
            }
            let now = self.clock.now();
            let position = state.position_at(now);
            state.current_time = position;
            state.is_playing = false;
            state.paused = true;
            if let Some(voices) = state.voices.as_mut() {
                voices.silence(now);
            }
            position
        };
        self.timer.cancel();
        log::debug!("Paused at {:.3}s", position);
        self.events.emit::<Pause>(&PauseEvent { current_time: position });
    }

    /// Silence everything and rewind to 0.
    pub fn stop(&self) {
        let loaded = {
            let mut state = self.state.borrow_mut();
            let now = self.clock.now();
            if let Some(voices) = state.voices.as_mut() {
                voices.silence(now);
            }
            state.is_playing = false;
            state.paused = false;
            state.current_time = 0.0;
            state.midi.is_some()
        };
        self.timer.cancel();
        if loaded {
            self.events.emit::<Stop>(&StopEvent { current_time: 0.0 });
        }
    }

    /// Move to `time`, clamped to `[0, duration]`.
    ///
    /// While playing, everything scheduled is cancelled and the song is
    /// rescheduled from the new position. Emits `timeUpdate`.
    ///
    /// # Errors
    /// [`PlayerError::InvalidArgument`] for a non-finite time.
    pub fn seek(&self, time: f64) -> Result<(), PlayerError> {
        if !time.is_finite() {
            return Err(PlayerError::InvalidArgument(format!("cannot seek to {}", time)));
        }

        let (target, duration, playing) = {
            let mut state = self.state.borrow_mut();
            let duration = state.duration();
            let target = time.clamp(0.0, duration);
            if state.is_playing {
                let now = self.clock.now();
                if let Some(voices) = state.voices.as_mut() {
                    voices.silence(now);
                }
            }
            state.current_time = target;
            (target, duration, state.is_playing)
        };

        if playing {
            self.timer.cancel();
            if !self.start_from(target) {
                return Ok(());
            }
        }
        log::debug!("Seeked to {:.3}s", target);
        self.events.emit::<TimeUpdate>(&TimeUpdateEvent {
            current_time: target,
            duration,
        });
        Ok(())
    }

    /// Change the playback rate, keeping the current position.
    ///
    /// # Errors
    /// [`PlayerError::InvalidArgument`] outside `[0.5, 2.0]`; the rate is unchanged.
    pub fn set_playback_rate(&self, rate: f64) -> Result<(), PlayerError> {
        if !(MIN_PLAYBACK_RATE..=MAX_PLAYBACK_RATE).contains(&rate) {
            return Err(PlayerError::InvalidArgument(format!(
                "playback rate {} is outside [{}, {}]",
                rate, MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE
            )));
        }

        let resume_at = {
            let mut state = self.state.borrow_mut();
            let resume_at = if state.is_playing {
                let now = self.clock.now();
                let position = state.position_at(now);
                state.current_time = position;
                if let Some(voices) = state.voices.as_mut() {
                    voices.silence(now);
                }
                Some(position)
            } else {
                None
            };
            state.playback_rate = rate;
            resume_at
        };

        if let Some(position) = resume_at {
            self.timer.cancel();
            if !self.start_from(position) {
                return Ok(());
            }
        }
        log::debug!("Playback rate set to {}", rate);
        self.events.emit::<RateChange>(&RateChangeEvent { playback_rate: rate });
        Ok(())
    }

    /// Periodic timer callback: emit `timeUpdate`, and stop with `ended`
    /// once the song is over. Does nothing unless playing.
    pub fn tick(&self) {
        let (position, duration, run) = {
            let mut state = self.state.borrow_mut();
            if !state.is_playing {
                return;
            }
            let position = state.position_at(self.clock.now());
            state.current_time = position;
            (position, state.duration(), state.run)
        };

        self.events.emit::<TimeUpdate>(&TimeUpdateEvent {
            current_time: position,
            duration,
        });

        // A listener may already have paused, stopped, seeked or restarted
        let still_running = {
            let state = self.state.borrow();
            state.is_playing && state.run == run
        };
        if position >= duration && still_running {
            log::info!("Playback ended at {:.2}s", position);
            self.stop();
            self.events.emit::<Ended>(&EndedEvent);
        }
    }

    /// Stop and release the loaded song and its voices.
    pub fn dispose(&self) {
        self.stop();
        let voices = {
            let mut state = self.state.borrow_mut();
            state.midi = None;
            state.is_playing = false;
            state.paused = false;
            state.current_time = 0.0;
            state.voices.take()
        };
        self.timer.cancel();
        drop(voices);
    }

    pub fn duration(&self) -> f64 {
        self.state.borrow().duration()
    }

    /// Playback position in seconds, interpolated from the audio clock while playing.
    pub fn current_time(&self) -> f64 {
        self.state.borrow().position_at(self.clock.now())
    }

    pub fn is_playing(&self) -> bool {
        self.state.borrow().is_playing
    }

    pub fn playback_rate(&self) -> f64 {
        self.state.borrow().playback_rate
    }

    pub fn status(&self) -> TransportStatus {
        let state = self.state.borrow();
        if state.midi.is_none() {
            TransportStatus::Idle
        } else if state.is_playing {
            TransportStatus::Playing
        } else if state.paused {
            TransportStatus::Paused
        } else {
            TransportStatus::Loaded
        }
    }

    pub fn midi(&self) -> Option<Rc<ParsedMidi>> {
        self.state.borrow().midi.clone()
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn add_event_listener<E: EventKind>(&self, handler: impl FnMut(&E::Payload) + 'static) -> ListenerId {
        self.events.subscribe::<E>(handler)
    }

    pub fn remove_event_listener<E: EventKind>(&self, id: ListenerId) -> bool {
        self.events.unsubscribe::<E>(id)
    }

    /// Anchor the clock at `position` and schedule every note starting at or
    /// after it, then arm the timer. On a scheduling failure the transport
    /// stops and reports the error; returns whether playback is running.
    fn start_from(&self, position: f64) -> bool {
        match self.schedule_from(position) {
            Ok(count) => {
                log::debug!("Scheduled {} notes from {:.3}s", count, position);
                self.timer.start(self.tick_interval);
                true
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    fn schedule_from(&self, position: f64) -> Result<usize, PlayerError> {
        let now = self.clock.now();
        let mut state = self.state.borrow_mut();
        let rate = state.playback_rate;
        let anchor = now - position / rate;
        state.clock_anchor = anchor;
        state.current_time = position;
        state.run += 1;
        state.is_playing = true;
        state.paused = false;

        let TransportState { midi, voices, .. } = &mut *state;
        let (Some(midi), Some(voices)) = (midi.as_ref(), voices.as_mut()) else {
            return Ok(0);
        };

        let mut count = 0;
        for (index, track) in midi.tracks().iter().enumerate() {
            let Some(group) = voices.group_mut(index) else {
                continue;
            };
            for note in track.notes.iter().filter(|n| n.start_seconds >= position) {
                group.trigger_note_on_off(
                    &note.pitch_name,
                    note.duration_seconds / rate,
                    anchor + note.start_seconds / rate,
                    note.velocity,
                )?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Halt as if stopped and publish the error.
    fn fail(&self, error: PlayerError) {
        log::error!("Playback halted: {}", error);
        self.stop();
        self.events.emit::<ErrorRaised>(&ErrorEvent {
            message: error.to_string(),
            cause: error,
        });
    }
}
