//! Synthesizer seam
//!
//! Sound generation lives outside the core. The transport talks to one
//! [`VoiceGroup`] per track, created by a [`SynthBackend`] when a song loads.
//! [`VoiceBank`] owns those groups for the lifetime of the loaded song and
//! releases them when dropped.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use crate::error::PlayerError;
use crate::midi::{ParsedMidi, Track};

/// Note trigger capability for one track.
pub trait VoiceGroup {
    /// Schedule a note-on at `start_time` (audio clock seconds) and its
    /// note-off `duration` seconds later.
    fn trigger_note_on_off(
        &mut self,
        pitch_name: &str,
        duration: f64,
        start_time: f64,
        velocity: f32,
    ) -> Result<(), PlayerError>;

    /// Drop every pending trigger that would start at or after `from_time`.
    fn cancel_scheduled(&mut self, from_time: f64);

    /// Silence every sounding voice now.
    fn release_all_voices(&mut self);

    /// Free backend resources. Called once, right before the group is dropped.
    fn dispose(&mut self) {}
}

/// Factory for per-track voice groups.
pub trait SynthBackend {
    fn create_voice_group(&mut self, track_index: usize, track: &Track) -> Result<Box<dyn VoiceGroup>, PlayerError>;
}

/// The voice groups of the loaded song, one per track.
///
/// Dropping the bank releases and disposes every group, so replacing or
/// clearing the transport's bank is enough to free the old song's voices.
pub struct VoiceBank {
    groups: Vec<Box<dyn VoiceGroup>>,
}

impl VoiceBank {
    /// Create one voice group per track of `midi`.
    ///
    /// # Errors
    /// Whatever the backend reports. Groups created before the failure are
    /// disposed.
    pub fn allocate(backend: &mut dyn SynthBackend, midi: &ParsedMidi) -> Result<Self, PlayerError> {
        let mut bank = VoiceBank {
            groups: Vec::with_capacity(midi.tracks().len()),
        };
        for (index, track) in midi.tracks().iter().enumerate() {
            bank.groups.push(backend.create_voice_group(index, track)?);
        }
        log::debug!("Allocated {} voice groups", bank.groups.len());
        Ok(bank)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group_mut(&mut self, track_index: usize) -> Option<&mut (dyn VoiceGroup + 'static)> {
        self.groups.get_mut(track_index).map(|g| g.as_mut())
    }

    /// Cancel pending triggers from `now` on and release sounding voices.
    pub fn silence(&mut self, now: f64) {
        for group in &mut self.groups {
            group.cancel_scheduled(now);
            group.release_all_voices();
        }
    }
}

impl Drop for VoiceBank {
    fn drop(&mut self) {
        for group in &mut self.groups {
            group.release_all_voices();
            group.dispose();
        }
    }
}

/// Backend that only logs triggers. Used by the headless CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSynth;

struct LoggingVoices {
    track: usize,
}

impl SynthBackend for LoggingSynth {
    fn create_voice_group(&mut self, track_index: usize, track: &Track) -> Result<Box<dyn VoiceGroup>, PlayerError> {
        log::debug!(
            "Voice group {} for {}",
            track_index,
            track.name.as_deref().unwrap_or("unnamed track")
        );
        Ok(Box::new(LoggingVoices { track: track_index }))
    }
}

impl VoiceGroup for LoggingVoices {
    fn trigger_note_on_off(&mut self, pitch_name: &str, duration: f64, start_time: f64, velocity: f32) -> Result<(), PlayerError> {
        log::trace!(
            "track {}: {} at {:.3}s for {:.3}s (vel {:.2})",
            self.track,
            pitch_name,
            start_time,
            duration,
            velocity
        );
        Ok(())
    }

    fn cancel_scheduled(&mut self, from_time: f64) {
        log::trace!("track {}: cancel from {:.3}s", self.track, from_time);
    }

    fn release_all_voices(&mut self) {
        log::trace!("track {}: release", self.track);
    }
}

/// One trigger captured by [`RecordingSynth`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledNote {
    pub track: usize,
    pub pitch: String,
    pub start: f64,
    pub duration: f64,
    pub velocity: f32,
}

/// Calls made on recorded voice groups, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthEvent {
    Trigger(ScheduledNote),
    Cancel { track: usize, from_time: f64 },
    ReleaseAll { track: usize },
    Dispose { track: usize },
}

#[derive(Debug, Default)]
struct Recording {
    events: Vec<SynthEvent>,
    pending: Vec<ScheduledNote>,
    live_groups: usize,
    fail_allocation: bool,
    fail_triggers: bool,
}

/// Backend that records every call instead of producing sound.
///
/// Clones share the same recording, so a caller can keep one handle and hand
/// another to the transport.
#[derive(Debug, Default, Clone)]
pub struct RecordingSynth {
    shared: Rc<RefCell<Recording>>,
}

impl RecordingSynth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every trigger ever scheduled, cancelled or not.
    pub fn triggers(&self) -> Vec<ScheduledNote> {
        self.shared
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                SynthEvent::Trigger(note) => Some(note.clone()),
                _ => None,
            })
            .collect()
    }

    /// Triggers that have not been cancelled.
    pub fn pending(&self) -> Vec<ScheduledNote> {
        self.shared.borrow().pending.clone()
    }

    pub fn events(&self) -> Vec<SynthEvent> {
        self.shared.borrow().events.clone()
    }

    /// Voice groups created and not yet disposed.
    pub fn live_groups(&self) -> usize {
        self.shared.borrow().live_groups
    }

    pub fn clear(&self) {
        let mut recording = self.shared.borrow_mut();
        recording.events.clear();
        recording.pending.clear();
    }

    /// Make voice group creation fail.
    pub fn fail_allocation(&self, fail: bool) {
        self.shared.borrow_mut().fail_allocation = fail;
    }

    /// Make note triggers fail.
    pub fn fail_triggers(&self, fail: bool) {
        self.shared.borrow_mut().fail_triggers = fail;
    }
}

impl SynthBackend for RecordingSynth {
    fn create_voice_group(&mut self, track_index: usize, _track: &Track) -> Result<Box<dyn VoiceGroup>, PlayerError> {
        let mut recording = self.shared.borrow_mut();
        if recording.fail_allocation {
            return Err(PlayerError::AudioDeviceError(format!(
                "no voices available for track {}",
                track_index
            )));
        }
        recording.live_groups += 1;
        Ok(Box::new(RecordedVoices {
            track: track_index,
            shared: self.shared.clone(),
        }))
    }
}

struct RecordedVoices {
    track: usize,
    shared: Rc<RefCell<Recording>>,
}

impl VoiceGroup for RecordedVoices {
    fn trigger_note_on_off(&mut self, pitch_name: &str, duration: f64, start_time: f64, velocity: f32) -> Result<(), PlayerError> {
        let mut recording = self.shared.borrow_mut();
        if recording.fail_triggers {
            return Err(PlayerError::AudioDeviceError("synthesizer rejected note".to_string()));
        }
        let note = ScheduledNote {
            track: self.track,
            pitch: pitch_name.to_string(),
            start: start_time,
            duration,
            velocity,
        };
        recording.pending.push(note.clone());
        recording.events.push(SynthEvent::Trigger(note));
        Ok(())
    }

    fn cancel_scheduled(&mut self, from_time: f64) {
        let track = self.track;
        let mut recording = self.shared.borrow_mut();
        recording.pending.retain(|n| n.track != track || n.start < from_time);
        recording.events.push(SynthEvent::Cancel { track, from_time });
    }

    fn release_all_voices(&mut self) {
        let track = self.track;
        self.shared.borrow_mut().events.push(SynthEvent::ReleaseAll { track });
    }

    fn dispose(&mut self) {
        let track = self.track;
        let mut recording = self.shared.borrow_mut();
        recording.live_groups = recording.live_groups.saturating_sub(1);
        recording.events.push(SynthEvent::Dispose { track });
    }
}
