//! Parsed MIDI document types
//!
//! A [`ParsedMidi`] is immutable once built: tracks of notes with timing in
//! seconds, already resolved through the file's tempo map.

use serde::Serialize;

use crate::chord::PITCH_NAMES;
use crate::error::PlayerError;

/// A single note with absolute timing in seconds.
///
/// # Fields
/// - `pitch_name`: Scientific pitch name (`C4` = MIDI 60, sharps only)
/// - `start_seconds`: Offset from the start of the song, `>= 0`
/// - `duration_seconds`: Length of the note, `> 0`
/// - `velocity`: Normalized loudness in `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub pitch_name: String,
    pub start_seconds: f64,
    pub duration_seconds: f64,
    pub velocity: f32,
}

impl Note {
    pub fn new(pitch_name: impl Into<String>, start_seconds: f64, duration_seconds: f64, velocity: f32) -> Self {
        Self {
            pitch_name: pitch_name.into(),
            start_seconds,
            duration_seconds,
            velocity,
        }
    }

    pub fn end_seconds(&self) -> f64 {
        self.start_seconds + self.duration_seconds
    }
}

/// One independent note sequence, typically one instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub notes: Vec<Note>,
}

impl Track {
    pub fn new(name: Option<String>, notes: Vec<Note>) -> Self {
        Self { name, notes }
    }
}

/// A complete song ready for scheduling.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMidi {
    tracks: Vec<Track>,
    duration: f64,
}

impl ParsedMidi {
    /// Validate tracks and build the document.
    ///
    /// Notes inside each track are stably ordered by start time. The song
    /// duration is the latest note end.
    ///
    /// # Errors
    /// [`PlayerError::LoadError`] when a note has a negative or non-finite
    /// start, a non-positive duration, or a velocity outside `[0, 1]`.
    pub fn new(mut tracks: Vec<Track>) -> Result<Self, PlayerError> {
        let mut duration: f64 = 0.0;
        for (track_idx, track) in tracks.iter_mut().enumerate() {
            for (note_idx, note) in track.notes.iter().enumerate() {
                let valid = note.start_seconds.is_finite()
                    && note.start_seconds >= 0.0
                    && note.duration_seconds.is_finite()
                    && note.duration_seconds > 0.0
                    && (0.0..=1.0).contains(&note.velocity);
                if !valid {
                    return Err(PlayerError::LoadError(format!(
                        "note {} of track {} is invalid: {:?}",
                        note_idx, track_idx, note
                    )));
                }
                duration = duration.max(note.end_seconds());
            }
            track
                .notes
                .sort_by(|a, b| a.start_seconds.total_cmp(&b.start_seconds));
        }
        Ok(Self { tracks, duration })
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Length of the song in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn note_count(&self) -> usize {
        self.tracks.iter().map(|t| t.notes.len()).sum()
    }
}

/// Scientific pitch name for a MIDI key number (60 → `C4`).
pub fn midi_note_name(key: u8) -> String {
    let octave = key as i32 / 12 - 1;
    format!("{}{}", PITCH_NAMES[(key % 12) as usize], octave)
}
