//! Standard MIDI File parsing
//!
//! The playback core only consumes [`ParsedMidi`]; decoding bytes is the job of
//! a [`MidiParser`] collaborator. [`SmfParser`] is the default one, built on
//! `midly`.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use super::types::{midi_note_name, Note, ParsedMidi, Track};
use crate::error::PlayerError;

/// Microseconds per quarter note when a file carries no tempo event (120 BPM).
const DEFAULT_TEMPO: u32 = 500_000;

/// Where MIDI bytes come from.
#[derive(Debug, Clone, PartialEq)]
pub enum MidiSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

impl MidiSource {
    /// Fetch the raw bytes.
    pub fn read(&self) -> Result<Vec<u8>, PlayerError> {
        match self {
            MidiSource::Bytes(bytes) => Ok(bytes.clone()),
            MidiSource::Path(path) => fs::read(path).map_err(|e| {
                PlayerError::LoadError(format!("cannot read '{}': {}", path.display(), e))
            }),
        }
    }
}

impl From<Vec<u8>> for MidiSource {
    fn from(bytes: Vec<u8>) -> Self {
        MidiSource::Bytes(bytes)
    }
}

impl From<PathBuf> for MidiSource {
    fn from(path: PathBuf) -> Self {
        MidiSource::Path(path)
    }
}

impl From<&Path> for MidiSource {
    fn from(path: &Path) -> Self {
        MidiSource::Path(path.to_path_buf())
    }
}

/// Decodes a MIDI byte buffer into a [`ParsedMidi`].
pub trait MidiParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedMidi, PlayerError>;
}

/// Parser for Standard MIDI Files (format 0 and 1).
#[derive(Debug, Clone, Copy, Default)]
pub struct SmfParser;

impl MidiParser for SmfParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedMidi, PlayerError> {
        let smf = Smf::parse(bytes).map_err(|e| PlayerError::LoadError(e.to_string()))?;
        let clock = TickClock::new(&smf);

        let mut tracks = Vec::with_capacity(smf.tracks.len());
        let mut skipped = 0usize;

        for track in &smf.tracks {
            let mut name = None;
            let mut notes = Vec::new();
            // Open notes per (channel, key), oldest first
            let mut active: HashMap<(u8, u8), VecDeque<(u64, u8)>> = HashMap::new();
            let mut tick: u64 = 0;

            for event in track {
                tick += event.delta.as_int() as u64;
                match event.kind {
                    TrackEventKind::Midi { channel, message } => {
                        let (key, vel, on) = match message {
                            MidiMessage::NoteOn { key, vel } => (key.as_int(), vel.as_int(), vel.as_int() > 0),
                            MidiMessage::NoteOff { key, vel } => (key.as_int(), vel.as_int(), false),
                            _ => continue,
                        };
                        let slot = active.entry((channel.as_int(), key)).or_default();
                        if on {
                            slot.push_back((tick, vel));
                        } else if let Some((start_tick, start_vel)) = slot.pop_front() {
                            match clock.note(key, start_tick, tick, start_vel) {
                                Some(note) => notes.push(note),
                                None => skipped += 1,
                            }
                        }
                    }
                    TrackEventKind::Meta(MetaMessage::TrackName(raw)) => {
                        name = Some(String::from_utf8_lossy(raw).trim().to_string());
                    }
                    _ => {}
                }
            }

            // Notes still held at the end of the track stop there
            for ((_, key), pending) in active {
                for (start_tick, vel) in pending {
                    match clock.note(key, start_tick, tick, vel) {
                        Some(note) => notes.push(note),
                        None => skipped += 1,
                    }
                }
            }

            tracks.push(Track::new(name.filter(|n| !n.is_empty()), notes));
        }

        if skipped > 0 {
            log::debug!("Skipped {} zero-length notes", skipped);
        }
        let midi = ParsedMidi::new(tracks)?;
        log::info!(
            "Parsed MIDI: {} tracks, {} notes, {:.2}s",
            midi.tracks().len(),
            midi.note_count(),
            midi.duration()
        );
        Ok(midi)
    }
}

/// Converts absolute ticks to seconds.
enum TickClock {
    /// Piecewise-constant tempo: (start tick, seconds at start tick, microseconds per beat).
    /// `divisor` is one million times the ticks per beat.
    Metrical {
        divisor: f64,
        segments: Vec<(u64, f64, f64)>,
    },
    Timecode(f64),
}

impl TickClock {
    fn new(smf: &Smf) -> Self {
        match smf.header.timing {
            Timing::Metrical(ticks_per_beat) => {
                let divisor = 1_000_000.0 * ticks_per_beat.as_int().max(1) as f64;

                // Tempo events may live in any track; format 1 keeps them in the first
                let mut changes: Vec<(u64, u32)> = Vec::new();
                for track in &smf.tracks {
                    let mut tick = 0u64;
                    for event in track {
                        tick += event.delta.as_int() as u64;
                        if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = event.kind {
                            changes.push((tick, tempo.as_int()));
                        }
                    }
                }
                changes.sort_by_key(|c| c.0);

                let mut segments = vec![(0u64, 0.0, DEFAULT_TEMPO as f64)];
                for (tick, tempo) in changes {
                    let seconds = Self::metrical_seconds(divisor, &segments, tick);
                    match segments.last_mut() {
                        Some(last) if last.0 == tick => *last = (tick, seconds, tempo as f64),
                        _ => segments.push((tick, seconds, tempo as f64)),
                    }
                }
                TickClock::Metrical { divisor, segments }
            }
            Timing::Timecode(fps, subframes) => {
                let ticks_per_second = fps.as_f32() as f64 * subframes.max(1) as f64;
                TickClock::Timecode(ticks_per_second)
            }
        }
    }

    fn metrical_seconds(divisor: f64, segments: &[(u64, f64, f64)], tick: u64) -> f64 {
        let idx = segments.partition_point(|s| s.0 <= tick).saturating_sub(1);
        let (start, seconds, tempo) = segments[idx];
        seconds + (tick - start) as f64 * tempo / divisor
    }

    fn seconds(&self, tick: u64) -> f64 {
        match self {
            TickClock::Metrical { divisor, segments } => Self::metrical_seconds(*divisor, segments, tick),
            TickClock::Timecode(ticks_per_second) => tick as f64 / ticks_per_second,
        }
    }

    fn note(&self, key: u8, start_tick: u64, end_tick: u64, vel: u8) -> Option<Note> {
        let start = self.seconds(start_tick);
        let duration = self.seconds(end_tick) - start;
        if duration <= 0.0 {
            return None;
        }
        Some(Note::new(midi_note_name(key), start, duration, vel as f32 / 127.0))
    }
}
