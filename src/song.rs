//! Lyric and chord data for a song
//!
//! Two input formats are accepted:
//!
//! - **JSON song data** with `lyrics` and `chords` arrays. Entries carry either
//!   a `start`/`end` span or a single `time` cue:
//!   ```json
//!   {
//!     "lyrics": [{ "text": "Hello, ", "start": 0, "end": 2 }],
//!     "chords": [{ "name": "C", "start": 0, "end": 4, "confidence": 0.9 }]
//!   }
//!   ```
//! - **Timestamped lyric text**, one line per cue: `[mm:ss] text` or
//!   `[hh:mm:ss] text`. Lines without a readable timestamp are placed at 0.
//!
//! Cue entries (start only) become intervals that end where the next cue
//! starts; the last one stays open-ended.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PlayerError;
use crate::timeline::{Interval, Timeline};

/// Unit of the timestamps found in song data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeUnit {
    Seconds,
    Milliseconds,
}

impl TimeUnit {
    pub fn to_seconds(self, value: f64) -> f64 {
        match self {
            TimeUnit::Seconds => value,
            TimeUnit::Milliseconds => value / 1000.0,
        }
    }
}

/// Lyric lines and chord spans loaded alongside a MIDI file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongData {
    pub lyrics: Timeline<String>,
    pub chords: Timeline<String>,
}

#[derive(Debug, Deserialize)]
struct RawSongData {
    #[serde(default)]
    lyrics: Vec<RawEntry>,
    #[serde(default)]
    chords: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(alias = "name", alias = "chord", alias = "chordName")]
    text: Option<String>,
    start: Option<f64>,
    time: Option<f64>,
    end: Option<f64>,
}

impl SongData {
    pub fn new(lyrics: Vec<Interval<String>>, chords: Vec<Interval<String>>) -> Self {
        Self {
            lyrics: Timeline::new(lyrics),
            chords: Timeline::new(chords),
        }
    }

    /// Parse JSON song data, normalizing timestamps to seconds.
    pub fn from_json(source: &str, unit: TimeUnit) -> Result<Self, PlayerError> {
        let raw: RawSongData =
            serde_json::from_str(source).map_err(|e| PlayerError::SongDataError {
                line: e.line(),
                message: e.to_string(),
            })?;
        let lyrics = entries_to_intervals("lyrics", raw.lyrics, unit)?;
        let chords = entries_to_intervals("chords", raw.chords, unit)?;
        log::debug!("Song data: {} lyric lines, {} chords", lyrics.len(), chords.len());
        Ok(Self::new(lyrics, chords))
    }

    /// Load song data from disk. `.json` files are read as JSON song data,
    /// anything else as timestamped lyric text.
    pub fn load(path: &Path, unit: TimeUnit) -> Result<Self, PlayerError> {
        let source = fs::read_to_string(path).map_err(|e| {
            PlayerError::InvalidSongData(format!("cannot read '{}': {}", path.display(), e))
        })?;
        let is_json = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&source, unit)
        } else {
            Ok(Self {
                lyrics: parse_timed_lyrics(&source),
                chords: Timeline::default(),
            })
        }
    }
}

fn entries_to_intervals(
    field: &str,
    entries: Vec<RawEntry>,
    unit: TimeUnit,
) -> Result<Vec<Interval<String>>, PlayerError> {
    let mut spans = Vec::with_capacity(entries.len());
    for (i, entry) in entries.into_iter().enumerate() {
        let text = entry
            .text
            .ok_or_else(|| PlayerError::InvalidSongData(format!("{}[{}] has no text", field, i)))?;
        let start = entry
            .start
            .or(entry.time)
            .ok_or_else(|| PlayerError::InvalidSongData(format!("{}[{}] has no start time", field, i)))?;
        let start = unit.to_seconds(start);
        let end = entry.end.map(|e| unit.to_seconds(e));
        if let Some(end) = end {
            if end <= start {
                return Err(PlayerError::InvalidSongData(format!(
                    "{}[{}] ends at {} before it starts at {}",
                    field, i, end, start
                )));
            }
        }
        spans.push((text, start, end));
    }

    spans.sort_by(|a, b| a.1.total_cmp(&b.1));
    let starts: Vec<f64> = spans.iter().map(|s| s.1).collect();
    Ok(spans
        .into_iter()
        .enumerate()
        .map(|(i, (text, start, end))| {
            let end = end.unwrap_or_else(|| next_start_after(&starts[i + 1..], start));
            Interval::new(text, start, end)
        })
        .collect())
}

fn next_start_after(later: &[f64], start: f64) -> f64 {
    later
        .iter()
        .copied()
        .find(|&s| s > start)
        .unwrap_or(f64::INFINITY)
}

/// Parse `[mm:ss] text` / `[hh:mm:ss] text` lines into a lyric timeline.
///
/// # Example
/// ```
/// use kplay::song::parse_timed_lyrics;
/// use kplay::timeline::LookupPolicy;
///
/// let lyrics = parse_timed_lyrics("[00:01.5] first line\n[00:04] second line\n");
/// assert_eq!(lyrics.len(), 2);
/// let active = lyrics.active(2.0, LookupPolicy::Monotonic).unwrap();
/// assert_eq!(active.payload, "first line");
/// ```
pub fn parse_timed_lyrics(source: &str) -> Timeline<String> {
    let mut cues: Vec<(f64, String)> = source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_lyric_line)
        .collect();
    cues.sort_by(|a, b| a.0.total_cmp(&b.0));

    let starts: Vec<f64> = cues.iter().map(|c| c.0).collect();
    let intervals = cues
        .into_iter()
        .enumerate()
        .map(|(i, (start, text))| Interval::new(text, start, next_start_after(&starts[i + 1..], start)))
        .collect();
    Timeline::new(intervals)
}

fn parse_lyric_line(line: &str) -> (f64, String) {
    let timestamp = line
        .strip_prefix('[')
        .and_then(|rest| rest.split_once(']'))
        .and_then(|(stamp, text)| parse_timestamp(stamp).map(|t| (t, text.trim().to_string())));
    timestamp.unwrap_or_else(|| (0.0, line.to_string()))
}

fn parse_timestamp(stamp: &str) -> Option<f64> {
    let parts = stamp
        .split(':')
        .map(|p| p.trim().parse::<f64>().ok())
        .collect::<Option<Vec<f64>>>()?;
    match parts.as_slice() {
        [hours, minutes, seconds] => Some(hours * 3600.0 + minutes * 60.0 + seconds),
        [minutes, seconds] => Some(minutes * 60.0 + seconds),
        _ => Some(0.0),
    }
}
