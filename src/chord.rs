//! Chord symbol parsing for keyboard highlighting
//!
//! Maps chord symbols (C, Am, G7, Dm7, F#m7b5, etc.) to ordered pitch lists.

use std::fmt;

use serde::Serialize;

/// Pitch names indexed by pitch class (C = 0 ... B = 11).
pub const PITCH_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A named pitch in a specific octave (`C4` is middle C, MIDI 60).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Pitch {
    name: &'static str,
    octave: i32,
    #[serde(skip)]
    class: u8,
}

impl Pitch {
    pub fn new(pitch_class: u8, octave: i32) -> Self {
        let class = pitch_class % 12;
        Self {
            name: PITCH_NAMES[class as usize],
            octave,
            class,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn octave(&self) -> i32 {
        self.octave
    }

    pub fn pitch_class(&self) -> u8 {
        self.class
    }

    pub fn midi_number(&self) -> i32 {
        (self.octave + 1) * 12 + self.class as i32
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.octave)
    }
}

/// Chord quality, resolved from the suffix that follows the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChordQuality {
    Major,
    Minor,
    Dominant7,
    Major7,
    Minor7,
    Diminished,
    Augmented,
    Sus2,
    Sus4,
    Sixth,
    Minor6,
    Ninth,
    Major9,
    Minor9,
    Add9,
    HalfDiminished,
    Dominant7Sus4,
    Dominant7Flat9,
    Dominant7Sharp9,
    Thirteenth,
}

impl ChordQuality {
    /// Look up a suffix. Returns `None` for suffixes outside the table.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        let quality = match suffix {
            "" | "maj" | "M" => Self::Major,
            "m" | "min" | "-" => Self::Minor,
            "7" => Self::Dominant7,
            "maj7" | "M7" => Self::Major7,
            "m7" | "min7" | "-7" => Self::Minor7,
            "dim" | "°" => Self::Diminished,
            "aug" | "+" => Self::Augmented,
            "sus2" => Self::Sus2,
            "sus4" | "sus" => Self::Sus4,
            "6" => Self::Sixth,
            "m6" | "min6" => Self::Minor6,
            "9" => Self::Ninth,
            "maj9" | "M9" => Self::Major9,
            "m9" | "min9" => Self::Minor9,
            "add9" => Self::Add9,
            "m7b5" | "ø" | "ø7" => Self::HalfDiminished,
            "7sus4" => Self::Dominant7Sus4,
            "7b9" => Self::Dominant7Flat9,
            "7#9" => Self::Dominant7Sharp9,
            "13" => Self::Thirteenth,
            _ => return None,
        };
        Some(quality)
    }

    /// Semitone offsets from the root. Offsets of 12 or more are extensions
    /// that land in the next octave.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            Self::Major => &[0, 4, 7],
            Self::Minor => &[0, 3, 7],
            Self::Dominant7 => &[0, 4, 7, 10],
            Self::Major7 => &[0, 4, 7, 11],
            Self::Minor7 => &[0, 3, 7, 10],
            Self::Diminished => &[0, 3, 6],
            Self::Augmented => &[0, 4, 8],
            Self::Sus2 => &[0, 2, 7],
            Self::Sus4 => &[0, 5, 7],
            Self::Sixth => &[0, 4, 7, 9],
            Self::Minor6 => &[0, 3, 7, 9],
            Self::Ninth => &[0, 4, 7, 10, 14],
            Self::Major9 => &[0, 4, 7, 11, 14],
            Self::Minor9 => &[0, 3, 7, 10, 14],
            Self::Add9 => &[0, 4, 7, 14],
            Self::HalfDiminished => &[0, 3, 6, 10],
            Self::Dominant7Sus4 => &[0, 5, 7, 10],
            Self::Dominant7Flat9 => &[0, 4, 7, 10, 13],
            Self::Dominant7Sharp9 => &[0, 4, 7, 10, 15],
            Self::Thirteenth => &[0, 4, 7, 10, 14, 21],
        }
    }
}

/// A parsed chord symbol: root pitch class plus quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChordSymbol {
    pub root: u8,
    pub quality: ChordQuality,
}

impl ChordSymbol {
    /// Parse a chord symbol.
    ///
    /// The root is a letter `A`-`G` optionally followed by `#` or `b`; the rest
    /// is the quality suffix. Unknown suffixes fall back to a major triad.
    /// Returns `None` when the root itself cannot be read, rather than reading
    /// it as C; flats wrap around the octave, so `Cb` is B.
    pub fn parse(symbol: &str) -> Option<Self> {
        let mut chars = symbol.chars();
        let base: i32 = match chars.next()? {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };

        let rest = chars.as_str();
        let (accidental, suffix) = if let Some(s) = rest.strip_prefix('#') {
            (1, s)
        } else if let Some(s) = rest.strip_prefix('b') {
            (-1, s)
        } else {
            (0, rest)
        };

        let quality = ChordQuality::from_suffix(suffix).unwrap_or(ChordQuality::Major);
        Some(Self {
            root: (base + accidental).rem_euclid(12) as u8,
            quality,
        })
    }

    /// Ordered pitches of the chord, with the root placed in `base_octave`.
    pub fn pitch_set(&self, base_octave: i32) -> Vec<Pitch> {
        self.quality
            .intervals()
            .iter()
            .map(|&offset| {
                let absolute = self.root + offset;
                Pitch::new(absolute % 12, base_octave + (absolute / 12) as i32)
            })
            .collect()
    }
}

/// Convert a chord symbol into its ordered pitch list.
///
/// # Supported Chord Types
/// - **Major**: `C`, `maj`, `M` → root, major 3rd, perfect 5th
/// - **Minor**: `m`, `min`, `-` → root, minor 3rd, perfect 5th
/// - **Sevenths**: `7`, `maj7`, `m7`, `m7b5`, `7sus4`
/// - **Altered dominants**: `7b9`, `7#9`
/// - **Triad variants**: `dim`, `aug`, `sus2`, `sus4`
/// - **Sixths**: `6`, `m6`
/// - **Extensions**: `9`, `maj9`, `m9`, `add9`, `13`
///
/// # Examples
/// ```
/// use kplay::chord::chord_to_pitch_set;
///
/// // A minor: the 3rd and 5th cross into the next octave
/// let am: Vec<String> = chord_to_pitch_set("Am", 4).iter().map(|p| p.to_string()).collect();
/// assert_eq!(am, vec!["A4", "C5", "E5"]);
///
/// // Unknown suffixes fall back to the major triad
/// assert_eq!(chord_to_pitch_set("Cxyz", 4), chord_to_pitch_set("C", 4));
/// ```
pub fn chord_to_pitch_set(symbol: &str, base_octave: i32) -> Vec<Pitch> {
    match ChordSymbol::parse(symbol.trim()) {
        Some(chord) => chord.pitch_set(base_octave),
        None => vec![],
    }
}
