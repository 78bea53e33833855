//! Virtual piano keyboard range
//!
//! A keyboard spans whole octaves starting at `C` of its first octave. Keys
//! belonging to the active chord's pitch set are highlighted when they fall
//! inside that range.

use serde::Serialize;

use crate::chord::{chord_to_pitch_set, Pitch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyboard {
    pub start_octave: i32,
    pub octaves: u32,
}

impl Default for Keyboard {
    fn default() -> Self {
        Self {
            start_octave: 3,
            octaves: 2,
        }
    }
}

impl Keyboard {
    pub fn new(start_octave: i32, octaves: u32) -> Self {
        Self { start_octave, octaves }
    }

    /// Every key from `C{start}` up to `B{start + octaves - 1}`.
    pub fn keys(&self) -> Vec<Pitch> {
        (0..self.octaves as i32)
            .flat_map(|o| (0..12u8).map(move |class| Pitch::new(class, self.start_octave + o)))
            .collect()
    }

    pub fn contains(&self, pitch: &Pitch) -> bool {
        pitch.octave() >= self.start_octave && pitch.octave() < self.start_octave + self.octaves as i32
    }

    /// Keys to light up for `chord_symbol`, with the chord voiced from the
    /// keyboard's first octave.
    ///
    /// # Example
    /// ```
    /// use kplay::keyboard::Keyboard;
    ///
    /// let keyboard = Keyboard::new(4, 1);
    /// let names: Vec<String> = keyboard.highlighted("Am").iter().map(|p| p.to_string()).collect();
    /// // C5 and E5 fall off the top of a one-octave keyboard
    /// assert_eq!(names, vec!["A4"]);
    /// ```
    pub fn highlighted(&self, chord_symbol: &str) -> Vec<Pitch> {
        chord_to_pitch_set(chord_symbol, self.start_octave)
            .into_iter()
            .filter(|p| self.contains(p))
            .collect()
    }
}
