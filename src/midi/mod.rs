//! # MIDI Module
//!
//! The song model consumed by the transport, and the parser seam that produces it.
//!
//! ## Sub-modules
//! - `types` - ParsedMidi, Track, Note definitions
//! - `parser` - MidiSource, the MidiParser trait and the default SmfParser
//!
//! ## Example
//! ```rust
//! use kplay::midi::{Note, ParsedMidi, Track};
//!
//! let midi = ParsedMidi::new(vec![Track::new(
//!     Some("Piano".to_string()),
//!     vec![Note::new("C4", 0.0, 1.0, 0.8), Note::new("G4", 1.0, 1.0, 0.8)],
//! )])
//! .unwrap();
//!
//! assert_eq!(midi.duration(), 2.0);
//! ```

mod parser;
mod types;

pub use parser::{MidiParser, MidiSource, SmfParser};
pub use types::{midi_note_name, Note, ParsedMidi, Track};
