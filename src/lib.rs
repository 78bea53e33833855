//! Playback and synchronization core of a karaoke player.
//!
//! A [`Transport`](playback::Transport) schedules the notes of a parsed MIDI
//! song against an audio clock and publishes its position; lyric, chord and
//! keyboard followers in [`sync`] look the position up on a
//! [`Timeline`](timeline::Timeline) and update their displays when the active
//! item changes. [`Session`](session::Session) wires the two together.

pub mod chord;
pub mod config;
pub mod error;
pub mod keyboard;
pub mod midi;
pub mod playback;
pub mod session;
pub mod song;
pub mod sync;
pub mod timeline;

pub use chord::chord_to_pitch_set;
pub use config::PlayerConfig;
pub use error::*;
pub use playback::Transport;
pub use session::{Session, Views};
pub use song::SongData;
